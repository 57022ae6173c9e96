//! Live console: framing, routing, rendering contract and the session loop

pub mod events;
pub mod framer;
pub mod input;
pub mod router;
pub mod session;
pub mod surface;
pub mod terminal;

pub use events::{
    ControlKind, InboundEvent, LogStream, MetricSample, OutboundCommand, StatusChange,
};
pub use framer::{decode, encode};
pub use input::{parse_input, UserInput};
pub use router::{ConsoleState, Routed, Router, RouterStats};
pub use session::{ConsoleSession, Flow, SessionOptions};
pub use surface::{ConsoleSurface, ConsoleView};
pub use terminal::TerminalSurface;
