//! Wire and REST models shared by the servconsole client.
//!
//! `frames` holds the JSON frames exchanged over the per-server stream,
//! `containers` the listing returned by the container REST collaborator.

pub mod models;

pub use models::containers::{ContainerList, ContainerPort, ContainerSummary, HostConfig};
pub use models::frames::{
    CpuUsage, InboundFrame, LogData, MemoryUsage, OutboundFrame, ServerInfo, StatusData,
    WireNumber,
};
