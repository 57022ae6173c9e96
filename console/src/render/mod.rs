pub mod scheduler;

pub use scheduler::{RenderScheduler, DEFAULT_REFRESH_INTERVAL};
