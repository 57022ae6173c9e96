pub mod client;
pub mod containers;
