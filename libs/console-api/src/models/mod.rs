//! API models

pub mod containers;
pub mod frames;
