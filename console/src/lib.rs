//! Servconsole Library
//!
//! Core modules for the live server console.

pub mod app;
pub mod buffer;
pub mod console;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod render;
pub mod storage;
pub mod transport;
pub mod utils;
