//! viewlog - leveled file logger with a newest-first view file
//!
//! This library provides the logger, its rotation pass and the log directory server.

pub mod config;
pub mod logging;
pub mod server;

pub use logging::{Logger, TraceLevel};
