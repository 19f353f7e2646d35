//! Built-in job handlers

pub mod log;

pub use log::LogHandler;
