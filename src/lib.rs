// Library module for mediasync
// Re-exports modules for use in integration tests and the binary

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod fs;
pub mod source;
pub mod sync;
