extern crate slog;
extern crate slog_term;

pub mod types;
pub mod library;
pub mod registry;
pub mod config;
pub mod error;
pub mod client;
pub mod server;
