//! Command-line entry point for tailswan.
//!
//! The `tailswan` binary is the composition root: it parses flags and
//! environment into a [`SupervisorConfig`](tailswan_core::SupervisorConfig),
//! installs the tracing subscriber and dispatches to a handler.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use async_trait as _;

// Used by the binary target only
use dotenvy as _;
use tracing_subscriber as _;

pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod parser;

pub use commands::Commands;
pub use config::{LogLevel, Settings};
pub use error::CliError;
pub use parser::Cli;
