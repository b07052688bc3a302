//! dustpan - an interactive terminal disk usage analyzer
//!
//! This crate provides:
//! - A stepwise directory scanner that builds a size-sorted tree
//! - Import and export of scan results in the ncdu JSON format
//! - A full-screen browser for the scanned tree

pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod scanner;
pub mod tracker;
pub mod tui;

// Re-export commonly used types
pub use config::Config;
pub use error::{CliError, ConfigError, DustpanError, Result};
