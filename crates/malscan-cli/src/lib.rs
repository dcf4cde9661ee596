//! # malscan-cli
//!
//! Command-line front end for [`malscan_engines`].
//!
//! ## Features
//!
//! - **scan**: run every configured engine against a file (or stdin)
//! - **engines**: list engines with installation state and version
//! - **update**: check for or install new signature definitions
//! - **config**: locate, print, or initialise the TOML configuration
//! - **Multiple output formats**: pretty tables, JSON, CSV, YAML

pub mod cli;
pub mod config;
pub mod logging;
pub mod output;

pub use cli::run;
