//! CLI module for elreloc
//!
//! Subcommands are thin wrappers over the library: they resolve
//! configuration, run the engine and render its report.

pub mod config;
pub mod error;
pub mod output;
pub mod relocate;
pub mod serials;
