//! Command implementations for the compacty CLI
//!
//! `compress` is the main flow; `config` and `list` back the configuration
//! actions and the loading every run goes through.

pub mod compress;
pub mod config;
pub mod list;
