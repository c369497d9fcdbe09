//! # compacty - run several compression tools and keep the best result
//!
//! compacty does not compress anything itself. It runs independently installed
//! compressors (oxipng, ect, jpegoptim, gifsicle, ...) against the same input,
//! measures what each one produced and keeps the smallest valid result.
//!
//! ## Layout
//!
//! - [`config`]: the declarative tool/preset document, its validation and the
//!   immutable [`config::ConfigSnapshot`] computed after loading
//! - [`resolve`]: expansion of `@name` argument references
//! - [`probe`]: tool availability and the native/wrapped launch strategy
//! - [`jobs`]: content sniffing and grouping of inputs into jobs
//! - [`compress`]: the orchestrator, the evaluator and the decode benchmark
//! - [`report`]: tab-separated result reports
//!
//! ## Quick Start
//!
//! ```bash
//! # Compress with the default preset's tools
//! compacty image.png photo.jpg
//!
//! # Every available tool, keep every result
//! compacty --all --keep-all image.png
//! ```

pub mod cli;
pub mod compress;
pub mod config;
pub mod detect;
pub mod error;
pub mod jobs;
pub mod parallel;
pub mod probe;
pub mod report;
pub mod resolve;
pub mod utils;

pub use cli::{Cli, Output};
pub use config::{Config, ConfigSnapshot};
pub use error::RunError;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
