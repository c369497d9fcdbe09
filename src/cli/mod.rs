//! Command-line interface for compacty
//!
//! A single flat command: compress the given files, or perform one of the
//! configuration actions (`--list`, `--reset-config`, `--get-config-path`).

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

pub mod commands;
mod output;
pub mod summary;

pub use output::Output;

use crate::compress::{Selection, ToolOutput, WritePolicy};
use crate::error::RunError;
use crate::jobs::{RenameMode, ToolSelection};

/// Compress files by using multiple compression tools and pick the best result
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Files to compress
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Select preset (run with --list to see all available presets)
    #[arg(short, long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Use the config file at this path instead of the one in your config directory
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Select tools, separated by commas (example: --tools=ect,pingo)
    #[arg(short, long, value_name = "TOOL,..", value_delimiter = ',')]
    pub tools: Vec<String>,

    /// Use all available tools; ignored when --tools is given
    #[arg(short, long)]
    pub all: bool,

    /// Suppress outputs
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase diagnostic verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print tool outputs, even with --quiet
    #[arg(long)]
    pub tool_print: bool,

    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,

    /// Print tools and presets from the loaded config file and exit
    #[arg(short, long)]
    pub list: bool,

    /// Reset the config file to the default; with --config, the file at that path
    #[arg(long)]
    pub reset_config: bool,

    /// Print the config path and exit
    #[arg(long)]
    pub get_config_path: bool,

    /// Overwrite input files
    #[arg(short = 'O', long)]
    pub overwrite: bool,

    /// Keep all compressed files, including losing ones
    #[arg(long)]
    pub keep_all: bool,

    /// Compress and show results only; keep files intact
    #[arg(long)]
    pub dry: bool,

    /// Save compression results in .tsv files
    #[arg(long)]
    pub report: bool,

    /// Compress files one by one, intended for per-file benchmarking
    #[arg(long)]
    pub per_file: bool,

    /// Rename files with mislabeled extensions without asking
    #[arg(long)]
    pub force_rename: bool,

    /// Skip files with mislabeled extensions without asking
    #[arg(long)]
    pub no_rename: bool,

    /// [EXPERIMENTAL] Measure decode time (PNG, JPEG and GIF only)
    #[arg(long)]
    pub decode_time: bool,

    /// Minimum decode measurement per file and result (example: 500ms, 1s; bare numbers are milliseconds)
    #[arg(long, value_name = "DURATION", default_value = "500ms", value_parser = parse_duration)]
    pub dt_measure: Duration,

    /// Criterion used to pick the written result; decode-time implies --decode-time
    #[arg(long, value_enum, default_value_t = Selection::Size)]
    pub select: Selection,

    /// Maximum concurrent tool processes per round (0 = no limit)
    #[arg(short, long, value_name = "N", default_value_t = 0)]
    pub jobs: usize,

    /// [UNSUPPORTED] Skip config validation
    #[arg(long)]
    pub skip_validation: bool,
}

impl Cli {
    pub fn write_policy(&self) -> WritePolicy {
        WritePolicy::from_flags(self.dry, self.overwrite, self.keep_all)
    }

    pub fn rename_mode(&self) -> RenameMode {
        RenameMode::from_flags(self.force_rename, self.no_rename)
    }

    pub fn tool_selection(&self) -> ToolSelection {
        if !self.tools.is_empty() {
            ToolSelection::Named(self.tools.clone())
        } else if self.all {
            ToolSelection::All
        } else {
            ToolSelection::PresetDefaults
        }
    }

    pub fn tool_output(&self) -> ToolOutput {
        if self.tool_print {
            ToolOutput::Inherit
        } else {
            ToolOutput::Discard
        }
    }

    /// Minimum benchmark duration, when decode times are measured
    pub fn decode_window(&self) -> Option<Duration> {
        let enabled = self.decode_time || self.select == Selection::DecodeTime;
        enabled.then_some(self.dt_measure)
    }

    /// Execute the CLI command
    pub async fn run(self) -> Result<(), RunError> {
        if self.no_color {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }
        if self.force_rename && self.no_rename {
            return Err(RunError::BadUsage(
                "cannot pass both --force-rename and --no-rename at once".to_string(),
            ));
        }

        let output = Output::new(self.verbose > 0, self.quiet);

        let config_path = commands::config::resolve_path(self.config.clone(), self.get_config_path, &output)?;
        if self.get_config_path {
            println!("{}", config_path.display());
            return Ok(());
        }
        if self.reset_config {
            commands::config::reset(&config_path, &output)?;
            if self.files.is_empty() {
                return Ok(());
            }
        }

        let snapshot = commands::config::load(&config_path, self.skip_validation)?;
        if self.list {
            commands::list::execute(&snapshot, &config_path, &output);
            return Ok(());
        }

        if self.files.is_empty() {
            use clap::CommandFactory;
            let _ = Cli::command().print_help();
            return Err(RunError::BadUsage("no files provided".to_string()));
        }

        commands::compress::execute(self, snapshot, config_path, output).await
    }
}

/// Parse `1.5s`, `500ms`, `2m` and similar; a bare number is milliseconds
fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    let amount: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {value:?}"))?;
    let nanos_per_unit = match unit.trim() {
        "" | "ms" => 1e6,
        "ns" => 1.0,
        "us" | "µs" => 1e3,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3600e9,
        other => return Err(format!("unknown duration unit {other:?} in {value:?}")),
    };
    let nanos = (amount * nanos_per_unit).round();
    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(format!("duration out of range: {value:?}"));
    }
    Ok(Duration::from_nanos(nanos as u64))
}
