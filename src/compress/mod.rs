//! Compression orchestrator
//!
//! A [`CompressionProcess`] owns one job's files, their temp workspace and the
//! result table. Rounds are run on the worker pool and joined before the next
//! phase starts:
//!
//! - a batch round runs every batch-overwrite tool once over temp copies of
//!   all files
//! - a per-file round runs every given tool against a single file
//!
//! Every tool of a round runs concurrently. Results flow back through the
//! pool's collector, so the table has a single writer.

pub mod decode;
pub mod evaluate;
mod unit;
mod workspace;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cli::Output;
use crate::config::OutputMode;
use crate::error::ExecutionError;
use crate::parallel::{CancelHandle, ParallelConfig, ParallelProcessor};
use crate::probe::Launcher;
use crate::utils::{copy_file, dotted_extension, plural_noun};

pub use decode::DecodeBench;
pub use evaluate::{Placement, Selection, Winners, WritePolicy};
pub use workspace::Workspace;

use unit::{ExecutionUnit, Target, UnitRun};

/// A tool ready to be scheduled: arguments resolved, launcher chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTool {
    pub name: String,
    pub output_mode: OutputMode,
    pub arguments: Vec<String>,
    pub launcher: Launcher,
}

/// What tools may print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolOutput {
    #[default]
    Discard,
    Inherit,
}

impl ToolOutput {
    fn stdio(self) -> Stdio {
        match self {
            ToolOutput::Discard => Stdio::null(),
            ToolOutput::Inherit => Stdio::inherit(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub tool_output: ToolOutput,
    pub parallel: ParallelConfig,
}

/// An original input file
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub directory: PathBuf,
    pub file_name: String,
    /// File name without its extension
    pub base_name: String,
    /// Extension with its leading dot, possibly empty
    pub extension: String,
    pub size: u64,
    pub decode: Option<DecodeBench>,
}

impl FileInfo {
    pub fn read(path: &Path) -> io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"));
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            file_name,
            base_name,
            extension: dotted_extension(path),
            size: metadata.len(),
            decode: None,
        })
    }
}

/// Outcome of one (file, tool) invocation
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    pub tool: String,
    /// Program and tool arguments, without file paths
    pub command_line: Vec<String>,
    pub elapsed: Duration,
    pub original_size: u64,
    /// Equals `original_size` when no size could be read
    pub final_size: u64,
    pub artifact: PathBuf,
    pub error: Option<ExecutionError>,
    pub decode: Option<DecodeBench>,
}

impl CompressionResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The invocation failed or its output did not decode
    pub fn has_error(&self) -> bool {
        !self.is_ok() || self.decode.as_ref().is_some_and(|bench| bench.error.is_some())
    }
}

/// Results keyed by tool name, one slot per file index
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    file_count: usize,
    by_tool: BTreeMap<String, Vec<Option<CompressionResult>>>,
}

impl ResultTable {
    pub fn new(file_count: usize) -> Self {
        Self {
            file_count,
            by_tool: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, index: usize, result: CompressionResult) {
        let file_count = self.file_count;
        let slots = self
            .by_tool
            .entry(result.tool.clone())
            .or_insert_with(|| vec![None; file_count]);
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(result);
        }
    }

    pub fn get(&self, tool: &str, index: usize) -> Option<&CompressionResult> {
        self.by_tool.get(tool)?.get(index)?.as_ref()
    }

    /// Tools with at least one recorded result, in name order
    pub fn tools(&self) -> impl Iterator<Item = &str> {
        self.by_tool.keys().map(String::as_str)
    }

    /// Every result recorded for the file at `index`, in tool-name order
    pub fn for_file(&self, index: usize) -> impl Iterator<Item = (&str, &CompressionResult)> {
        self.by_tool.iter().filter_map(move |(tool, slots)| {
            slots.get(index)?.as_ref().map(|result| (tool.as_str(), result))
        })
    }

    fn for_file_mut(&mut self, index: usize) -> impl Iterator<Item = &mut CompressionResult> {
        self.by_tool
            .values_mut()
            .filter_map(move |slots| slots.get_mut(index)?.as_mut())
    }

    /// No invocation failed and no benchmark hit a decode error
    pub fn is_error_free(&self) -> bool {
        self.by_tool
            .values()
            .flatten()
            .flatten()
            .all(|result| !result.has_error())
    }
}

/// A round stopped before producing a complete result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoundError {
    #[error("interrupted")]
    Interrupted,
    #[error("a worker thread panicked")]
    WorkerPanic,
}

/// One job's files, temp artifacts and results
#[derive(Debug)]
pub struct CompressionProcess {
    files: Vec<FileInfo>,
    results: ResultTable,
    workspace: Workspace,
    options: ProcessOptions,
    cancel: CancelHandle,
    decode_window: Option<Duration>,
    output: Output,
}

impl CompressionProcess {
    /// Read every path; unreadable ones are skipped with a warning
    ///
    /// The flag is false when at least one path was skipped.
    pub fn new(
        paths: &[PathBuf],
        options: ProcessOptions,
        cancel: CancelHandle,
        output: Output,
    ) -> io::Result<(Self, bool)> {
        let mut all_read = true;
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match FileInfo::read(path) {
                Ok(file) => files.push(file),
                Err(err) => {
                    warn!(path = %path.display(), "cannot read input: {err}");
                    output.warning(&format!("Cannot compress {}: {err}. Skipping...", path.display()));
                    all_read = false;
                }
            }
        }

        let workspace = Workspace::new(files.len())?;
        debug!(workspace = %workspace.path().display(), files = files.len(), "workspace ready");

        let process = Self {
            results: ResultTable::new(files.len()),
            files,
            workspace,
            options,
            cancel,
            decode_window: None,
            output,
        };
        Ok((process, all_read))
    }

    pub fn files(&self) -> &[FileInfo] {
        &self.files
    }

    pub fn results(&self) -> &ResultTable {
        &self.results
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Minimum benchmark duration, once decode times were measured
    pub fn decode_window(&self) -> Option<Duration> {
        self.decode_window
    }

    pub fn is_error_free(&self) -> bool {
        self.results.is_error_free()
    }

    /// Batch round: every batch-overwrite tool once over copies of all files
    pub fn compress_all(&mut self, tools: &[ScheduledTool]) -> Result<(), RoundError> {
        let mut units = Vec::with_capacity(tools.len());
        for tool in tools {
            if !tool.output_mode.can_batch() {
                warn!(tool = %tool.name, mode = tool.output_mode.as_str(), "tool cannot run in a batch round");
                continue;
            }

            let mut unit = ExecutionUnit::new(tool.clone());
            for (index, file) in self.files.iter().enumerate() {
                let artifact = self.workspace.artifact_path(index, file, &tool.name);
                let create_error = match copy_file(&file.path, &artifact) {
                    Ok(()) => {
                        unit.inputs.push(artifact.clone());
                        None
                    }
                    Err(err) => Some(self.create_failed(&artifact, &err)),
                };
                unit.targets.push(Target {
                    index,
                    artifact,
                    create_error,
                });
            }
            units.push(unit);
        }

        self.run_round(units)
    }

    /// Per-file round: every tool against the file at `index`
    pub fn compress_single(&mut self, index: usize, tools: &[ScheduledTool]) -> Result<(), RoundError> {
        let Some(file) = self.files.get(index) else {
            return Ok(());
        };

        let mut units = Vec::with_capacity(tools.len());
        for tool in tools {
            let artifact = self.workspace.artifact_path(index, file, &tool.name);
            let mut unit = ExecutionUnit::new(tool.clone());
            let mut create_error = None;

            match tool.output_mode {
                OutputMode::BatchOverwrite => match copy_file(&file.path, &artifact) {
                    Ok(()) => unit.inputs.push(artifact.clone()),
                    Err(err) => create_error = Some(self.create_failed(&artifact, &err)),
                },
                OutputMode::InputOutput => {
                    unit.inputs.push(file.path.clone());
                    unit.inputs.push(artifact.clone());
                }
                OutputMode::Stdout => match File::create(&artifact) {
                    Ok(handle) => {
                        unit.inputs.push(file.path.clone());
                        unit.stdout = Some(handle);
                    }
                    Err(err) => create_error = Some(self.create_failed(&artifact, &err)),
                },
            }

            if create_error.is_none() && !file.path.is_file() {
                unit.prepare_error = Some(ExecutionError::MissingInput(file.path.clone()));
            }
            unit.targets.push(Target {
                index,
                artifact,
                create_error,
            });
            units.push(unit);
        }

        self.run_round(units)
    }

    fn create_failed(&self, artifact: &Path, err: &io::Error) -> ExecutionError {
        warn!(artifact = %artifact.display(), "cannot create temp file: {err}");
        self.output
            .warning(&format!("Failed to create temp file {}: {err}", artifact.display()));
        ExecutionError::CreateTemp {
            path: artifact.to_path_buf(),
            message: err.to_string(),
        }
    }

    fn run_round(&mut self, units: Vec<ExecutionUnit>) -> Result<(), RoundError> {
        if self.cancel.is_cancelled() {
            return Err(RoundError::Interrupted);
        }
        if units.is_empty() {
            return Ok(());
        }

        for unit in &units {
            self.output.command_line(&unit.display_line());
        }

        let files = &self.files;
        let cancel = &self.cancel;
        let output = self.output;
        let tool_output = self.options.tool_output;

        let processor = ParallelProcessor::new(self.options.parallel.clone());
        let outcomes = processor
            .process(units, |mut unit| {
                let run = unit.execute(cancel, tool_output);
                report_run(output, &unit.tool.name, &run);
                unit.into_results(run, files)
            })
            .map_err(|_| RoundError::WorkerPanic)?;

        for (index, result) in outcomes.into_iter().flatten() {
            self.results.insert(index, result);
        }

        if self.cancel.is_cancelled() {
            Err(RoundError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Benchmark the originals and every artifact, one file at a time
    pub fn benchmark_decode_time(&mut self, minimum: Duration) -> Result<(), RoundError> {
        self.decode_window = Some(minimum);
        let total = self.files.len();
        self.output.info(&format!(
            "Computing decode time for {total} {}:",
            plural_noun(total, "files", "file")
        ));

        for index in 0..total {
            if self.cancel.is_cancelled() {
                return Err(RoundError::Interrupted);
            }

            let file = &mut self.files[index];
            self.output
                .step(&format!("{} ({}/{total})", file.path.display(), index + 1));
            let bench = decode::bench_file(&file.path, minimum);
            if let Some(err) = &bench.error {
                self.output
                    .warning(&format!("Cannot decode {}: {err}", file.path.display()));
            }
            file.decode = Some(bench);

            for result in self.results.for_file_mut(index) {
                if self.cancel.is_cancelled() {
                    return Err(RoundError::Interrupted);
                }
                let missing = result.error.as_ref().is_some_and(ExecutionError::is_create_error)
                    || !result.artifact.is_file();
                let bench = if missing {
                    DecodeBench::failed("output file doesn't exist")
                } else {
                    decode::bench_file(&result.artifact, minimum)
                };
                if let Some(err) = &bench.error {
                    self.output.warning(&format!("Cannot decode {} output: {err}", result.tool));
                }
                result.decode = Some(bench);
            }
        }
        Ok(())
    }

    /// Size and decode-time winners of the file at `index`
    pub fn winners(&self, index: usize) -> Winners {
        let Some(file) = self.files.get(index) else {
            return Winners::default();
        };
        Winners {
            by_size: evaluate::best_by_size(file, self.results.for_file(index)),
            by_decode_time: evaluate::best_by_decode_time(file, self.results.for_file(index)),
        }
    }

    /// Apply `policy` to the file at `index`
    pub fn flush(&self, index: usize, chosen: Option<&str>, policy: WritePolicy) -> Vec<Placement> {
        match self.files.get(index) {
            Some(file) => evaluate::apply_policy(file, chosen, self.results.for_file(index), policy),
            None => Vec::new(),
        }
    }

    /// Remove the temp workspace now instead of on drop
    pub fn close(self) -> io::Result<()> {
        self.workspace.close()
    }
}

fn report_run(output: Output, tool: &str, run: &UnitRun) {
    match &run.error {
        None => output.verbose(&format!("{tool} finished in {:.3?}", run.elapsed)),
        Some(ExecutionError::Interrupted) => {}
        Some(err) => output.warning(&format!("{tool} errored in {:.3?}: {err}", run.elapsed)),
    }
}
