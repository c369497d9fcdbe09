use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{Child, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{CompressionResult, FileInfo, ScheduledTool, ToolOutput};
use crate::error::ExecutionError;
use crate::parallel::CancelHandle;
use crate::utils;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Command lines with more inputs than this are abbreviated on screen
const DISPLAYED_INPUTS: usize = 5;

/// Where one (file, tool) pair's output is expected
#[derive(Debug)]
pub(crate) struct Target {
    pub index: usize,
    pub artifact: PathBuf,
    pub create_error: Option<ExecutionError>,
}

/// One scheduled process invocation
#[derive(Debug)]
pub(crate) struct ExecutionUnit {
    pub tool: ScheduledTool,
    /// Trailing positional arguments
    pub inputs: Vec<PathBuf>,
    /// Receives the tool's standard output in stdout mode
    pub stdout: Option<File>,
    pub targets: Vec<Target>,
    /// Set when preparation already failed; the process is never spawned
    pub prepare_error: Option<ExecutionError>,
}

/// Outcome of running a unit's process
#[derive(Debug)]
pub(crate) struct UnitRun {
    pub elapsed: Duration,
    pub error: Option<ExecutionError>,
}

impl ExecutionUnit {
    pub fn new(tool: ScheduledTool) -> Self {
        Self {
            tool,
            inputs: Vec::new(),
            stdout: None,
            targets: Vec::new(),
            prepare_error: None,
        }
    }

    /// Program, wrapper prefix and resolved arguments, without inputs
    pub fn command_line(&self) -> Vec<String> {
        let mut line = self.tool.launcher.prefix();
        line.extend(self.tool.arguments.iter().cloned());
        line
    }

    /// The invocation as shown to the user
    pub fn display_line(&self) -> String {
        let mut words = self.command_line();
        if self.inputs.len() > DISPLAYED_INPUTS {
            words.push(format!("[{} files]", self.inputs.len()));
        } else {
            words.extend(self.inputs.iter().map(|path| path.display().to_string()));
        }
        if self.stdout.is_some() {
            if let Some(target) = self.targets.first() {
                words.push(">".to_string());
                words.push(target.artifact.display().to_string());
            }
        }
        words.join(" ")
    }

    /// Spawn the tool and wait for it, killing it if the run is cancelled
    pub fn execute(&mut self, cancel: &CancelHandle, tool_output: ToolOutput) -> UnitRun {
        let start = Instant::now();
        let error = self.run_process(cancel, tool_output).err();
        let elapsed = start.elapsed();

        match &error {
            None => debug!(tool = %self.tool.name, ?elapsed, "tool finished"),
            Some(err) => warn!(tool = %self.tool.name, ?elapsed, "tool failed: {err}"),
        }

        UnitRun { elapsed, error }
    }

    fn run_process(
        &mut self,
        cancel: &CancelHandle,
        tool_output: ToolOutput,
    ) -> Result<(), ExecutionError> {
        if let Some(err) = self.prepare_error.take() {
            return Err(err);
        }
        if self.inputs.is_empty() {
            return Err(ExecutionError::NoInput);
        }
        if cancel.is_cancelled() {
            return Err(ExecutionError::Interrupted);
        }

        let stdout_file = self.stdout.take();
        let stdout = match &stdout_file {
            Some(file) => Stdio::from(file.try_clone().map_err(|err| self.spawn_error(&err))?),
            None => tool_output.stdio(),
        };

        let mut command = self.tool.launcher.command();
        command
            .args(&self.tool.arguments)
            .args(&self.inputs)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(tool_output.stdio());
        debug!(tool = %self.tool.name, command = ?command, "spawning");

        let mut child = command.spawn().map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ExecutionError::ToolNotFound,
            _ => self.spawn_error(&err),
        })?;
        // Release the parent's copy of the redirected handle
        drop(command);

        let status = wait_or_kill(&mut child, cancel).map_err(|err| self.spawn_error(&err))?;
        let Some(status) = status else {
            return Err(ExecutionError::Interrupted);
        };
        if !status.success() {
            return Err(ExecutionError::ExitStatus {
                status: status.to_string(),
                code: status.code(),
            });
        }

        if let Some(file) = stdout_file {
            file.sync_all()
                .map_err(|err| ExecutionError::CloseOutput(err.to_string()))?;
        }
        Ok(())
    }

    fn spawn_error(&self, err: &io::Error) -> ExecutionError {
        ExecutionError::Spawn {
            program: self.tool.name.clone(),
            message: err.to_string(),
        }
    }

    /// One result per target, in target order
    pub fn into_results(self, run: UnitRun, files: &[FileInfo]) -> Vec<(usize, CompressionResult)> {
        let command_line = self.command_line();
        let ExecutionUnit { tool, targets, .. } = self;

        targets
            .into_iter()
            .map(|target| {
                let file = &files[target.index];
                let mut result = CompressionResult {
                    tool: tool.name.clone(),
                    command_line: command_line.clone(),
                    elapsed: run.elapsed,
                    original_size: file.size,
                    final_size: file.size,
                    artifact: target.artifact,
                    error: None,
                    decode: None,
                };

                if let Some(err) = target.create_error {
                    result.error = Some(err);
                } else if let Some(err) = &run.error {
                    result.error = Some(err.clone());
                } else {
                    match utils::file_size(&result.artifact) {
                        Ok(size) => result.final_size = size,
                        Err(err) => {
                            result.error = Some(ExecutionError::ReadSize {
                                path: result.artifact.clone(),
                                message: err.to_string(),
                            })
                        }
                    }
                }

                (target.index, result)
            })
            .collect()
    }
}

/// `Ok(None)` when the child was killed because the run was cancelled
fn wait_or_kill(child: &mut Child, cancel: &CancelHandle) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
