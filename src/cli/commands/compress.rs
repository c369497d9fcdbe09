//! The compression run
//!
//! Jobs are processed one after another on a blocking thread while a signal
//! listener waits for Ctrl-C (and SIGTERM on Unix) to fire the run's
//! cancellation handle. Temp workspaces of finished jobs are kept until the
//! run ends.

use anyhow::{Context, anyhow};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::{Cli, Output, summary};
use crate::compress::{CompressionProcess, ProcessOptions, RoundError, Selection, WritePolicy};
use crate::config::ConfigSnapshot;
use crate::detect::MagicSniffer;
use crate::error::RunError;
use crate::jobs::{self, CompressionJob, RenameMode, ToolSelection};
use crate::parallel::{CancelHandle, ParallelConfig};
use crate::utils::plural_noun;

use super::list;

/// Everything the run needs from the command line
#[derive(Debug, Clone)]
pub struct CompressRequest {
    pub files: Vec<PathBuf>,
    pub preset: String,
    pub selection: ToolSelection,
    pub per_file: bool,
    pub rename: RenameMode,
    pub policy: WritePolicy,
    pub select: Selection,
    pub decode_window: Option<Duration>,
    pub report: bool,
    pub options: ProcessOptions,
}

/// Execute the compress command
pub async fn execute(
    cli: Cli,
    snapshot: ConfigSnapshot,
    config_path: PathBuf,
    output: Output,
) -> Result<(), RunError> {
    let config = snapshot.config();
    let queried = cli
        .preset
        .clone()
        .unwrap_or_else(|| config.default_preset.clone());

    let Some(found) = config.query_preset(&queried) else {
        eprint!("{}", list::render_presets(&snapshot));
        return Err(RunError::BadUsage(format!(
            "attempting to use unknown preset: {queried}"
        )));
    };
    if found.via_shorthand {
        output.info(&format!("Using preset: {queried} -> {}", found.name));
    } else {
        output.info(&format!("Using preset: {}", found.name));
    }

    let request = CompressRequest {
        preset: found.name.to_string(),
        selection: cli.tool_selection(),
        per_file: cli.per_file,
        rename: cli.rename_mode(),
        policy: cli.write_policy(),
        select: cli.select,
        decode_window: cli.decode_window(),
        report: cli.report,
        options: ProcessOptions {
            tool_output: cli.tool_output(),
            parallel: ParallelConfig::with_max_workers(cli.jobs),
        },
        files: cli.files,
    };

    if request.decode_window.is_some() {
        output.warning("Decode time benchmarking is EXPERIMENTAL and MAY NOT reflect real-world performance!");
    }

    let cancel = CancelHandle::new();
    let listener = tokio::spawn(listen_for_interrupt(cancel.clone()));

    let outcome = tokio::task::spawn_blocking(move || {
        run(&request, &snapshot, &config_path, &cancel, output)
    })
    .await
    .map_err(|err| anyhow!("compression task failed: {err}"));
    listener.abort();

    outcome?
}

/// Fire `cancel` on the first interrupt or termination signal
async fn listen_for_interrupt(cancel: CancelHandle) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("cannot listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("interrupt received, stopping");
    cancel.cancel();
}

/// The blocking part of the run: group, schedule, compress, evaluate
pub fn run(
    request: &CompressRequest,
    snapshot: &ConfigSnapshot,
    config_path: &Path,
    cancel: &CancelHandle,
    output: Output,
) -> Result<(), RunError> {
    let groups = jobs::group_by_type(&request.files, snapshot, &MagicSniffer, request.rename, &output);
    if groups.is_empty() {
        return Err(RunError::BadInput("no valid inputs".to_string()));
    }
    let jobs = jobs::build_jobs(
        groups,
        snapshot,
        &request.preset,
        &request.selection,
        request.per_file,
        &output,
    );

    let mut has_tools = false;
    let mut has_run = false;
    let mut has_errors = false;
    // Workspaces are removed when the run ends, on every path
    let mut finished = Vec::with_capacity(jobs.len());

    for job in &jobs {
        if !job.has_tools() {
            output.warning(&format!(
                "No valid tools found for file format {} ({}).",
                job.extension, job.mime
            ));
            continue;
        }
        has_tools = true;

        let (mut process, all_read) =
            CompressionProcess::new(&job.paths, request.options.clone(), cancel.clone(), output)
                .context("cannot create a temporary workspace")?;
        has_errors |= !all_read;

        if process.files().is_empty() {
            output.warning(&format!("Cannot find valid {} paths.", job.extension));
            continue;
        }
        has_run = true;

        run_rounds(&mut process, job, request, &output).map_err(|err| match err {
            RoundError::Interrupted => RunError::Interrupted,
            RoundError::WorkerPanic => RunError::Other(anyhow!(err)),
        })?;

        has_errors |= !summary::save_results(&process, request.select, request.policy, &output);
        has_errors |= !process.is_error_free();

        if request.report {
            match crate::report::write_report(&process, &job.extension) {
                Ok(path) => output.success(&format!("Result written to {}.", path.display())),
                Err(err) => {
                    output.warning(&format!(
                        "Cannot write report for file format {}: {err:#}",
                        job.extension
                    ));
                    has_errors = true;
                }
            }
        }

        finished.push(process);
    }

    if !has_tools {
        if !snapshot.has_available_tools() {
            list::print_with_install_hint(snapshot, config_path, &output);
        }
        return Err(RunError::BadUsage("no valid tools".to_string()));
    }
    if !has_run {
        return Err(RunError::BadInput("no valid inputs".to_string()));
    }
    if has_errors {
        return Err(RunError::PartialFailure);
    }
    Ok(())
}

fn run_rounds(
    process: &mut CompressionProcess,
    job: &CompressionJob,
    request: &CompressRequest,
    output: &Output,
) -> Result<(), RoundError> {
    let count = process.files().len();

    if !job.batch_tools.is_empty() {
        let paths: Vec<String> = process
            .files()
            .iter()
            .map(|file| file.path.display().to_string())
            .collect();
        output.info(&format!(
            "Compressing {count} {} {}: {}",
            job.extension,
            plural_noun(count, "files", "file"),
            paths.join(" ")
        ));
        process.compress_all(&job.batch_tools)?;
        output.blank_line();
    }

    if !job.per_file_tools.is_empty() {
        output.info("Running per-file tools.");
        for index in 0..count {
            let path = process.files()[index].path.display().to_string();
            output.info(&format!(
                "Compressing {} file #{}: {path}",
                job.extension,
                index + 1
            ));
            process.compress_single(index, &job.per_file_tools)?;
            output.blank_line();
        }
    }

    if let Some(minimum) = request.decode_window {
        process.benchmark_decode_time(minimum)?;
    }
    Ok(())
}
