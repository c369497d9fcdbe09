//! Winner selection and artifact placement
//!
//! Results are always visited in tool-name order and only a strictly better
//! candidate replaces the current best, so ties go to the lexicographically
//! first tool.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{CompressionResult, FileInfo};

/// What happens to the temp artifacts of a file once it is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Report only
    Dry,
    /// Move the winner beside the original as `<base>-<tool><ext>`
    #[default]
    KeepBest,
    /// Move every existing artifact beside the original
    KeepAll,
    /// Move the winner over the original
    Overwrite,
}

impl WritePolicy {
    /// Resolve the policy from flags; dry > overwrite > keep-all > keep-best
    pub fn from_flags(dry: bool, overwrite: bool, keep_all: bool) -> Self {
        if dry {
            Self::Dry
        } else if overwrite {
            Self::Overwrite
        } else if keep_all {
            Self::KeepAll
        } else {
            Self::KeepBest
        }
    }
}

/// Criterion used to pick the candidate that gets written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Selection {
    #[default]
    Size,
    DecodeTime,
}

/// Winners of one file under both criteria; `None` means the original
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Winners {
    pub by_size: Option<String>,
    pub by_decode_time: Option<String>,
}

impl Winners {
    pub fn select(&self, selection: Selection) -> Option<&str> {
        match selection {
            Selection::Size => self.by_size.as_deref(),
            Selection::DecodeTime => self.by_decode_time.as_deref(),
        }
    }
}

/// Smallest error-free result strictly below the original size
pub fn best_by_size<'a, I>(file: &FileInfo, results: I) -> Option<String>
where
    I: IntoIterator<Item = (&'a str, &'a CompressionResult)>,
{
    let mut best: Option<(&str, u64)> = None;
    for (tool, result) in results {
        if result.has_error() {
            continue;
        }
        let limit = best.map_or(file.size, |(_, size)| size);
        if result.final_size < limit {
            best = Some((tool, result.final_size));
        }
    }
    best.map(|(tool, _)| tool.to_string())
}

/// Fastest-decoding error-free result that beats the original's average
pub fn best_by_decode_time<'a, I>(file: &FileInfo, results: I) -> Option<String>
where
    I: IntoIterator<Item = (&'a str, &'a CompressionResult)>,
{
    let baseline = file.decode.as_ref().filter(|bench| bench.is_measured())?.average;

    let mut best: Option<(&str, std::time::Duration)> = None;
    for (tool, result) in results {
        if result.has_error() {
            continue;
        }
        let Some(bench) = result.decode.as_ref().filter(|bench| bench.is_measured()) else {
            continue;
        };
        let limit = best.map_or(baseline, |(_, average)| average);
        if bench.average < limit {
            best = Some((tool, bench.average));
        }
    }
    best.map(|(tool, _)| tool.to_string())
}

/// `<directory>/<base>-<tool><extension>`
pub fn artifact_path(directory: &Path, base_name: &str, tool: &str, extension: &str) -> PathBuf {
    directory.join(format!("{base_name}-{tool}{extension}"))
}

/// Where an artifact went, or why it did not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub tool: String,
    pub destination: PathBuf,
    pub error: Option<String>,
}

impl Placement {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Apply `policy` to one file's artifacts
///
/// `chosen` is the winner under the selected criterion. Under keep-all every
/// artifact that exists is moved regardless of its result.
pub fn apply_policy<'a, I>(
    file: &FileInfo,
    chosen: Option<&str>,
    results: I,
    policy: WritePolicy,
) -> Vec<Placement>
where
    I: IntoIterator<Item = (&'a str, &'a CompressionResult)>,
{
    match policy {
        WritePolicy::Dry => Vec::new(),
        WritePolicy::KeepAll => results
            .into_iter()
            .filter(|(_, result)| result.artifact.is_file())
            .map(|(tool, result)| {
                let destination =
                    artifact_path(&file.directory, &file.base_name, tool, &file.extension);
                place(tool, &result.artifact, destination)
            })
            .collect(),
        WritePolicy::KeepBest | WritePolicy::Overwrite => {
            let Some(chosen) = chosen else {
                return Vec::new();
            };
            let Some((tool, result)) = results.into_iter().find(|(tool, _)| *tool == chosen)
            else {
                return Vec::new();
            };
            let destination = if policy == WritePolicy::Overwrite {
                file.path.clone()
            } else {
                artifact_path(&file.directory, &file.base_name, tool, &file.extension)
            };
            vec![place(tool, &result.artifact, destination)]
        }
    }
}

fn place(tool: &str, source: &Path, destination: PathBuf) -> Placement {
    let error = match move_file(source, &destination) {
        Ok(()) => {
            debug!(tool, destination = %destination.display(), "artifact placed");
            None
        }
        Err(err) => {
            warn!(tool, destination = %destination.display(), "failed to place artifact: {err}");
            Some(err.to_string())
        }
    };
    Placement {
        tool: tool.to_string(),
        destination,
        error,
    }
}

/// Rename, falling back to copy then delete across filesystems
pub fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    move_file_with(source, destination, |from, to| std::fs::rename(from, to))
}

pub(crate) fn move_file_with<F>(source: &Path, destination: &Path, rename: F) -> io::Result<()>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    match rename(source, destination) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            debug!(source = %source.display(), "rename crosses devices, copying instead");
            std::fs::copy(source, destination)?;
            std::fs::remove_file(source)
        }
        Err(err) => Err(err),
    }
}
