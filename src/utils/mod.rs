//! Utility functions for compacty
//!
//! Small helpers shared by the orchestrator, the summary and the report.

use std::io;
use std::path::Path;

/// Copy `source` to `destination`, replacing any existing file
pub fn copy_file<P: AsRef<Path>, Q: AsRef<Path>>(source: P, destination: Q) -> io::Result<()> {
    std::fs::copy(source, destination).map(|_| ())
}

/// Size of the file at `path` in bytes
pub fn file_size<P: AsRef<Path>>(path: P) -> io::Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}

/// Pick the singular or plural form of a noun for `count`
pub fn plural_noun<'a>(count: usize, plural: &'a str, singular: &'a str) -> &'a str {
    if count == 1 { singular } else { plural }
}

/// Bytes to (decimal) megabytes
pub fn to_megabytes(bytes: u64) -> f64 {
    const BYTES_PER_MEGABYTE: f64 = 1_000_000.0;
    bytes as f64 / BYTES_PER_MEGABYTE
}

/// `part` as a percentage of `whole`; zero when `whole` is empty
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Check if a file has a specific extension (leading dot included)
pub fn has_extension<P: AsRef<Path>>(path: P, extension: &str) -> bool {
    dotted_extension(path.as_ref()) == extension
}

/// The extension of `path` with its leading dot, or an empty string
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}
