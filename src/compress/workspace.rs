use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::FileInfo;
use super::evaluate::artifact_path;

/// Run-scoped directory holding every temporary artifact
///
/// Each input file gets its own sub-directory, keyed by its index, so inputs
/// sharing a base name never collide. Dropping the workspace removes
/// everything in it.
#[derive(Debug)]
pub struct Workspace {
    root: TempDir,
}

impl Workspace {
    pub fn new(file_count: usize) -> io::Result<Self> {
        let root = tempfile::Builder::new().prefix("compacty-").tempdir()?;
        for index in 0..file_count {
            std::fs::create_dir(root.path().join(index.to_string()))?;
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Temp path of `tool`'s artifact for the file at `index`
    pub fn artifact_path(&self, index: usize, file: &FileInfo, tool: &str) -> PathBuf {
        let directory = self.root.path().join(index.to_string());
        artifact_path(&directory, &file.base_name, tool, &file.extension)
    }

    /// Remove the workspace now, reporting failures
    pub fn close(self) -> io::Result<()> {
        self.root.close()
    }
}
