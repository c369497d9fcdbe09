//! Tool availability probing
//!
//! A tool is runnable when its executable is found on the search path or in
//! the working directory. Tools built for another platform additionally need
//! a configured wrapper that is itself on the search path. The outcome is a
//! [`Launcher`], the invocation strategy used for every run of that tool.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::trace;

use crate::config::{ToolConfig, query_wrapper};

/// How a tool process is started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    /// The tool binary is the process entry point
    Native { program: PathBuf },
    /// The wrapper is the entry point and the tool path its first argument
    Wrapped { wrapper: PathBuf, program: PathBuf },
}

impl Launcher {
    /// A command primed with the entry point and, if wrapped, the tool path
    pub fn command(&self) -> Command {
        match self {
            Launcher::Native { program } => Command::new(program),
            Launcher::Wrapped { wrapper, program } => {
                let mut command = Command::new(wrapper);
                command.arg(program);
                command
            }
        }
    }

    /// Leading words of the command line, for display and reports
    pub fn prefix(&self) -> Vec<String> {
        match self {
            Launcher::Native { program } => vec![display_name(program)],
            Launcher::Wrapped { wrapper, program } => {
                vec![display_name(wrapper), program.display().to_string()]
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Platform name of the running host, in configuration vocabulary
pub fn host_platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Locates executables for a given host, search path and working directory
#[derive(Debug, Clone)]
pub struct Prober {
    host: String,
    search_path: Option<OsString>,
    cwd: PathBuf,
}

impl Prober {
    /// Prober for the running process
    pub fn system() -> Self {
        Self {
            host: host_platform().to_string(),
            search_path: std::env::var_os("PATH"),
            cwd: PathBuf::from("."),
        }
    }

    pub fn new(host: impl Into<String>, search_path: Option<OsString>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            search_path,
            cwd: cwd.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Find `name` on the search path only
    pub fn find_on_path(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }
        which::which_in(name, self.search_path.as_ref(), &self.cwd).ok()
    }

    /// Find a tool executable: search path, then working directory, then
    /// the working directory with `.exe` appended for Windows tools
    pub fn find_executable(&self, name: &str, tool_platforms: &[String]) -> Option<PathBuf> {
        if let Some(path) = self.find_on_path(name) {
            return Some(path);
        }
        if name.is_empty() {
            return None;
        }

        let local = self.cwd.join(name);
        if local.is_file() {
            return Some(local);
        }

        let windows_tool = tool_platforms.iter().any(|p| p == "windows");
        if windows_tool && !name.ends_with(".exe") {
            let local_exe = self.cwd.join(format!("{name}.exe"));
            if local_exe.is_file() {
                return Some(local_exe);
            }
        }

        None
    }

    /// Decide how (and whether) `tool` can run on this host
    ///
    /// `wrappers` is the wrapper table of this prober's host.
    pub fn probe(
        &self,
        tool_name: &str,
        tool: &ToolConfig,
        wrappers: Option<&BTreeMap<String, String>>,
    ) -> Option<Launcher> {
        let wrapper = if tool.runs_on(&self.host) {
            None
        } else {
            let Some(wrapper_name) = wrappers.and_then(|w| query_wrapper(w, &tool.platform, &self.host))
            else {
                trace!(tool = tool_name, host = %self.host, "no wrapper configured for foreign tool");
                return None;
            };
            let Some(wrapper) = self.find_on_path(wrapper_name) else {
                trace!(tool = tool_name, wrapper = wrapper_name, "wrapper not found");
                return None;
            };
            Some(wrapper)
        };

        let Some(program) = self.find_executable(&tool.command, &tool.platform) else {
            trace!(tool = tool_name, command = %tool.command, "executable not found");
            return None;
        };

        let launcher = match wrapper {
            Some(wrapper) => Launcher::Wrapped { wrapper, program },
            None => Launcher::Native { program },
        };
        trace!(tool = tool_name, ?launcher, "tool available");
        Some(launcher)
    }
}
