//! Error types shared across compacty
//!
//! Reference and configuration errors stop a run before any file is touched.
//! Execution errors are recorded per (file, tool) pair and never abort sibling
//! invocations. [`RunError`] is the terminal error of the CLI and carries the
//! process exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while expanding a tool's argument references
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// A reference names a list the tool does not define
    #[error("tool: {tool:?} references undefined argument list {name:?} (reached via {})", describe_chain(.chain))]
    Unknown {
        tool: String,
        name: String,
        chain: Vec<String>,
    },

    /// A reference revisits a list already on the expansion path
    #[error("tool: {tool:?} has a cyclic argument reference: {}", .trace.join(" -> "))]
    Cycle { tool: String, trace: Vec<String> },
}

impl ReferenceError {
    /// The expansion path rendered as `a -> b -> c`
    pub fn trace(&self) -> String {
        match self {
            Self::Unknown { name, chain, .. } => {
                let mut path = chain.clone();
                path.push(name.clone());
                path.join(" -> ")
            }
            Self::Cycle { trace, .. } => trace.join(" -> "),
        }
    }
}

fn describe_chain(chain: &[String]) -> String {
    if chain.is_empty() {
        "<top level>".to_string()
    } else {
        chain.join(" -> ")
    }
}

/// A single configuration validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

/// Every validation failure found in one configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
pub struct ConfigErrors(pub Vec<ConfigError>);

impl ConfigErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigError> {
        self.0.iter()
    }
}

/// Failure of one (file, tool) invocation
///
/// Messages are captured as strings so results stay `Clone` and comparable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("tool not found")]
    ToolNotFound,

    #[error("no input given")]
    NoInput,

    #[error("input {} does not exist", .0.display())]
    MissingInput(PathBuf),

    #[error("cannot create temp file {}: {message}", .path.display())]
    CreateTemp { path: PathBuf, message: String },

    #[error("failed to start {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{status}")]
    ExitStatus { status: String, code: Option<i32> },

    #[error("failed to close output: {0}")]
    CloseOutput(String),

    #[error("cannot read size of {}: {message}", .path.display())]
    ReadSize { path: PathBuf, message: String },

    #[error("interrupted")]
    Interrupted,
}

impl ExecutionError {
    /// Short label used in summaries and reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreateTemp { .. } => "CANNOT CREATE OUTPUT FILE",
            Self::ReadSize { .. } => "FILE SIZE ERROR",
            Self::Interrupted => "INTERRUPTED",
            _ => "COMPRESSION FAILED DUE TO ERROR",
        }
    }

    pub fn is_create_error(&self) -> bool {
        matches!(self, Self::CreateTemp { .. })
    }
}

/// Terminal error of a CLI run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    BadUsage(String),

    #[error("{0}")]
    BadInput(String),

    #[error("{0}")]
    InvalidConfig(String),

    #[error("{0}")]
    ConfigUnavailable(String),

    #[error("interrupted")]
    Interrupted,

    #[error("error(s) occurred during compression")]
    PartialFailure,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub mod exit_code {
    pub const FAILURE: u8 = 1;
    pub const BAD_USAGE: u8 = 2;
    pub const BAD_INPUT: u8 = 3;
    pub const BAD_CONFIG: u8 = 10;
    pub const CANNOT_RETRIEVE_CONFIG: u8 = 11;
    pub const INTERRUPTED: u8 = 130;
}

impl RunError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::BadUsage(_) => exit_code::BAD_USAGE,
            Self::BadInput(_) => exit_code::BAD_INPUT,
            Self::InvalidConfig(_) => exit_code::BAD_CONFIG,
            Self::ConfigUnavailable(_) => exit_code::CANNOT_RETRIEVE_CONFIG,
            Self::Interrupted => exit_code::INTERRUPTED,
            Self::PartialFailure | Self::Other(_) => exit_code::FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_contains_trace() {
        let err = ReferenceError::Cycle {
            tool: "ect".to_string(),
            trace: vec!["start".to_string(), "start".to_string()],
        };
        assert!(err.to_string().contains("start -> start"));
        assert_eq!(err.trace(), "start -> start");
    }

    #[test]
    fn test_unknown_message_names_tool_and_chain() {
        let err = ReferenceError::Unknown {
            tool: "oxipng".to_string(),
            name: "missing".to_string(),
            chain: vec!["start".to_string(), "one".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("\"oxipng\""));
        assert!(message.contains("\"missing\""));
        assert!(message.contains("start -> one"));
        assert_eq!(err.trace(), "start -> one -> missing");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunError::BadUsage("x".into()).exit_code(), 2);
        assert_eq!(RunError::BadInput("x".into()).exit_code(), 3);
        assert_eq!(RunError::InvalidConfig("x".into()).exit_code(), 10);
        assert_eq!(RunError::ConfigUnavailable("x".into()).exit_code(), 11);
        assert_eq!(RunError::Interrupted.exit_code(), 130);
        assert_eq!(RunError::PartialFailure.exit_code(), 1);
    }

    #[test]
    fn test_execution_labels() {
        let create = ExecutionError::CreateTemp {
            path: PathBuf::from("/tmp/x"),
            message: "denied".into(),
        };
        assert_eq!(create.label(), "CANNOT CREATE OUTPUT FILE");
        assert!(create.is_create_error());
        assert_eq!(ExecutionError::NoInput.label(), "COMPRESSION FAILED DUE TO ERROR");
    }
}
