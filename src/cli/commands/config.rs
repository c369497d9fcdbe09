//! Configuration actions
//!
//! Locating, resetting and loading the configuration file. Failures map to
//! the configuration exit codes.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cli::Output;
use crate::config::{self, Config, ConfigSnapshot};
use crate::error::RunError;

/// The explicit `--config` path, or the user config (created when missing)
pub fn resolve_path(explicit: Option<PathBuf>, quiet_creation: bool, output: &Output) -> Result<PathBuf, RunError> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    let (path, created) = config::get_or_create_user_config()
        .map_err(|err| RunError::ConfigUnavailable(format!("can't retrieve config file: {err:#}")))?;
    if created && !quiet_creation {
        output.info(&format!(
            "User config file does not exist, created a default on: {}",
            path.display()
        ));
    }
    Ok(path)
}

/// Rewrite the file at `path` with the default configuration
pub fn reset(path: &Path, output: &Output) -> Result<(), RunError> {
    config::write_default(path).map_err(|err| {
        RunError::ConfigUnavailable(format!(
            "cannot reset config file at {}: {err:#}",
            path.display()
        ))
    })?;
    output.success(&format!("Config file at {} has been reset.", path.display()));
    Ok(())
}

/// Load, validate and snapshot the configuration at `path`
pub fn load(path: &Path, skip_validation: bool) -> Result<ConfigSnapshot, RunError> {
    let config = Config::load(path).map_err(|err| RunError::InvalidConfig(format!("{err:#}")))?;

    if skip_validation {
        debug!("configuration validation skipped");
    } else {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(RunError::InvalidConfig(format!(
                "config file at {} is invalid\n{errors}",
                path.display()
            )));
        }
    }

    Ok(ConfigSnapshot::new(config))
}
