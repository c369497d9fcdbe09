//! Configuration for compacty
//!
//! The configuration is a declarative document (YAML by default) describing
//! compression tools, presets and platform wrappers. It is loaded through
//! figment, validated, then frozen into a [`ConfigSnapshot`] that every
//! reader borrows for the rest of the run.

use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ReferenceError;
use crate::resolve;

pub mod smart_load;
mod snapshot;
mod validate;

pub use snapshot::ConfigSnapshot;
pub use validate::KNOWN_PLATFORMS;

/// Embedded default configuration document
pub const DEFAULT_CONFIG: &str = include_str!("../../default-config.yaml");

/// Environment variables with this prefix override top-level settings
pub const ENV_PREFIX: &str = "COMPACTY_";

/// How a tool consumes its input and produces its output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Overwrites every positional file in place; accepts many files at once
    BatchOverwrite,
    /// Reads the first positional path and writes the second
    InputOutput,
    /// Reads the positional path and writes the result to standard output
    Stdout,
}

impl OutputMode {
    pub fn can_batch(self) -> bool {
        self == OutputMode::BatchOverwrite
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputMode::BatchOverwrite => "batch-overwrite",
            OutputMode::InputOutput => "input-output",
            OutputMode::Stdout => "stdout",
        }
    }
}

/// A compression tool definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ToolConfig {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub platform: Vec<String>,
    #[serde(default)]
    pub supported_formats: Vec<String>,
    pub output_mode: OutputMode,
    /// Argument lists keyed by preset (or helper list) name
    #[serde(default)]
    pub arguments: BTreeMap<String, Vec<String>>,
}

impl ToolConfig {
    pub fn supports(&self, mime: &str) -> bool {
        self.supported_formats.iter().any(|format| format == mime)
    }

    pub fn runs_on(&self, platform: &str) -> bool {
        self.platform.iter().any(|p| p == platform)
    }

    pub fn has_arguments_for(&self, preset: &str) -> bool {
        self.arguments.contains_key(preset)
    }

    /// Flat arguments for `preset` with every reference expanded
    pub fn resolve_arguments(
        &self,
        tool_name: &str,
        preset: &str,
    ) -> std::result::Result<Vec<String>, Vec<ReferenceError>> {
        resolve::resolve_arguments(tool_name, &self.arguments, preset)
    }
}

/// A named compression intent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Preset {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub shorthands: Vec<String>,
    /// Content type -> tools run when `--tools` is not given
    #[serde(default)]
    pub default_tools: BTreeMap<String, Vec<String>>,
}

/// The whole configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub default_preset: String,
    #[serde(default)]
    pub mime_extensions: BTreeMap<String, Vec<String>>,
    /// Host platform -> tool platform -> wrapper executable
    #[serde(default)]
    pub wrappers: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub presets: BTreeMap<String, Preset>,
    #[serde(default)]
    pub tools: BTreeMap<String, ToolConfig>,
}

/// Result of looking up a preset by name or shorthand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetMatch<'a> {
    pub name: &'a str,
    pub via_shorthand: bool,
}

impl Config {
    /// Load a configuration file, applying environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("config file {} does not exist", path.display());
        }

        Figment::new()
            .merge(smart_load::auto(path))
            .merge(env_overrides())
            .extract()
            .with_context(|| format!("cannot read config file at {}", path.display()))
    }

    /// Parse a YAML document without environment overrides
    pub fn from_yaml_str(document: &str) -> Result<Self> {
        Figment::from(Yaml::string(document))
            .extract()
            .context("cannot parse configuration document")
    }

    /// The embedded default configuration
    pub fn embedded() -> Result<Self> {
        Self::from_yaml_str(DEFAULT_CONFIG)
    }

    /// Look up a preset by its name or one of its shorthands
    pub fn query_preset(&self, name: &str) -> Option<PresetMatch<'_>> {
        if let Some((preset_name, _)) = self.presets.get_key_value(name) {
            return Some(PresetMatch {
                name: preset_name,
                via_shorthand: false,
            });
        }

        self.presets
            .iter()
            .find(|(_, preset)| preset.shorthands.iter().any(|s| s == name))
            .map(|(preset_name, _)| PresetMatch {
                name: preset_name,
                via_shorthand: true,
            })
    }

    /// Wrapper required to run `tool` on `host`, if the tool is foreign to it
    pub fn query_wrapper(&self, tool: &ToolConfig, host: &str) -> Option<&str> {
        let wrappers = self.wrappers.get(host)?;
        query_wrapper(wrappers, &tool.platform, host)
    }
}

/// Pick the wrapper for a tool's first declared platform that has one
///
/// Returns `None` when the tool runs natively on `host`.
pub fn query_wrapper<'a>(
    wrappers: &'a BTreeMap<String, String>,
    tool_platforms: &[String],
    host: &str,
) -> Option<&'a str> {
    if tool_platforms.iter().any(|p| p == host) {
        return None;
    }

    tool_platforms
        .iter()
        .filter_map(|platform| wrappers.get(platform))
        .map(String::as_str)
        .find(|wrapper| !wrapper.is_empty())
}

fn env_overrides() -> Env {
    Env::prefixed(ENV_PREFIX)
        .only(&["default_preset"])
        .map(|key| key.as_str().replace('_', "-").into())
}

/// Path of the per-user configuration file, creating its directory
pub fn user_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("cannot determine the user's config directory")?;
    let directory = base.join("compacty");
    std::fs::create_dir_all(&directory)
        .with_context(|| format!("cannot create config directory {}", directory.display()))?;
    Ok(directory.join("config.yaml"))
}

/// Resolve the user configuration, writing the default document when missing
///
/// Returns the path and whether it was just created.
pub fn get_or_create_user_config() -> Result<(PathBuf, bool)> {
    let path = user_config_path()?;
    if path.exists() {
        return Ok((path, false));
    }

    write_default(&path)?;
    Ok((path, true))
}

/// Write the embedded default document to `path`
pub fn write_default(path: &Path) -> Result<()> {
    std::fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("cannot write default config to {}", path.display()))
}
