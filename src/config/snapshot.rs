use std::collections::BTreeMap;

use super::Config;
use crate::detect;
use crate::probe::{Launcher, Prober};

/// Loaded configuration plus everything derived from it
///
/// Built once after loading and never mutated; supported formats, accepted
/// extensions and tool availability are not recomputed mid-run.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    config: Config,
    host: String,
    supported_formats: Vec<String>,
    extensions: BTreeMap<String, Vec<String>>,
    launchers: BTreeMap<String, Launcher>,
}

impl ConfigSnapshot {
    /// Probe against the running host
    pub fn new(config: Config) -> Self {
        Self::with_prober(config, &Prober::system())
    }

    pub fn with_prober(config: Config, prober: &Prober) -> Self {
        let supported_formats = supported_formats(&config);
        let extensions = supported_extensions(&config, &supported_formats);

        let host_wrappers = config.wrappers.get(prober.host());
        let launchers = config
            .tools
            .iter()
            .filter_map(|(name, tool)| {
                prober
                    .probe(name, tool, host_wrappers)
                    .map(|launcher| (name.clone(), launcher))
            })
            .collect();

        Self {
            config,
            host: prober.host().to_string(),
            supported_formats,
            extensions,
            launchers,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Content types that are both known and mentioned by the configuration
    pub fn supported_formats(&self) -> &[String] {
        &self.supported_formats
    }

    pub fn is_supported(&self, mime: &str) -> bool {
        self.supported_formats.iter().any(|format| format == mime)
    }

    /// Accepted extensions for `mime`; the first is the preferred one
    pub fn extensions(&self, mime: &str) -> &[String] {
        self.extensions.get(mime).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn launcher(&self, tool: &str) -> Option<&Launcher> {
        self.launchers.get(tool)
    }

    pub fn is_tool_available(&self, tool: &str) -> bool {
        self.launchers.contains_key(tool)
    }

    pub fn has_available_tools(&self) -> bool {
        !self.launchers.is_empty()
    }

    /// Wrapper name a foreign tool would need on this host
    pub fn wrapper_for(&self, tool: &str) -> Option<&str> {
        let tool = self.config.tools.get(tool)?;
        self.config.query_wrapper(tool, &self.host)
    }
}

fn supported_formats(config: &Config) -> Vec<String> {
    let mut formats: Vec<String> = config.mime_extensions.keys().cloned().collect();
    for tool in config.tools.values() {
        for format in &tool.supported_formats {
            if !formats.contains(format) {
                formats.push(format.clone());
            }
        }
    }
    formats.retain(|format| detect::is_known(format));
    formats
}

fn supported_extensions(config: &Config, formats: &[String]) -> BTreeMap<String, Vec<String>> {
    formats
        .iter()
        .map(|format| {
            let canonical = detect::canonical_extension(format).map(str::to_string);
            let mut extensions = config.mime_extensions.get(format).cloned().unwrap_or_default();
            if let Some(canonical) = canonical {
                if !extensions.contains(&canonical) {
                    extensions.push(canonical);
                }
            }
            (format.clone(), extensions)
        })
        .collect()
}
