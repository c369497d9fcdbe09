//! Configuration validation
//!
//! Every problem is collected; nothing short-circuits. Reference errors from
//! expanding each tool's preset argument lists are reported alongside the
//! structural checks.

use std::collections::{BTreeMap, BTreeSet};

use super::Config;
use crate::detect;
use crate::error::{ConfigError, ConfigErrors};
use crate::resolve;

/// Platform names accepted in `platform` and `wrappers`
pub const KNOWN_PLATFORMS: &[&str] = &[
    "darwin",
    "dragonfly",
    "freebsd",
    "illumos",
    "linux",
    "netbsd",
    "openbsd",
    "plan9",
    "solaris",
    "windows",
];

fn is_known_platform(platform: &str) -> bool {
    KNOWN_PLATFORMS.contains(&platform)
}

impl Config {
    /// Check the document for structural and reference errors
    pub fn validate(&self) -> ConfigErrors {
        let mut errors = Vec::new();
        let mut invalid = |message: String| errors.push(ConfigError::Invalid(message));

        self.validate_default_preset(&mut invalid);
        self.validate_mime_extensions(&mut invalid);
        self.validate_wrappers(&mut invalid);
        self.validate_presets(&mut invalid);
        self.validate_tools(&mut invalid);

        errors.extend(self.reference_errors());
        ConfigErrors(errors)
    }

    fn validate_default_preset(&self, invalid: &mut impl FnMut(String)) {
        if self.default_preset.is_empty() {
            invalid("default-preset is not defined".to_string());
        } else if self.query_preset(&self.default_preset).is_none() {
            invalid(format!(
                "default-preset is an undefined preset: {}",
                self.default_preset
            ));
        }
    }

    fn validate_mime_extensions(&self, invalid: &mut impl FnMut(String)) {
        for (format, extensions) in &self.mime_extensions {
            if !detect::is_known(format) {
                invalid(format!("mime-extensions: {format:?} is an unknown file format"));
            }
            if extensions.is_empty() {
                invalid(format!("mime-extensions: {format:?} has no defined file extensions"));
            }
        }
    }

    fn validate_wrappers(&self, invalid: &mut impl FnMut(String)) {
        for (host, wrappers) in &self.wrappers {
            if !is_known_platform(host) {
                invalid(format!("wrapper: unknown platform defined: {host}"));
            }

            for (platform, wrapper) in wrappers {
                if wrapper.is_empty() {
                    invalid(format!(
                        "wrapper: blank command defined in {platform:?}, then {host:?}"
                    ));
                }
                if !is_known_platform(platform) {
                    invalid(format!(
                        "wrapper: unknown platform defined in {host:?}: {platform}"
                    ));
                }
            }
        }
    }

    fn validate_presets(&self, invalid: &mut impl FnMut(String)) {
        let mut owners: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (preset_name, preset) in &self.presets {
            let names = preset
                .shorthands
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(preset_name.as_str()));

            for name in names {
                if name.is_empty() {
                    invalid(format!(
                        "preset: shorthand on {preset_name:?} cannot be a blank name"
                    ));
                }
                owners.entry(name).or_default().push(preset_name.as_str());
            }

            for (format, tool_names) in &preset.default_tools {
                let format_known = detect::is_known(format);
                if !format_known {
                    invalid(format!(
                        "preset: {preset_name:?} has unknown file format defined on default-tools: {format}"
                    ));
                }

                for tool_name in tool_names {
                    let Some(tool) = self.tools.get(tool_name) else {
                        invalid(format!(
                            "preset: {preset_name:?} included an undefined tool on default-tools at {format:?}: {tool_name}"
                        ));
                        continue;
                    };

                    if !tool.has_arguments_for(preset_name) {
                        invalid(format!(
                            "preset: {preset_name:?} included tool {tool_name:?} on default-tools with undefined arguments for this preset"
                        ));
                    }

                    if format_known && !tool.supports(format) {
                        invalid(format!(
                            "preset: {preset_name:?} included tool {tool_name:?} on default-tools for {format}, which does not support this file format"
                        ));
                    }
                }
            }
        }

        for (name, presets) in owners {
            if presets.len() > 1 {
                invalid(format!(
                    "preset: conflicting shorthand {name:?} on multiple presets: {}",
                    presets.join(", ")
                ));
            }
        }
    }

    fn validate_tools(&self, invalid: &mut impl FnMut(String)) {
        for (name, tool) in &self.tools {
            if tool.command.is_empty() {
                invalid(format!("tool: {name:?} has no command defined"));
            }

            if tool.platform.is_empty() {
                invalid(format!("tool: {name:?} has no platforms defined"));
            }
            for platform in tool.platform.iter().filter(|p| !is_known_platform(p)) {
                invalid(format!("tool: {name:?} has unknown platform defined: {platform}"));
            }

            if tool.supported_formats.is_empty() {
                invalid(format!("tool: {name:?} has no supported-formats defined"));
            }
            for format in tool.supported_formats.iter().filter(|f| !detect::is_known(f)) {
                invalid(format!("tool: {name:?} has unknown file format defined: {format}"));
            }

            if tool.arguments.is_empty() {
                invalid(format!("tool: {name:?} has no arguments defined"));
                continue;
            }

            // Helper lists are fine as long as some other list of the tool uses them
            let referenced: BTreeSet<&str> = tool
                .arguments
                .iter()
                .flat_map(|(list_name, tokens)| {
                    resolve::references(tokens).filter(move |target| *target != list_name.as_str())
                })
                .collect();

            for list_name in tool.arguments.keys() {
                if !self.presets.contains_key(list_name) && !referenced.contains(list_name.as_str())
                {
                    invalid(format!(
                        "tool: {name:?} has unknown preset defined in arguments: {list_name}"
                    ));
                }
            }
        }
    }

    fn reference_errors(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for (name, tool) in &self.tools {
            for list_name in tool.arguments.keys() {
                if !self.presets.contains_key(list_name) {
                    continue;
                }

                if let Err(found) = tool.resolve_arguments(name, list_name) {
                    for err in found {
                        let err = ConfigError::Reference(err);
                        if !errors.contains(&err) {
                            errors.push(err);
                        }
                    }
                }
            }
        }

        errors
    }
}
