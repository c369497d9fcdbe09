use figment::providers::{Format, Json, Toml, Yaml};
use std::path::Path;
use tracing::debug;

/// Configuration provider that picks its format from the file extension,
/// sniffing the content when the extension says nothing. YAML is the fallback.
pub fn auto<P: AsRef<Path>>(path: P) -> impl figment::Provider {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "yaml" | "yml" => SmartProvider::Yaml(Yaml::file(path)),
        "json" => SmartProvider::Json(Json::file(path)),
        "toml" => SmartProvider::Toml(Toml::file(path)),
        _ => {
            let detected = std::fs::read_to_string(path)
                .ok()
                .and_then(|content| detect_format_from_content(&content));
            debug!(path = %path.display(), format = ?detected, "sniffed config format");

            match detected {
                Some(ConfigFormat::Json) => SmartProvider::Json(Json::file(path)),
                Some(ConfigFormat::Toml) => SmartProvider::Toml(Toml::file(path)),
                Some(ConfigFormat::Yaml) | None => SmartProvider::Yaml(Yaml::file(path)),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

enum SmartProvider {
    Yaml(figment::providers::Data<Yaml>),
    Json(figment::providers::Data<Json>),
    Toml(figment::providers::Data<Toml>),
}

impl figment::Provider for SmartProvider {
    fn metadata(&self) -> figment::Metadata {
        match self {
            SmartProvider::Yaml(p) => p.metadata(),
            SmartProvider::Json(p) => p.metadata(),
            SmartProvider::Toml(p) => p.metadata(),
        }
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        match self {
            SmartProvider::Yaml(p) => p.data(),
            SmartProvider::Json(p) => p.data(),
            SmartProvider::Toml(p) => p.data(),
        }
    }
}

fn detect_format_from_content(content: &str) -> Option<ConfigFormat> {
    let trimmed = content.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(ConfigFormat::Json);
    }

    let meaningful = || {
        trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
    };

    // TOML tables or `key = value` without any YAML mapping
    let has_toml_table = meaningful().any(|line| {
        line.starts_with('[') && line.ends_with(']') && !line.contains(':') && !line.contains(',')
    });
    let has_toml_assignment = meaningful().any(|line| line.contains(" = ") && !line.contains(": "));
    let has_yaml_mapping = meaningful().any(|line| line.contains(": ") || line.ends_with(':'));

    if (has_toml_table || has_toml_assignment) && !has_yaml_mapping {
        return Some(ConfigFormat::Toml);
    }

    if has_yaml_mapping || trimmed.starts_with("---") {
        return Some(ConfigFormat::Yaml);
    }

    None
}
