//! Grouping input files into compression jobs
//!
//! Files are sniffed, checked against the accepted extensions of their
//! content type and grouped by type. Each group becomes a
//! [`CompressionJob`] with the tools that may run against it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::cli::Output;
use crate::compress::ScheduledTool;
use crate::config::ConfigSnapshot;
use crate::detect::{self, ContentSniffer};

/// What to do with a file whose extension does not match its content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenameMode {
    #[default]
    Prompt,
    Accept,
    Decline,
}

impl RenameMode {
    pub fn from_flags(force_rename: bool, no_rename: bool) -> Self {
        if force_rename {
            Self::Accept
        } else if no_rename {
            Self::Decline
        } else {
            Self::Prompt
        }
    }
}

/// Which tools a job considers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSelection {
    /// The preset's default tools for the content type
    PresetDefaults,
    Named(Vec<String>),
    All,
}

/// Files sharing one content type and the tools to run on them
#[derive(Debug, Clone)]
pub struct CompressionJob {
    pub mime: String,
    /// Preferred extension of the content type
    pub extension: String,
    pub paths: Vec<PathBuf>,
    /// Run once over every file
    pub batch_tools: Vec<ScheduledTool>,
    /// Run once per file
    pub per_file_tools: Vec<ScheduledTool>,
}

impl CompressionJob {
    pub fn has_tools(&self) -> bool {
        !self.batch_tools.is_empty() || !self.per_file_tools.is_empty()
    }

    /// Move every batch tool into the per-file rounds
    pub fn force_per_file(&mut self) {
        self.per_file_tools.append(&mut self.batch_tools);
        self.per_file_tools.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// Sniff and group `paths` by content type, sorted by type
///
/// Unreadable, unsupported and mislabeled (and not renamed) files are skipped
/// with a warning.
pub fn group_by_type(
    paths: &[PathBuf],
    snapshot: &ConfigSnapshot,
    sniffer: &dyn ContentSniffer,
    rename: RenameMode,
    output: &Output,
) -> BTreeMap<String, Vec<PathBuf>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

    for path in paths {
        let mime = match sniffer.detect(path) {
            Ok(Some(mime)) => mime,
            Ok(None) => {
                output.warning(&format!(
                    "Cannot detect the file format of {}. Skipping...",
                    path.display()
                ));
                continue;
            }
            Err(err) => {
                warn!(path = %path.display(), "content detection failed: {err}");
                output.warning(&format!(
                    "Cannot detect the file format of {}: {err}. Skipping...",
                    path.display()
                ));
                continue;
            }
        };
        trace!(path = %path.display(), mime, "detected content type");

        if !snapshot.is_supported(mime) {
            output.warning(&format!(
                "File format of {} ({mime}) is unsupported. Skipping...",
                path.display()
            ));
            continue;
        }

        let extensions = snapshot.extensions(mime);
        let used = if has_accepted_extension(path, extensions) {
            path.clone()
        } else {
            let Some(preferred) = extensions.first() else {
                continue;
            };
            match try_rename(path, preferred, mime, rename, output) {
                Some(renamed) => renamed,
                None => continue,
            }
        };

        groups.entry(mime.to_string()).or_default().push(used);
    }

    groups
}

fn has_accepted_extension(path: &Path, extensions: &[String]) -> bool {
    let extension = crate::utils::dotted_extension(path);
    extensions
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(&extension))
}

/// `path` with its extension replaced by `extension` (leading dot included)
pub fn corrected_path(path: &Path, extension: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{extension}"))
}

fn try_rename(
    path: &Path,
    extension: &str,
    mime: &str,
    mode: RenameMode,
    output: &Output,
) -> Option<PathBuf> {
    let current = crate::utils::dotted_extension(path);
    if mode == RenameMode::Decline {
        output.warning(&format!(
            "File {} is actually a {mime} despite the extension being {current:?}. Skipping...",
            path.display()
        ));
        return None;
    }

    let corrected = corrected_path(path, extension);
    output.warning(&format!(
        "File {} is actually a {mime} despite the extension being {current:?}. Trying to rename.",
        path.display()
    ));

    let accepted = match mode {
        RenameMode::Accept => true,
        RenameMode::Prompt => confirm_rename(path, &corrected),
        RenameMode::Decline => false,
    };
    if !accepted {
        output.info(&format!("Skipping {}.", path.display()));
        return None;
    }

    if corrected.exists() {
        output.warning(&format!(
            "Cannot rename {}: {} already exists. File is skipped...",
            path.display(),
            corrected.display()
        ));
        return None;
    }

    match std::fs::rename(path, &corrected) {
        Ok(()) => {
            output.success(&format!("Renamed to {}.", corrected.display()));
            Some(corrected)
        }
        Err(err) => {
            output.warning(&format!(
                "Cannot rename file {}: {err}. File is skipped...",
                path.display()
            ));
            None
        }
    }
}

fn confirm_rename(path: &Path, corrected: &Path) -> bool {
    let name = corrected
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    dialoguer::Confirm::new()
        .with_prompt(format!("Would you like to rename {} to {name}?", path.display()))
        .default(false)
        .interact()
        .unwrap_or_else(|err| {
            debug!("rename prompt unavailable: {err}");
            false
        })
}

/// Build a job per content-type group with its eligible tools
///
/// A tool is kept only when it is defined, available, supports the type and
/// has an argument list for `preset` that resolves cleanly.
pub fn build_jobs(
    groups: BTreeMap<String, Vec<PathBuf>>,
    snapshot: &ConfigSnapshot,
    preset: &str,
    selection: &ToolSelection,
    per_file: bool,
    output: &Output,
) -> Vec<CompressionJob> {
    groups
        .into_iter()
        .map(|(mime, paths)| {
            let names = tool_names(snapshot, preset, &mime, selection);
            let (batch_tools, per_file_tools) = schedule_tools(snapshot, preset, &mime, &names, output);
            let extension = snapshot
                .extensions(&mime)
                .first()
                .cloned()
                .or_else(|| detect::canonical_extension(&mime).map(str::to_string))
                .unwrap_or_default();

            let mut job = CompressionJob {
                mime,
                extension,
                paths,
                batch_tools,
                per_file_tools,
            };
            if per_file {
                job.force_per_file();
            }
            job
        })
        .collect()
}

fn tool_names(
    snapshot: &ConfigSnapshot,
    preset: &str,
    mime: &str,
    selection: &ToolSelection,
) -> Vec<String> {
    match selection {
        ToolSelection::PresetDefaults => snapshot
            .config()
            .presets
            .get(preset)
            .and_then(|preset| preset.default_tools.get(mime))
            .cloned()
            .unwrap_or_default(),
        ToolSelection::Named(names) => names.clone(),
        ToolSelection::All => snapshot.config().tools.keys().cloned().collect(),
    }
}

fn schedule_tools(
    snapshot: &ConfigSnapshot,
    preset: &str,
    mime: &str,
    names: &[String],
    output: &Output,
) -> (Vec<ScheduledTool>, Vec<ScheduledTool>) {
    let mut scheduled: BTreeMap<&str, ScheduledTool> = BTreeMap::new();

    for name in names {
        let Some(tool) = snapshot.config().tools.get(name) else {
            output.warning(&format!("Attempting to run unknown tool {name}. Skipping..."));
            continue;
        };
        let Some(launcher) = snapshot.launcher(name) else {
            trace!(tool = %name, "skipped: not available");
            continue;
        };
        if !tool.supports(mime) {
            trace!(tool = %name, mime, "skipped: format not supported");
            continue;
        }
        if !tool.has_arguments_for(preset) {
            trace!(tool = %name, preset, "skipped: no arguments for preset");
            continue;
        }
        let arguments = match tool.resolve_arguments(name, preset) {
            Ok(arguments) => arguments,
            Err(errors) => {
                for err in errors {
                    warn!(tool = %name, "{err}");
                }
                output.warning(&format!(
                    "Arguments of {name} for preset {preset} cannot be resolved. Skipping..."
                ));
                continue;
            }
        };

        scheduled.insert(
            name,
            ScheduledTool {
                name: name.clone(),
                output_mode: tool.output_mode,
                arguments,
                launcher: launcher.clone(),
            },
        );
    }

    scheduled
        .into_values()
        .partition(|tool| tool.output_mode.can_batch())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, OutputMode};
    use crate::probe::Prober;
    use std::io;

    /// Maps paths to fixed content types by extension-free name
    struct FixedSniffer;

    impl ContentSniffer for FixedSniffer {
        fn detect(&self, path: &Path) -> io::Result<Option<&'static str>> {
            let name = path.file_stem().unwrap_or_default().to_string_lossy();
            Ok(match name.as_ref() {
                n if n.starts_with("png") => Some("image/png"),
                n if n.starts_with("jpeg") => Some("image/jpeg"),
                n if n.starts_with("webp") => Some("image/webp"),
                n if n.starts_with("missing") => {
                    return Err(io::Error::from(io::ErrorKind::NotFound));
                }
                _ => None,
            })
        }
    }

    const CONFIG: &str = r#"
default-preset: default
mime-extensions:
  image/png: [".png"]
  image/jpeg: [".jpg", ".jpeg"]
presets:
  default:
    default-tools:
      image/png: [crush, squeeze]
      image/jpeg: [squeeze]
  other:
    default-tools: {}
tools:
  crush:
    command: crush
    platform: [linux, darwin, windows]
    supported-formats: [image/png]
    output-mode: batch-overwrite
    arguments:
      default: ["@fast", "-o"]
      fast: ["-1"]
  squeeze:
    command: squeeze
    platform: [linux, darwin, windows]
    supported-formats: [image/png, image/jpeg]
    output-mode: stdout
    arguments:
      default: ["--best"]
  broken:
    command: broken
    platform: [linux, darwin, windows]
    supported-formats: [image/png]
    output-mode: input-output
    arguments:
      default: ["@nowhere"]
  absent:
    command: absent
    platform: [linux, darwin, windows]
    supported-formats: [image/png]
    output-mode: stdout
    arguments:
      default: []
"#;

    /// A snapshot where every tool but `absent` is on the search path
    fn snapshot(bin: &Path) -> ConfigSnapshot {
        for name in ["crush", "squeeze", "broken"] {
            let path = bin.join(name);
            std::fs::write(&path, "#!/bin/sh\n").unwrap();
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            }
        }
        let config = Config::from_yaml_str(CONFIG).unwrap();
        let prober = Prober::new("linux", Some(bin.as_os_str().to_owned()), bin);
        ConfigSnapshot::with_prober(config, &prober)
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_rename_mode_from_flags() {
        assert_eq!(RenameMode::from_flags(true, false), RenameMode::Accept);
        assert_eq!(RenameMode::from_flags(false, true), RenameMode::Decline);
        assert_eq!(RenameMode::from_flags(false, false), RenameMode::Prompt);
    }

    #[test]
    fn test_corrected_path() {
        assert_eq!(
            corrected_path(Path::new("dir/photo.jpg"), ".png"),
            PathBuf::from("dir/photo.png")
        );
        assert_eq!(
            corrected_path(Path::new("noext"), ".png"),
            PathBuf::from("noext.png")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_groups_are_sorted_and_filtered() {
        let bin = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let snapshot = snapshot(bin.path());
        let paths = vec![
            touch(dir.path(), "png-a.png"),
            touch(dir.path(), "jpeg-a.JPG"),
            touch(dir.path(), "webp-a.webp"),
            touch(dir.path(), "text.txt"),
            dir.path().join("missing.png"),
            touch(dir.path(), "png-b.png"),
        ];

        let groups = group_by_type(
            &paths,
            &snapshot,
            &FixedSniffer,
            RenameMode::Decline,
            &Output::silent(),
        );

        let mimes: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(mimes, vec!["image/jpeg", "image/png"]);
        assert_eq!(groups["image/png"].len(), 2);
        assert_eq!(groups["image/jpeg"], vec![paths[1].clone()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_mislabeled_files_follow_rename_mode() {
        let bin = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let snapshot = snapshot(bin.path());
        let output = Output::silent();

        let declined = touch(dir.path(), "png-declined.jpg");
        let groups = group_by_type(&[declined.clone()], &snapshot, &FixedSniffer, RenameMode::Decline, &output);
        assert!(groups.is_empty());
        assert!(declined.exists());

        let accepted = touch(dir.path(), "png-accepted.jpg");
        let groups = group_by_type(&[accepted.clone()], &snapshot, &FixedSniffer, RenameMode::Accept, &output);
        let renamed = dir.path().join("png-accepted.png");
        assert_eq!(groups["image/png"], vec![renamed.clone()]);
        assert!(renamed.exists());
        assert!(!accepted.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_rename_never_clobbers() {
        let bin = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let snapshot = snapshot(bin.path());
        let mislabeled = touch(dir.path(), "png-taken.jpg");
        touch(dir.path(), "png-taken.png");

        let groups = group_by_type(&[mislabeled.clone()], &snapshot, &FixedSniffer, RenameMode::Accept, &Output::silent());
        assert!(groups.is_empty());
        assert!(mislabeled.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_jobs_schedule_eligible_tools_only() {
        let bin = tempfile::tempdir().unwrap();
        let snapshot = snapshot(bin.path());
        let mut groups = BTreeMap::new();
        groups.insert("image/png".to_string(), vec![PathBuf::from("a.png")]);
        groups.insert("image/jpeg".to_string(), vec![PathBuf::from("b.jpg")]);

        let selection = ToolSelection::Named(vec![
            "crush".to_string(),
            "squeeze".to_string(),
            "broken".to_string(),
            "absent".to_string(),
            "unknown".to_string(),
        ]);
        let jobs = build_jobs(groups, &snapshot, "default", &selection, false, &Output::silent());

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].mime, "image/jpeg");
        assert_eq!(jobs[0].extension, ".jpg");
        assert!(jobs[0].batch_tools.is_empty());
        assert_eq!(jobs[0].per_file_tools.len(), 1);

        let png = &jobs[1];
        assert_eq!(png.batch_tools.len(), 1);
        assert_eq!(png.batch_tools[0].name, "crush");
        assert_eq!(png.batch_tools[0].arguments, vec!["-1", "-o"]);
        let per_file: Vec<_> = png.per_file_tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(per_file, vec!["squeeze"]);
        assert_eq!(png.per_file_tools[0].output_mode, OutputMode::Stdout);
    }

    #[cfg(unix)]
    #[test]
    fn test_preset_defaults_and_per_file() {
        let bin = tempfile::tempdir().unwrap();
        let snapshot = snapshot(bin.path());
        let mut groups = BTreeMap::new();
        groups.insert("image/png".to_string(), vec![PathBuf::from("a.png")]);

        let jobs = build_jobs(
            groups.clone(),
            &snapshot,
            "default",
            &ToolSelection::PresetDefaults,
            true,
            &Output::silent(),
        );
        assert!(jobs[0].batch_tools.is_empty());
        let names: Vec<_> = jobs[0].per_file_tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["crush", "squeeze"]);

        let jobs = build_jobs(groups, &snapshot, "other", &ToolSelection::All, false, &Output::silent());
        assert!(!jobs[0].has_tools());
    }
}
