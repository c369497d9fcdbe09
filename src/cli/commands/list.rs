//! `--list`: tools and presets of the loaded configuration

use console::style;
use std::fmt::Write as _;
use std::path::Path;

use crate::cli::Output;
use crate::config::ConfigSnapshot;

const INSTALL_HINT: &str = "Note that compacty runs other compression tools. As such, these need to be either installed\n\
in your PATH or the tool's executable must be placed in the same directory as compacty.\n\
Scroll the list above to see your available presets and compression tools.";

/// Execute the list command
pub fn execute(snapshot: &ConfigSnapshot, config_path: &Path, output: &Output) {
    output.plain(&render(snapshot, config_path));
}

/// The list followed by the installation hint, for runs without usable tools
pub fn print_with_install_hint(snapshot: &ConfigSnapshot, config_path: &Path, output: &Output) {
    execute(snapshot, config_path, output);
    output.plain(INSTALL_HINT);
}

pub fn render(snapshot: &ConfigSnapshot, config_path: &Path) -> String {
    let mut text = format!("Config loaded from {}\n\n", config_path.display());
    text.push_str(&render_tools(snapshot));
    text.push_str(&render_presets(snapshot));
    text
}

pub fn render_tools(snapshot: &ConfigSnapshot) -> String {
    let mut text = format!("{}\n", style("Tools:").blue());

    for (name, tool) in &snapshot.config().tools {
        text.push_str(name);
        if let Some(wrapper) = snapshot.wrapper_for(name) {
            let _ = write!(text, " (wrapped, requires {wrapper})");
        }
        if snapshot.is_tool_available(name) {
            let _ = write!(text, " {}", style("(available)").cyan());
        }
        text.push('\n');

        let _ = writeln!(text, "| Description:\n|   {}", tool.description);
        let _ = writeln!(
            text,
            "| Supported file formats:\n|   {}\n",
            tool.supported_formats.join(", ")
        );
    }

    text
}

pub fn render_presets(snapshot: &ConfigSnapshot) -> String {
    let config = snapshot.config();
    let mut text = format!("{}\n", style("Presets:").blue());

    for (name, preset) in &config.presets {
        text.push_str(name);
        if !preset.shorthands.is_empty() {
            let _ = write!(text, " {} {}", style("=").cyan(), preset.shorthands.join(", "));
        }
        if config.default_preset == *name {
            let _ = write!(text, " {}", style("(default)").cyan());
        }
        text.push('\n');

        let _ = writeln!(text, "| Description:\n|   {}", preset.description);
        text.push_str("| Tools ran by default:\n");

        for (format, tools) in &preset.default_tools {
            if tools.is_empty() {
                continue;
            }
            let names: Vec<String> = tools
                .iter()
                .map(|tool| {
                    if snapshot.is_tool_available(tool) {
                        style(tool).cyan().to_string()
                    } else {
                        tool.clone()
                    }
                })
                .collect();
            let _ = writeln!(text, "|   {format}: {}", names.join(", "));
        }
        text.push('\n');
    }

    text
}
