//! Per-file result summaries

use console::style;

use super::Output;
use crate::compress::{
    CompressionProcess, CompressionResult, DecodeBench, FileInfo, Placement, Selection, Winners,
    WritePolicy,
};
use crate::error::ExecutionError;
use crate::utils::percentage;

/// Print each file's summary and apply `policy`
///
/// Returns false when an artifact could not be placed.
pub fn save_results(
    process: &CompressionProcess,
    selection: Selection,
    policy: WritePolicy,
    output: &Output,
) -> bool {
    let mut all_placed = true;
    output.section_header("SUMMARY:");

    for (index, file) in process.files().iter().enumerate() {
        let winners = process.winners(index);
        print_file(process, index, file, &winners, output);

        let chosen = winners.select(selection);
        let placements = process.flush(index, chosen, policy);
        all_placed &= print_placements(file, chosen, policy, &placements, output);
        output.blank_line();
    }

    all_placed
}

fn print_file(
    process: &CompressionProcess,
    index: usize,
    file: &FileInfo,
    winners: &Winners,
    output: &Output,
) {
    let decoded = process.decode_window();
    let mut heading = format!("{} | {}", file.path.display(), style("Size (B)").cyan());
    if let Some(window) = decoded {
        heading.push_str(&format!(
            " - {}",
            style(format!("Decode Time (ms avg within {window:?})")).cyan()
        ));
    }
    output.plain(&heading);

    let mut original = format!("| original: {}", style(format!("{} (100.000000%)", file.size)).cyan());
    if decoded.is_some() {
        original.push_str(" - ");
        original.push_str(&decode_cell(file.decode.as_ref(), None, false));
    }
    output.plain(&original);

    for (tool, result) in process.results().for_file(index) {
        let mut line = format!("| {tool}: ");
        // A size error still shows decode figures
        let fatal = result
            .error
            .as_ref()
            .filter(|err| !matches!(err, ExecutionError::ReadSize { .. }));
        if let Some(err) = fatal {
            line.push_str(&style(err.label()).yellow().to_string());
            output.plain(&line);
            continue;
        }

        let best = !result.has_error() && winners.by_size.as_deref() == Some(tool);
        line.push_str(&size_cell(result, best));
        if decoded.is_some() {
            line.push_str(" - ");
            let best = winners.by_decode_time.as_deref() == Some(tool);
            line.push_str(&decode_cell(result.decode.as_ref(), file.decode.as_ref(), best));
        }
        output.plain(&line);
    }
}

fn size_cell(result: &CompressionResult, best: bool) -> String {
    if let Some(err) = &result.error {
        return style(err.label()).yellow().to_string();
    }

    let text = format!(
        "{} ({:.6}%)",
        result.final_size,
        percentage(result.final_size, result.original_size)
    );
    if best {
        style(text).green().to_string()
    } else if result.final_size > result.original_size {
        style(text).yellow().to_string()
    } else {
        style(text).cyan().to_string()
    }
}

fn decode_cell(bench: Option<&DecodeBench>, original: Option<&DecodeBench>, best: bool) -> String {
    let Some(bench) = bench else {
        return "-".to_string();
    };
    if bench.error.is_some() {
        return style("DECODE TIME ERROR").yellow().to_string();
    }

    let text = bench.ms_average_with_trials();
    let slower = original.is_some_and(|original| bench.average > original.average);
    if best {
        style(text).green().to_string()
    } else if slower {
        style(text).yellow().to_string()
    } else {
        style(text).cyan().to_string()
    }
}

fn print_placements(
    file: &FileInfo,
    chosen: Option<&str>,
    policy: WritePolicy,
    placements: &[Placement],
    output: &Output,
) -> bool {
    if policy == WritePolicy::Dry {
        return true;
    }
    if chosen.is_none() && policy != WritePolicy::KeepAll {
        output.plain("File cannot be compressed further. The original file is left as is.");
        return true;
    }

    let mut all_placed = true;
    for placement in placements {
        let destination = placement.destination.display().to_string();
        match &placement.error {
            Some(err) => {
                output.warning(&format!("Cannot move result of {} to {destination}: {err}", placement.tool));
                all_placed = false;
            }
            None if policy == WritePolicy::Overwrite => output.success(&format!(
                "{} wins! Successfully overwritten {}.",
                placement.tool,
                style(file.path.display()).cyan()
            )),
            None if chosen == Some(placement.tool.as_str()) => output.success(&format!(
                "{} wins! Successfully moved result to {}.",
                placement.tool,
                style(destination).cyan()
            )),
            None => output.success(&format!(
                "Successfully moved result of {} to {}.",
                placement.tool,
                style(destination).cyan()
            )),
        }
    }
    all_placed
}
