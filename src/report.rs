//! Tab-separated result report
//!
//! One `result<ext>.tsv` per job, written next to the job's first input. Each
//! file gets an `original` row followed by one row per tool in name order.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::compress::{CompressionProcess, CompressionResult, DecodeBench};
use crate::error::ExecutionError;
use crate::utils::{percentage, to_megabytes};

const HEADER: [&str; 7] = [
    "File",
    "Tool",
    "Command",
    "Time (s)",
    "Final Size (MB)",
    "Reduction (MB)",
    "Reduction (%)",
];

/// Where the report of a job with `first_input` and `extension` goes
pub fn report_path(first_input: &Path, extension: &str) -> PathBuf {
    let directory = first_input.parent().unwrap_or_else(|| Path::new(""));
    directory.join(format!("result{extension}.tsv"))
}

/// Write the report of `process` and return its path
pub fn write_report(process: &CompressionProcess, extension: &str) -> Result<PathBuf> {
    let first = process
        .files()
        .first()
        .context("cannot write a report without input files")?;
    let path = report_path(&first.path, extension);

    let file = File::create(&path)
        .with_context(|| format!("cannot create report {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_rows(&mut writer, process)
        .and_then(|()| writer.flush())
        .with_context(|| format!("cannot write report {}", path.display()))?;

    Ok(path)
}

/// Serialize every row of `process` into `writer`
pub fn write_rows<W: Write>(writer: &mut W, process: &CompressionProcess) -> std::io::Result<()> {
    let decode_window = process.decode_window();

    let mut header: Vec<String> = HEADER.iter().map(|s| s.to_string()).collect();
    if let Some(window) = decode_window {
        header.push(format!("Decode Time (ms avg within {window:?})"));
        header.push("Decode Trials".to_string());
    }
    write_row(writer, &header)?;

    let tools: Vec<&str> = process.results().tools().collect();
    for (index, file) in process.files().iter().enumerate() {
        let mut row = vec![
            file.file_name.clone(),
            "original".to_string(),
            "-".to_string(),
            "-".to_string(),
            format!("{:.6}", to_megabytes(file.size)),
            format!("{:.6}", 0.0),
            format!("{:.6}%", 100.0),
        ];
        if decode_window.is_some() {
            push_decode(&mut row, file.decode.as_ref());
        }
        write_row(writer, &row)?;

        for tool in &tools {
            let Some(result) = process.results().get(tool, index) else {
                continue;
            };
            let mut row = result_row(&file.file_name, result);
            if decode_window.is_some() {
                let bench = match &result.error {
                    Some(ExecutionError::ReadSize { .. }) | None => result.decode.as_ref(),
                    Some(_) => None,
                };
                push_decode(&mut row, bench);
            }
            write_row(writer, &row)?;
        }
    }

    Ok(())
}

fn result_row(file_name: &str, result: &CompressionResult) -> Vec<String> {
    let mut row = vec![
        file_name.to_string(),
        result.tool.clone(),
        result.command_line.join(" "),
    ];

    match &result.error {
        Some(ExecutionError::ReadSize { .. }) => {
            row.push(format!("{:.6}", result.elapsed.as_secs_f64()));
            row.extend(["CANNOT READ FILE SIZE", "-", "-"].map(String::from));
        }
        Some(ExecutionError::CreateTemp { .. }) => {
            row.push("CANNOT CREATE OUTPUT".to_string());
            row.extend(["-", "-", "-"].map(String::from));
        }
        Some(_) => {
            row.push("COMMAND FAILED".to_string());
            row.extend(["-", "-", "-"].map(String::from));
        }
        None => {
            let reduction = to_megabytes(result.original_size) - to_megabytes(result.final_size);
            row.push(format!("{:.6}", result.elapsed.as_secs_f64()));
            row.push(format!("{:.6}", to_megabytes(result.final_size)));
            row.push(format!("{reduction:.6}"));
            row.push(format!(
                "{:.6}%",
                percentage(result.final_size, result.original_size)
            ));
        }
    }
    row
}

fn push_decode(row: &mut Vec<String>, bench: Option<&DecodeBench>) {
    match bench {
        Some(bench) => {
            row.push(bench.ms_average());
            row.push(bench.trials.to_string());
        }
        None => row.extend(["-", "-"].map(String::from)),
    }
}

fn write_row<W: Write>(writer: &mut W, fields: &[String]) -> std::io::Result<()> {
    let line = fields
        .iter()
        .map(|field| sanitize(field))
        .collect::<Vec<_>>()
        .join("\t");
    writeln!(writer, "{line}")
}

/// Fields never contain the separators
fn sanitize(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Output;
    use crate::compress::ProcessOptions;
    use crate::parallel::CancelHandle;

    #[test]
    fn test_report_path() {
        assert_eq!(
            report_path(Path::new("pics/a.png"), ".png"),
            PathBuf::from("pics/result.png.tsv")
        );
        assert_eq!(report_path(Path::new("a.png"), ".png"), PathBuf::from("result.png.tsv"));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a\tb\nc"), "a b c");
    }

    #[test]
    fn test_failed_rows_have_placeholders() {
        let result = CompressionResult {
            tool: "crush".to_string(),
            command_line: vec!["crush".to_string(), "-9".to_string()],
            elapsed: std::time::Duration::from_millis(1500),
            original_size: 2_000_000,
            final_size: 2_000_000,
            artifact: PathBuf::from("x"),
            error: Some(ExecutionError::ToolNotFound),
            decode: None,
        };
        let row = result_row("a.png", &result);
        assert_eq!(row, vec!["a.png", "crush", "crush -9", "COMMAND FAILED", "-", "-", "-"]);

        let ok = CompressionResult {
            error: None,
            final_size: 500_000,
            ..result
        };
        let row = result_row("a.png", &ok);
        assert_eq!(row[3], "1.500000");
        assert_eq!(row[4], "0.500000");
        assert_eq!(row[5], "1.500000");
        assert_eq!(row[6], "25.000000%");
    }

    #[test]
    fn test_original_row_precedes_tool_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.png");
        std::fs::write(&input, b"0123456789").unwrap();

        let (process, _) = CompressionProcess::new(
            &[input],
            ProcessOptions::default(),
            CancelHandle::new(),
            Output::silent(),
        )
        .unwrap();

        let mut buffer = Vec::new();
        write_rows(&mut buffer, &process).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("File\tTool\tCommand"));
        assert!(lines[1].starts_with("a.png\toriginal\t-\t-\t0.000010"));

        let path = write_report(&process, ".png").unwrap();
        assert_eq!(path, dir.path().join("result.png.tsv"));
        assert!(path.exists());
    }
}
