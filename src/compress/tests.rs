#![cfg(unix)]

use super::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::time::Instant;
use tempfile::TempDir;

fn script(dir: &Path, name: &str, body: &str) -> Launcher {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    Launcher::Native { program: path }
}

fn tool(name: &str, output_mode: OutputMode, launcher: Launcher) -> ScheduledTool {
    ScheduledTool {
        name: name.to_string(),
        output_mode,
        arguments: Vec::new(),
        launcher,
    }
}

/// Overwrites every non-flag argument with `content`
fn batch_tool(dir: &Path, name: &str, content: &str) -> ScheduledTool {
    let body = format!(
        "for f in \"$@\"; do case \"$f\" in --*) ;; *) printf '{content}' > \"$f\";; esac; done"
    );
    tool(name, OutputMode::BatchOverwrite, script(dir, name, &body))
}

fn failing_tool(dir: &Path, name: &str) -> ScheduledTool {
    tool(name, OutputMode::BatchOverwrite, script(dir, name, "exit 3"))
}

fn input(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn process(paths: &[PathBuf]) -> CompressionProcess {
    let (process, all_read) = CompressionProcess::new(
        paths,
        ProcessOptions::default(),
        CancelHandle::new(),
        Output::silent(),
    )
    .unwrap();
    assert!(all_read);
    process
}

#[test]
fn test_batch_round_runs_once_over_copies() {
    let dir = TempDir::new().unwrap();
    let a = input(dir.path(), "a.txt", "0123456789");
    let b = input(dir.path(), "b.txt", "0123456789");
    let tools = vec![batch_tool(dir.path(), "shrink", "ab")];

    let mut process = process(&[a.clone(), b.clone()]);
    process.compress_all(&tools).unwrap();

    for index in 0..2 {
        let result = process.results().get("shrink", index).unwrap();
        assert!(result.is_ok(), "{:?}", result.error);
        assert_eq!(result.original_size, 10);
        assert_eq!(result.final_size, 2);
        assert!(result.artifact.starts_with(process.workspace().path()));
    }
    // Originals are never touched by the tools
    assert_eq!(fs::read_to_string(&a).unwrap(), "0123456789");
    assert_eq!(fs::read_to_string(&b).unwrap(), "0123456789");
}

#[test]
fn test_arguments_precede_inputs() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let record = dir.path().join("args");
    let body = format!("echo \"$@\" > {}", record.display());
    let mut recorder = tool("recorder", OutputMode::BatchOverwrite, script(dir.path(), "recorder", &body));
    recorder.arguments = vec!["-9".to_string(), "--strip".to_string()];

    let mut process = process(&[file]);
    process.compress_all(&[recorder]).unwrap();

    let recorded = fs::read_to_string(&record).unwrap();
    let artifact = &process.results().get("recorder", 0).unwrap().artifact;
    assert_eq!(recorded.trim(), format!("-9 --strip {}", artifact.display()));
}

#[test]
fn test_non_zero_exit_is_recorded_and_original_kept() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let tools = vec![failing_tool(dir.path(), "broken")];

    let mut process = process(&[file.clone()]);
    process.compress_all(&tools).unwrap();

    let result = process.results().get("broken", 0).unwrap();
    assert!(matches!(
        result.error,
        Some(ExecutionError::ExitStatus { code: Some(3), .. })
    ));
    assert!(!process.is_error_free());

    let winners = process.winners(0);
    assert_eq!(winners.by_size, None);
    assert!(process.flush(0, None, WritePolicy::Overwrite).is_empty());
    assert_eq!(fs::read_to_string(&file).unwrap(), "0123456789");
}

#[test]
fn test_failure_does_not_affect_siblings() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let tools = vec![
        failing_tool(dir.path(), "broken"),
        batch_tool(dir.path(), "shrink", "abc"),
    ];

    let mut process = process(&[file]);
    process.compress_all(&tools).unwrap();

    assert!(process.results().get("broken", 0).unwrap().error.is_some());
    assert!(process.results().get("shrink", 0).unwrap().is_ok());
    assert_eq!(process.winners(0).by_size.as_deref(), Some("shrink"));
}

#[test]
fn test_concurrent_tools_fill_every_slot_once() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let tools: Vec<_> = (0..8)
        .map(|n| batch_tool(dir.path(), &format!("tool{n}"), &"x".repeat(n + 1)))
        .collect();

    let mut process = process(&[file]);
    process.compress_single(0, &tools).unwrap();

    let results: Vec<_> = process.results().for_file(0).collect();
    assert_eq!(results.len(), tools.len());
    for (n, (name, result)) in results.iter().enumerate() {
        assert_eq!(*name, format!("tool{n}"));
        assert_eq!(result.final_size, n as u64 + 1);
    }
    assert_eq!(process.winners(0).by_size.as_deref(), Some("tool0"));
}

#[test]
fn test_capped_workers_still_fill_every_slot() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let tools: Vec<_> = (0..5)
        .map(|n| batch_tool(dir.path(), &format!("tool{n}"), "x"))
        .collect();

    let options = ProcessOptions {
        parallel: ParallelConfig::with_max_workers(2),
        ..ProcessOptions::default()
    };
    let (mut process, _) =
        CompressionProcess::new(&[file], options, CancelHandle::new(), Output::silent()).unwrap();
    process.compress_single(0, &tools).unwrap();

    assert_eq!(process.results().for_file(0).count(), 5);
}

#[test]
fn test_stdout_mode_captures_output() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let tools = vec![tool(
        "printer",
        OutputMode::Stdout,
        script(dir.path(), "printer", "head -c 4 \"$1\""),
    )];

    let mut process = process(&[file]);
    process.compress_single(0, &tools).unwrap();

    let result = process.results().get("printer", 0).unwrap();
    assert!(result.is_ok(), "{:?}", result.error);
    assert_eq!(result.final_size, 4);
    assert_eq!(fs::read_to_string(&result.artifact).unwrap(), "0123");
}

#[test]
fn test_input_output_mode_passes_both_paths() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let tools = vec![tool(
        "copier",
        OutputMode::InputOutput,
        script(dir.path(), "copier", "head -c 6 \"$1\" > \"$2\""),
    )];

    let mut process = process(&[file]);
    process.compress_single(0, &tools).unwrap();

    let result = process.results().get("copier", 0).unwrap();
    assert!(result.is_ok(), "{:?}", result.error);
    assert_eq!(result.final_size, 6);
}

#[test]
fn test_missing_artifact_is_a_size_error() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let tools = vec![tool(
        "lazy",
        OutputMode::InputOutput,
        script(dir.path(), "lazy", "exit 0"),
    )];

    let mut process = process(&[file]);
    process.compress_single(0, &tools).unwrap();

    let result = process.results().get("lazy", 0).unwrap();
    assert!(matches!(result.error, Some(ExecutionError::ReadSize { .. })));
    assert_eq!(result.final_size, result.original_size);
}

#[test]
fn test_stdout_temp_failure_skips_spawn() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let marker = dir.path().join("ran");
    let body = format!("touch {}", marker.display());
    let tools = vec![tool("printer", OutputMode::Stdout, script(dir.path(), "printer", &body))];

    let mut process = process(&[file]);
    fs::remove_dir_all(process.workspace().path().join("0")).unwrap();
    process.compress_single(0, &tools).unwrap();

    let result = process.results().get("printer", 0).unwrap();
    assert!(matches!(result.error, Some(ExecutionError::CreateTemp { .. })));
    assert!(!marker.exists());
}

#[test]
fn test_missing_program_is_tool_not_found() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let launcher = Launcher::Native {
        program: dir.path().join("does-not-exist"),
    };
    let tools = vec![tool("ghost", OutputMode::BatchOverwrite, launcher)];

    let mut process = process(&[file]);
    process.compress_all(&tools).unwrap();

    let result = process.results().get("ghost", 0).unwrap();
    assert_eq!(result.error, Some(ExecutionError::ToolNotFound));
}

#[test]
fn test_wrapped_launcher_runs_tool_through_wrapper() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let shrink = batch_tool(dir.path(), "shrink", "ab");
    let Launcher::Native { program } = shrink.launcher else {
        unreachable!()
    };
    let Launcher::Native { program: wrapper } = script(dir.path(), "wrapper", "exec \"$@\"") else {
        unreachable!()
    };
    let wrapped = ScheduledTool {
        launcher: Launcher::Wrapped { wrapper, program },
        ..shrink
    };

    let mut process = process(&[file]);
    process.compress_all(&[wrapped]).unwrap();

    let result = process.results().get("shrink", 0).unwrap();
    assert!(result.is_ok(), "{:?}", result.error);
    assert_eq!(result.final_size, 2);
    assert_eq!(result.command_line[0], "wrapper");
}

#[test]
fn test_keep_all_moves_every_existing_artifact() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "photo.txt", "0123456789");
    let tools = vec![
        batch_tool(dir.path(), "small", "a"),
        batch_tool(dir.path(), "large", "abcdefghijklmnop"),
        failing_tool(dir.path(), "broken"),
    ];

    let mut process = process(&[file]);
    process.compress_all(&tools).unwrap();

    let existing = process
        .results()
        .for_file(0)
        .filter(|(_, result)| result.artifact.is_file())
        .count();
    let placed = process.flush(0, process.winners(0).by_size.as_deref(), WritePolicy::KeepAll);

    assert_eq!(placed.len(), existing);
    assert!(placed.iter().all(Placement::is_ok));
    for name in ["small", "large", "broken"] {
        assert!(dir.path().join(format!("photo-{name}.txt")).exists(), "{name}");
    }
}

#[test]
fn test_overwrite_replaces_original_with_winner() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let tools = vec![batch_tool(dir.path(), "shrink", "ab")];

    let mut process = process(&[file.clone()]);
    process.compress_all(&tools).unwrap();
    let winners = process.winners(0);
    let placed = process.flush(0, winners.select(Selection::Size), WritePolicy::Overwrite);

    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].destination, file);
    assert_eq!(fs::read_to_string(&file).unwrap(), "ab");
}

#[test]
fn test_undecodable_output_never_overwrites_original() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("photo.png");
    image::RgbImage::from_fn(32, 32, |x, y| {
        image::Rgb([(x * 8) as u8, (y * 8) as u8, ((x ^ y) * 8) as u8])
    })
    .save(&file)
    .unwrap();
    let original = fs::read(&file).unwrap();
    assert!(original.len() > 60);

    let tools = vec![tool(
        "truncate",
        OutputMode::Stdout,
        script(dir.path(), "truncate", "head -c 60 \"$1\""),
    )];

    let mut process = process(&[file.clone()]);
    process.compress_single(0, &tools).unwrap();
    process.benchmark_decode_time(Duration::from_millis(5)).unwrap();

    let result = process.results().get("truncate", 0).unwrap();
    assert!(result.is_ok(), "{:?}", result.error);
    assert!(result.decode.as_ref().is_some_and(|bench| bench.error.is_some()));
    assert!(result.has_error());
    assert!(!process.is_error_free());

    let winners = process.winners(0);
    assert_eq!(winners.by_size, None);
    assert!(process.flush(0, winners.select(Selection::Size), WritePolicy::Overwrite).is_empty());
    assert_eq!(fs::read(&file).unwrap(), original);
}

#[test]
fn test_cancel_kills_running_tools() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let tools = vec![tool(
        "sleeper",
        OutputMode::BatchOverwrite,
        script(dir.path(), "sleeper", "sleep 30"),
    )];

    let cancel = CancelHandle::new();
    let (mut process, _) =
        CompressionProcess::new(&[file], ProcessOptions::default(), cancel.clone(), Output::silent())
            .unwrap();

    let trigger = cancel.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        trigger.cancel();
    });

    let start = Instant::now();
    let outcome = process.compress_all(&tools);
    canceller.join().unwrap();

    assert_eq!(outcome, Err(RoundError::Interrupted));
    assert!(start.elapsed() < Duration::from_secs(10));
    let result = process.results().get("sleeper", 0).unwrap();
    assert_eq!(result.error, Some(ExecutionError::Interrupted));

    // Later rounds do not start
    assert_eq!(process.compress_single(0, &tools), Err(RoundError::Interrupted));
}

#[test]
fn test_unreadable_paths_are_skipped() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let missing = dir.path().join("missing.txt");

    let (process, all_read) = CompressionProcess::new(
        &[file, missing],
        ProcessOptions::default(),
        CancelHandle::new(),
        Output::silent(),
    )
    .unwrap();

    assert!(!all_read);
    assert_eq!(process.files().len(), 1);
    assert_eq!(process.files()[0].base_name, "a");
    assert_eq!(process.files()[0].extension, ".txt");
}

#[test]
fn test_workspace_removed_on_drop() {
    let dir = TempDir::new().unwrap();
    let file = input(dir.path(), "a.txt", "0123456789");
    let tools = vec![batch_tool(dir.path(), "shrink", "ab")];

    let mut process = process(&[file]);
    process.compress_all(&tools).unwrap();
    let workspace = process.workspace().path().to_path_buf();
    assert!(workspace.exists());

    drop(process);
    assert!(!workspace.exists());
}
