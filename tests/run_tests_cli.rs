#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{ Path, PathBuf };
use std::process::Command;

use docdb_ops::test_runner::{ TestCommand, TestRunOptions };

fn shell(script: &str, cwd: &Path) -> TestCommand {
    TestCommand {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        cwd: cwd.to_path_buf(),
        python_path: vec![cwd.join("functions")],
    }
}

/// A stand-in interpreter that records its arguments and exits with `code`.
fn fake_python(dir: &Path, code: i32) -> PathBuf {
    let path = dir.join("fake-python");
    std::fs::write(&path, format!("#!/bin/sh\necho \"$@\" > \"$(pwd)/args.txt\"\nexit {}\n", code)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn exit_code_is_propagated() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(shell("exit 0", dir.path()).run(), 0);
    assert_eq!(shell("exit 3", dir.path()).run(), 3);
}

#[test]
fn missing_program_yields_one() {
    let dir = tempfile::tempdir().unwrap();
    let mut command = shell("exit 0", dir.path());
    command.program = "definitely-not-a-real-interpreter".to_string();
    assert_eq!(command.run(), 1);
}

#[test]
fn child_sees_python_path() {
    let dir = tempfile::tempdir().unwrap();
    let command = shell("case \"$PYTHONPATH\" in *functions*) exit 0 ;; *) exit 9 ;; esac", dir.path());
    assert_eq!(command.run(), 0);
}

#[test]
fn options_drive_fake_interpreter() {
    let dir = tempfile::tempdir().unwrap();
    let python = fake_python(dir.path(), 0);
    let options = TestRunOptions {
        test_file: Some(PathBuf::from("tests/unit/test_search.py")),
        coverage: false,
        backend_dir: dir.path().to_path_buf(),
        python: python.to_string_lossy().into_owned(),
        ..TestRunOptions::default()
    };
    assert_eq!(options.command().run(), 0);

    let recorded = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
    assert!(recorded.starts_with("-m pytest tests/unit/test_search.py"));
    assert!(!recorded.contains("--cov"));
}

#[test]
fn binary_exits_with_suite_code() {
    let dir = tempfile::tempdir().unwrap();
    let python = fake_python(dir.path(), 2);

    let status = Command::new(env!("CARGO_BIN_EXE_run-tests"))
        .arg("--python")
        .arg(&python)
        .arg("--backend-dir")
        .arg(dir.path())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(2));

    let recorded = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
    assert!(recorded.contains("--cov=functions"));
    assert!(recorded.contains("-x"));
}

#[test]
fn binary_passes_with_zero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let python = fake_python(dir.path(), 0);

    let status = Command::new(env!("CARGO_BIN_EXE_run-tests"))
        .args(["--no-coverage", "--python"])
        .arg(&python)
        .arg("--backend-dir")
        .arg(dir.path())
        .status()
        .unwrap();
    assert!(status.success());
}
