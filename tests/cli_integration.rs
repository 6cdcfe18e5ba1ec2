use assert_cmd::Command;
use regex::Regex;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Build a throwaway project: a buggy `app.py` plus a fake test harness
/// script that is staged along with the project and run with `sh check.sh`.
///
/// The script passes only when the staged `app.py` contains the fixed
/// expression, so the search has to find the arithmetic substitution.
fn make_fixture_project() -> TempDir {
    let td = TempDir::new().expect("TempDir should create");

    fs::write(td.path().join("app.py"), "def add(a, b):\n    return a - b\n")
        .expect("write app.py");

    let script = r#"if grep -q 'return a + b' app.py; then
  echo "2 passed in 0.01s"
  exit 0
fi
echo "1 failed, 1 passed in 0.02s"
exit 1
"#;
    fs::write(td.path().join("check.sh"), script).expect("write check.sh");

    td
}

fn run_py_mend(args: &[&str], cwd: &Path) -> std::process::Output {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("py-mend"));
    cmd.args(args)
        .current_dir(cwd)
        .env("NO_COLOR", "1")
        .env("RUST_BACKTRACE", "0");

    cmd.output().expect("command should run")
}

#[test]
fn repair_fixes_buggy_subtraction() {
    let project = make_fixture_project();
    let target = project.path().join("app.py");
    let out_dir = TempDir::new().unwrap();

    let output = run_py_mend(
        &[
            "repair",
            "--project",
            project.path().to_str().unwrap(),
            "--target",
            target.to_str().unwrap(),
            "--tests",
            "sh check.sh",
            "--budget",
            "50",
            "--out-dir",
            out_dir.path().to_str().unwrap(),
        ],
        project.path(),
    );

    assert!(output.status.success(), "repair should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("status:          fixed"), "stdout:\n{stdout}");

    let re_progress = Regex::new(r"\[\d+/\d+\] arithmetic_op@\d+ -> exit=0 score=0").unwrap();
    assert!(re_progress.is_match(&stdout), "stdout:\n{stdout}");

    // Original project is untouched; the fix lives in the artifacts.
    let original = fs::read_to_string(&target).unwrap();
    assert!(original.contains("return a - b"));

    let patch = fs::read_to_string(out_dir.path().join("best_patch.py")).unwrap();
    assert_eq!(patch, "def add(a, b):\n    return a + b\n");

    let diff = fs::read_to_string(out_dir.path().join("best_patch.diff")).unwrap();
    assert!(diff.contains("-    return a - b"));
    assert!(diff.contains("+    return a + b"));

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.path().join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary["status"], "fixed");
    assert_eq!(summary["baseline"]["score"], 1);
    assert_eq!(summary["best"]["score"], 0);
}

#[test]
fn repair_json_mode_keeps_stdout_machine_readable() {
    let project = make_fixture_project();
    let target = project.path().join("app.py");
    let out_dir = TempDir::new().unwrap();

    let output = run_py_mend(
        &[
            "repair",
            "--project",
            project.path().to_str().unwrap(),
            "--target",
            target.to_str().unwrap(),
            "--tests",
            "sh check.sh",
            "--budget",
            "50",
            "--out-dir",
            out_dir.path().to_str().unwrap(),
            "--json",
        ],
        project.path(),
    );

    assert!(output.status.success());

    // stdout must be exactly one JSON document; human chatter goes to stderr.
    let stdout = String::from_utf8_lossy(&output.stdout);
    let report: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should parse as JSON");
    assert_eq!(report["tool"], "py-mend");
    assert_eq!(report["status"], "fixed");
    assert!(report["best"]["mutator"]
        .as_str()
        .unwrap()
        .starts_with("arithmetic_op@"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("baseline:"), "stderr:\n{stderr}");
}

#[test]
fn already_passing_project_short_circuits() {
    let project = make_fixture_project();
    fs::write(
        project.path().join("app.py"),
        "def add(a, b):\n    return a + b\n",
    )
    .unwrap();
    let target = project.path().join("app.py");
    let out_dir = TempDir::new().unwrap();

    let output = run_py_mend(
        &[
            "repair",
            "--project",
            project.path().to_str().unwrap(),
            "--target",
            target.to_str().unwrap(),
            "--tests",
            "sh check.sh",
            "--out-dir",
            out_dir.path().to_str().unwrap(),
        ],
        project.path(),
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("status:          already_passing"),
        "stdout:\n{stdout}"
    );
    assert!(!out_dir.path().join("best_patch.py").exists());
}

#[test]
fn fail_on_no_fix_sets_exit_code() {
    let project = make_fixture_project();
    // A harness no mutation can satisfy.
    fs::write(
        project.path().join("check.sh"),
        "echo '3 failed in 0.01s'\nexit 1\n",
    )
    .unwrap();
    let target = project.path().join("app.py");
    let out_dir = TempDir::new().unwrap();

    let output = run_py_mend(
        &[
            "repair",
            "--project",
            project.path().to_str().unwrap(),
            "--target",
            target.to_str().unwrap(),
            "--tests",
            "sh check.sh",
            "--budget",
            "5",
            "--out-dir",
            out_dir.path().to_str().unwrap(),
            "--fail-on-no-fix",
        ],
        project.path(),
    );

    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("status:          no_fix"), "stdout:\n{stdout}");

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.path().join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary["status"], "no_fix");
    assert_eq!(summary["baseline"]["score"], 3);
    assert_eq!(summary["best"]["score"], 3);
}

#[test]
fn missing_paths_exit_with_code_2() {
    let project = make_fixture_project();

    let output = run_py_mend(
        &[
            "repair",
            "--project",
            "/nonexistent/py-mend-project",
            "--target",
            "/nonexistent/py-mend-project/app.py",
        ],
        project.path(),
    );
    assert_eq!(output.status.code(), Some(2));

    let output = run_py_mend(
        &[
            "repair",
            "--project",
            project.path().to_str().unwrap(),
            "--target",
            project.path().join("missing.py").to_str().unwrap(),
        ],
        project.path(),
    );
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn candidates_lists_mutations_without_running_tests() {
    let project = make_fixture_project();
    let target = project.path().join("app.py");

    let output = run_py_mend(
        &["candidates", "--target", target.to_str().unwrap()],
        project.path(),
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("candidates for"), "stdout:\n{stdout}");
    assert!(stdout.contains("arithmetic_op@2"), "stdout:\n{stdout}");
    assert!(stdout.contains("stmt_delete@"), "stdout:\n{stdout}");
}

#[test]
fn candidates_limit_and_source_listing() {
    let project = make_fixture_project();
    let target = project.path().join("app.py");

    let output = run_py_mend(
        &[
            "candidates",
            "--target",
            target.to_str().unwrap(),
            "--limit",
            "1",
            "--show-source",
        ],
        project.path(),
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 candidates for"), "stdout:\n{stdout}");
    assert!(stdout.contains("| def add(a, b):"), "stdout:\n{stdout}");
    assert!(stdout.contains("|     return a + b"), "stdout:\n{stdout}");
}

#[test]
fn cli_help_names_both_subcommands() {
    let output = run_py_mend(&["--help"], Path::new("."));
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("repair"));
    assert!(stdout.contains("candidates"));
}
