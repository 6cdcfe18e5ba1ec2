//! The generate-and-validate search loop.
//!
//! Stage the project, establish a baseline score, then evaluate candidates
//! in generated order against the staged copy, tracking the best strictly
//! improving result and stopping early on a perfect fix.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::ast::annotate;
use crate::diff::unified_diff;
use crate::generate::candidates;
use crate::harness::{TestRunResult, run_test_command};
use crate::mutate::default_catalog;
use crate::parse::parse_module;
use crate::score::{SENTINEL_SCORE, ScoreReport, TestStats, score_test_run};
use crate::stage::stage_project;
use crate::ui::Ui;

/// Configuration for one repair session.
#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Root of the project whose tests fail.
    pub project_root: PathBuf,

    /// The one source file candidates are generated from.
    pub target_file: PathBuf,

    /// Shell command that runs the test suite in the staged workspace.
    pub test_cmd: String,

    /// Maximum number of candidates executed against the harness.
    pub budget: usize,

    /// Per-run timeout for each harness invocation.
    pub timeout: Duration,

    /// Accepted and recorded, but generation is fully deterministic today;
    /// reserved for future sampling strategies.
    pub seed: u64,
}

/// Terminal classification of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    /// The baseline already passed; nothing to repair.
    AlreadyPassing,
    /// Some candidate reached score 0.
    Fixed,
    /// Best candidate beat the baseline but failures remain.
    Improved,
    /// No candidate improved on the baseline.
    NoFix,
}

impl RepairStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStatus::AlreadyPassing => "already_passing",
            RepairStatus::Fixed => "fixed",
            RepairStatus::Improved => "improved",
            RepairStatus::NoFix => "no_fix",
        }
    }
}

/// Best-so-far result; starts at the baseline and is replaced only by a
/// strictly better score, so it is monotonically non-increasing.
#[derive(Debug, Clone)]
pub struct BestResult {
    pub score: u32,
    pub stats: TestStats,
    /// Description of the winning edit; `None` while the baseline holds.
    pub mutator: Option<String>,
    /// Full rendered source of the winning candidate.
    pub patch_source: Option<String>,
    /// Unified diff of the winning candidate against the original text.
    pub diff: Option<String>,
}

/// Final state of a completed session.
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub status: RepairStatus,
    pub baseline_exit: Option<i32>,
    pub baseline: ScoreReport,
    pub best: BestResult,
    /// Candidates actually executed against the harness.
    pub tried: usize,
}

/// Run a full repair session with the real test harness.
pub fn run_repair(config: &RepairConfig, ui: &mut Ui) -> Result<RepairOutcome> {
    run_repair_with(config, ui, |cwd| {
        run_test_command(&config.test_cmd, cwd, config.timeout)
    })
}

/// Session loop with an injectable harness runner.
pub(crate) fn run_repair_with(
    config: &RepairConfig,
    ui: &mut Ui,
    mut run_tests: impl FnMut(&Path) -> Result<TestRunResult>,
) -> Result<RepairOutcome> {
    let workspace = stage_project(&config.project_root, &config.target_file)?;

    let (baseline_exit, baseline) = scored_run(&mut run_tests, workspace.root(), ui);
    ui.line(format!(
        "baseline: exit={} score={} stats={:?}",
        exit_label(baseline_exit),
        baseline.score,
        baseline.stats
    ));

    if baseline.score == 0 {
        ui.line("all tests already pass, nothing to repair");
        return Ok(RepairOutcome {
            status: RepairStatus::AlreadyPassing,
            baseline_exit,
            best: BestResult {
                score: 0,
                stats: baseline.stats.clone(),
                mutator: None,
                patch_source: None,
                diff: None,
            },
            baseline,
            tried: 0,
        });
    }

    let original_source = fs::read_to_string(workspace.staged_target()).with_context(|| {
        format!(
            "failed to read staged target file {:?}",
            workspace.staged_target()
        )
    })?;

    let mut module = parse_module(&original_source).with_context(|| {
        format!("failed to parse target file {:?}", config.target_file)
    })?;
    annotate(&mut module);

    let operators = default_catalog();
    // Request extra headroom so skipped mutations cannot starve the search.
    let generation_cap = config.budget.saturating_mul(3);

    let mut best = BestResult {
        score: baseline.score,
        stats: baseline.stats.clone(),
        mutator: None,
        patch_source: None,
        diff: None,
    };
    let mut tried = 0usize;

    for candidate in candidates(&module, &operators, generation_cap) {
        if tried >= config.budget {
            break;
        }
        tried += 1;

        fs::write(workspace.staged_target(), &candidate.source).with_context(|| {
            format!(
                "failed to write candidate to staged target {:?}",
                workspace.staged_target()
            )
        })?;

        let (exit, report) = scored_run(&mut run_tests, workspace.root(), ui);
        ui.candidate_progress(
            tried,
            config.budget,
            &candidate.mutator,
            exit_label(exit),
            report.score,
        );

        if report.score < best.score {
            let target_label = config.target_file.display().to_string();
            best = BestResult {
                score: report.score,
                stats: report.stats,
                mutator: Some(candidate.mutator.clone()),
                diff: Some(unified_diff(
                    &original_source,
                    &candidate.source,
                    &target_label,
                    &format!("{target_label} (patched)"),
                )),
                patch_source: Some(candidate.source),
            };
        }

        if best.score == 0 {
            ui.title("found a full fix");
            break;
        }
    }

    let status = if best.score == 0 {
        RepairStatus::Fixed
    } else if best.score < baseline.score {
        RepairStatus::Improved
    } else {
        RepairStatus::NoFix
    };

    Ok(RepairOutcome {
        status,
        baseline_exit,
        baseline,
        best,
        tried,
    })
}

/// Run the harness once, converting launch failures into a sentinel-worst
/// score instead of aborting the session.
fn scored_run(
    run_tests: &mut impl FnMut(&Path) -> Result<TestRunResult>,
    cwd: &Path,
    ui: &mut Ui,
) -> (Option<i32>, ScoreReport) {
    match run_tests(cwd) {
        Ok(result) => {
            let report = score_test_run(&result);
            (result.exit_code, report)
        }
        Err(e) => {
            ui.runner_error(format!("test harness failed to run: {e}"));
            (
                None,
                ScoreReport {
                    score: SENTINEL_SCORE,
                    stats: TestStats::default(),
                },
            )
        }
    }
}

fn exit_label(exit: Option<i32>) -> String {
    match exit {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn make_project(target_source: &str) -> (TempDir, RepairConfig) {
        let td = TempDir::new().unwrap();
        let target = td.path().join("f.py");
        fs::write(&target, target_source).unwrap();

        let config = RepairConfig {
            project_root: td.path().to_path_buf(),
            target_file: target,
            test_cmd: "unused".to_string(),
            budget: 50,
            timeout: Duration::from_secs(5),
            seed: 0,
        };
        (td, config)
    }

    fn passing() -> TestRunResult {
        TestRunResult {
            exit_code: Some(0),
            stdout: "2 passed in 0.01s".to_string(),
            stderr: String::new(),
            duration: Duration::from_millis(1),
        }
    }

    fn failing(failed: u32) -> TestRunResult {
        TestRunResult {
            exit_code: Some(1),
            stdout: format!("{failed} failed, 1 passed in 0.01s"),
            stderr: String::new(),
            duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn already_passing_baseline_short_circuits() {
        let (_td, config) = make_project("def f(a, b):\n    return a - b\n");
        let mut ui = Ui::silent();

        let mut runs = 0;
        let outcome = run_repair_with(&config, &mut ui, |_| {
            runs += 1;
            Ok(passing())
        })
        .unwrap();

        assert_eq!(outcome.status, RepairStatus::AlreadyPassing);
        assert_eq!(outcome.tried, 0);
        assert_eq!(runs, 1);
        assert!(outcome.best.patch_source.is_none());
    }

    #[test]
    fn repairs_buggy_subtraction_and_exits_early() {
        let (_td, config) = make_project("def f(a, b):\n    return a - b\n");
        let mut ui = Ui::silent();

        let mut runs = 0;
        let outcome = run_repair_with(&config, &mut ui, |cwd| {
            runs += 1;
            let staged = fs::read_to_string(cwd.join("f.py")).unwrap();
            if staged.contains("a + b") {
                Ok(passing())
            } else {
                Ok(failing(1))
            }
        })
        .unwrap();

        assert_eq!(outcome.status, RepairStatus::Fixed);
        assert_eq!(outcome.best.score, 0);
        assert!(outcome.best.mutator.as_deref().unwrap().starts_with("arithmetic_op@"));
        assert!(outcome.best.patch_source.as_deref().unwrap().contains("return a + b"));
        assert!(outcome.best.diff.as_deref().unwrap().contains("+    return a + b"));

        // The arithmetic operator generates the fix first; early exit means
        // exactly one candidate run besides the baseline.
        assert_eq!(outcome.tried, 1);
        assert_eq!(runs, 2);
    }

    #[test]
    fn relational_bug_is_reachable() {
        let (_td, config) = make_project("def sign(x):\n    if x > 0:\n        return 1\n    return 0\n");
        let mut ui = Ui::silent();

        let outcome = run_repair_with(&config, &mut ui, |cwd| {
            let staged = fs::read_to_string(cwd.join("f.py")).unwrap();
            if staged.contains("x >= 0") || staged.contains("not x > 0") {
                Ok(passing())
            } else {
                Ok(failing(1))
            }
        })
        .unwrap();

        assert_eq!(outcome.status, RepairStatus::Fixed);
        assert_eq!(outcome.best.score, 0);
    }

    #[test]
    fn no_fix_when_nothing_improves() {
        let (_td, config) = make_project("def f(a, b):\n    return a - b\n");
        let mut ui = Ui::silent();

        let outcome = run_repair_with(&config, &mut ui, |_| Ok(failing(2))).unwrap();

        assert_eq!(outcome.status, RepairStatus::NoFix);
        assert_eq!(outcome.best.score, outcome.baseline.score);
        assert!(outcome.best.mutator.is_none());
        assert!(outcome.best.patch_source.is_none());
        assert!(outcome.tried > 0);
    }

    #[test]
    fn budget_bounds_candidate_runs() {
        let (_td, mut config) = make_project("a = 1 + 1\nb = 2 + 2\nc = 1 + 2\nd = 2 - 1\n");
        config.budget = 3;
        let mut ui = Ui::silent();

        let mut runs = 0;
        let outcome = run_repair_with(&config, &mut ui, |_| {
            runs += 1;
            Ok(failing(2))
        })
        .unwrap();

        assert_eq!(outcome.status, RepairStatus::NoFix);
        assert_eq!(outcome.tried, 3);
        assert_eq!(runs, 4); // baseline + budget
    }

    #[test]
    fn best_score_is_monotonically_non_increasing() {
        let (_td, config) = make_project("a = 1 + 1\nb = 2 + 2\nc = 1 + 2\n");
        let mut ui = Ui::silent();

        // Baseline 5, then candidate scores bounce around; best must only fall.
        let scores = [5u32, 4, 6, 3, 9, 3, 2];
        let mut call = 0usize;

        let outcome = run_repair_with(&config, &mut ui, |_| {
            let score = scores.get(call).copied().unwrap_or(7);
            call += 1;
            Ok(failing(score))
        })
        .unwrap();

        assert_eq!(outcome.best.score, 2);
        assert_eq!(outcome.status, RepairStatus::Improved);
    }

    #[test]
    fn harness_launch_failure_is_not_fatal_for_candidates() {
        let (_td, mut config) = make_project("a = 1 + 1\nb = 2 + 2\n");
        config.budget = 2;
        let mut ui = Ui::silent();

        let mut call = 0;
        let outcome = run_repair_with(&config, &mut ui, |_| {
            call += 1;
            if call == 2 {
                anyhow::bail!("simulated launch failure");
            }
            Ok(failing(1))
        })
        .unwrap();

        assert_eq!(outcome.status, RepairStatus::NoFix);
        assert_eq!(outcome.tried, 2);
    }

    #[test]
    fn unparseable_target_is_fatal() {
        let (_td, config) = make_project("def broken(:\n");
        let mut ui = Ui::silent();

        let err = run_repair_with(&config, &mut ui, |_| Ok(failing(1))).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn missing_project_is_fatal() {
        let config = RepairConfig {
            project_root: PathBuf::from("/nonexistent/py-mend-project"),
            target_file: PathBuf::from("/nonexistent/py-mend-project/f.py"),
            test_cmd: "true".to_string(),
            budget: 1,
            timeout: Duration::from_secs(1),
            seed: 0,
        };
        let mut ui = Ui::silent();
        assert!(run_repair_with(&config, &mut ui, |_| Ok(passing())).is_err());
    }
}
