//! Machine-readable run summary and persisted artifacts.
//!
//! `summary.json` mirrors the session outcome; `best_patch.py` and
//! `best_patch.diff` are written only when a candidate improved on the
//! baseline. Purely a sink: no decisions are made here.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::score::TestStats;
use crate::session::{RepairConfig, RepairOutcome, RepairStatus};
use crate::ui::Ui;

/// Baseline run metadata as persisted.
#[derive(Debug, Clone, Serialize)]
pub struct BaselineReport {
    pub exit_code: Option<i32>,
    pub score: u32,
    pub stats: TestStats,
}

/// Best-result metadata as persisted.
#[derive(Debug, Clone, Serialize)]
pub struct BestReport {
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutator: Option<String>,
    pub stats: TestStats,
}

/// Machine-readable report for one repair session.
///
/// In `--json` mode this is also printed to stdout as pretty JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    /// Tool name, stable across versions.
    pub tool: &'static str,

    /// Current crate version.
    pub version: &'static str,

    pub project_root: PathBuf,
    pub target_file: PathBuf,
    pub test_cmd: String,
    pub budget: usize,
    pub timeout_secs: u64,
    pub seed: u64,

    pub status: RepairStatus,
    pub baseline: BaselineReport,
    pub best: BestReport,

    /// Candidates actually executed against the harness.
    pub tried: usize,
}

impl RepairReport {
    pub fn new(config: &RepairConfig, outcome: &RepairOutcome) -> Self {
        Self {
            tool: "py-mend",
            version: env!("CARGO_PKG_VERSION"),
            project_root: config.project_root.clone(),
            target_file: config.target_file.clone(),
            test_cmd: config.test_cmd.clone(),
            budget: config.budget,
            timeout_secs: config.timeout.as_secs(),
            seed: config.seed,
            status: outcome.status,
            baseline: BaselineReport {
                exit_code: outcome.baseline_exit,
                score: outcome.baseline.score,
                stats: outcome.baseline.stats.clone(),
            },
            best: BestReport {
                score: outcome.best.score,
                mutator: outcome.best.mutator.clone(),
                stats: outcome.best.stats.clone(),
            },
            tried: outcome.tried,
        }
    }
}

/// Persist `summary.json` plus the optional best-patch artifacts.
pub fn write_artifacts(
    out_dir: &Path,
    report: &RepairReport,
    outcome: &RepairOutcome,
) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create results dir {out_dir:?}"))?;

    write_pretty_json(&out_dir.join("summary.json"), report)?;

    if let Some(src) = &outcome.best.patch_source {
        let path = out_dir.join("best_patch.py");
        fs::write(&path, src).with_context(|| format!("failed to write {path:?}"))?;
    }
    if let Some(diff) = &outcome.best.diff {
        let path = out_dir.join("best_patch.diff");
        fs::write(&path, diff).with_context(|| format!("failed to write {path:?}"))?;
    }

    Ok(())
}

/// Print the human-oriented closing summary.
pub fn print_summary(ui: &Ui, report: &RepairReport) {
    ui.title("--- repair summary ---");
    ui.line(format!("status:          {}", report.status.as_str()));
    ui.line(format!(
        "baseline score:  {} (exit {})",
        report.baseline.score,
        report
            .baseline
            .exit_code
            .map_or_else(|| "signal".to_string(), |c| c.to_string())
    ));
    ui.line(format!("best score:      {}", report.best.score));
    if let Some(mutator) = &report.best.mutator {
        ui.line(format!("best mutation:   {mutator}"));
    }
    ui.line(format!("candidates run:  {}", report.tried));

    match report.status {
        RepairStatus::NoFix => {
            ui.line("no candidate improved on the baseline");
        }
        RepairStatus::AlreadyPassing => {}
        _ => ui.line("patch written to best_patch.py / best_patch.diff"),
    }
}

fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize json")?;
    fs::write(path, json).with_context(|| format!("failed to write {path:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreReport;
    use crate::session::BestResult;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_config() -> RepairConfig {
        RepairConfig {
            project_root: PathBuf::from("/tmp/project"),
            target_file: PathBuf::from("/tmp/project/f.py"),
            test_cmd: "pytest -q".to_string(),
            budget: 200,
            timeout: Duration::from_secs(120),
            seed: 0,
        }
    }

    fn fixed_outcome() -> RepairOutcome {
        RepairOutcome {
            status: RepairStatus::Fixed,
            baseline_exit: Some(1),
            baseline: ScoreReport {
                score: 1,
                stats: TestStats {
                    failed: 1,
                    passed: Some(1),
                    ..TestStats::default()
                },
            },
            best: BestResult {
                score: 0,
                stats: TestStats::default(),
                mutator: Some("arithmetic_op@2".to_string()),
                patch_source: Some("def f(a, b):\n    return a + b\n".to_string()),
                diff: Some("--- f.py\n+++ f.py (patched)\n".to_string()),
            },
            tried: 1,
        }
    }

    #[test]
    fn summary_json_round_trips_key_fields() {
        let config = sample_config();
        let outcome = fixed_outcome();
        let report = RepairReport::new(&config, &outcome);

        let out = TempDir::new().unwrap();
        write_artifacts(out.path(), &report, &outcome).unwrap();

        let text = fs::read_to_string(out.path().join("summary.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["tool"], "py-mend");
        assert_eq!(value["status"], "fixed");
        assert_eq!(value["baseline"]["score"], 1);
        assert_eq!(value["best"]["score"], 0);
        assert_eq!(value["best"]["mutator"], "arithmetic_op@2");
        assert_eq!(value["tried"], 1);
    }

    #[test]
    fn patch_artifacts_written_only_when_present() {
        let config = sample_config();

        let outcome = fixed_outcome();
        let report = RepairReport::new(&config, &outcome);
        let out = TempDir::new().unwrap();
        write_artifacts(out.path(), &report, &outcome).unwrap();
        assert!(out.path().join("best_patch.py").is_file());
        assert!(out.path().join("best_patch.diff").is_file());

        let mut no_fix = fixed_outcome();
        no_fix.status = RepairStatus::NoFix;
        no_fix.best = BestResult {
            score: 1,
            stats: TestStats::default(),
            mutator: None,
            patch_source: None,
            diff: None,
        };
        let report = RepairReport::new(&config, &no_fix);
        let out = TempDir::new().unwrap();
        write_artifacts(out.path(), &report, &no_fix).unwrap();
        assert!(out.path().join("summary.json").is_file());
        assert!(!out.path().join("best_patch.py").exists());
        assert!(!out.path().join("best_patch.diff").exists());
    }
}
