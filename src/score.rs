//! Turn a raw test-harness run into a comparable fitness score.
//!
//! The summary-line scan is a heuristic over pytest-style output and is kept
//! behind [`parse_summary`] so the rest of the crate can treat its result as
//! approximate. The sentinel floor keeps a crash-before-tests run from ever
//! looking better than a run with a concretely parsed failure count.

use serde::Serialize;

use crate::harness::TestRunResult;

/// Score given to a failing run whose output yields no failure count.
///
/// Strictly worse than any parsed count, so an unparseable crash can never
/// tie with (or beat) a genuine partial fix.
pub const SENTINEL_SCORE: u32 = 9999;

/// Counters scraped from the harness summary line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestStats {
    pub failed: u32,
    pub errors: u32,
    pub skipped: u32,
    pub xfailed: u32,
    pub xpassed: u32,
    /// `None` when the run exited cleanly and no counts were scraped.
    pub passed: Option<u32>,
}

/// Fitness score plus the stats it was derived from. Score 0 means every
/// observed test passed; higher is worse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub score: u32,
    pub stats: TestStats,
}

/// Scrape test counters from combined harness output.
///
/// Scans for the *last* line mentioning " failed", " passed", " deselected"
/// or " error" (the pytest summary-line convention), then classifies each
/// integer token by the following word's prefix.
pub fn parse_summary(text: &str) -> TestStats {
    let mut summary_line = "";
    for line in text.lines() {
        if line.contains(" failed")
            || line.contains(" passed")
            || line.contains(" deselected")
            || line.contains(" error")
        {
            summary_line = line;
        }
    }

    let normalized = summary_line.replace(['=', ','], " ");
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    let mut stats = TestStats::default();
    for (i, tok) in tokens.iter().enumerate() {
        let Ok(value) = tok.parse::<u32>() else {
            continue;
        };
        let Some(next) = tokens.get(i + 1) else {
            continue;
        };
        let next = next.to_lowercase();
        if next.starts_with("failed") {
            stats.failed = value;
        } else if next.starts_with("passed") {
            stats.passed = Some(value);
        } else if next.starts_with("skipped") {
            stats.skipped = value;
        } else if next.starts_with("error") {
            stats.errors = value;
        } else if next.starts_with("xfailed") {
            stats.xfailed = value;
        } else if next.starts_with("xpassed") {
            stats.xpassed = value;
        }
    }

    stats
}

/// Score one harness invocation.
///
/// Exit 0 is the canonical fully-passing report regardless of output text.
/// Otherwise the score is failed + errors, floored at [`SENTINEL_SCORE`]
/// when that sum is zero despite the non-zero exit.
pub fn score_test_run(result: &TestRunResult) -> ScoreReport {
    if result.exit_code == Some(0) {
        return ScoreReport {
            score: 0,
            stats: TestStats::default(),
        };
    }

    let combined = format!("{}\n{}", result.stdout, result.stderr);
    let stats = parse_summary(&combined);

    let failures = stats.failed.saturating_add(stats.errors);
    let score = if failures > 0 { failures } else { SENTINEL_SCORE };

    ScoreReport { score, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run(exit_code: Option<i32>, stdout: &str, stderr: &str) -> TestRunResult {
        TestRunResult {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn clean_exit_scores_zero_regardless_of_output() {
        let report = score_test_run(&run(Some(0), "3 failed, 5 passed", ""));
        assert_eq!(report.score, 0);
        assert_eq!(report.stats.failed, 0);
        assert_eq!(report.stats.passed, None);
    }

    #[test]
    fn failing_run_scores_failed_plus_errors() {
        let out = "=== 3 failed, 5 passed in 0.17s ===";
        let report = score_test_run(&run(Some(1), out, ""));
        assert_eq!(report.score, 3);
        assert_eq!(report.stats.failed, 3);
        assert_eq!(report.stats.passed, Some(5));

        let out = "1 failed, 2 errors in 0.2s";
        let report = score_test_run(&run(Some(1), out, ""));
        assert_eq!(report.score, 3);
    }

    #[test]
    fn unparseable_failure_hits_sentinel_floor() {
        let report = score_test_run(&run(Some(2), "Traceback (most recent call last):", ""));
        assert_eq!(report.score, SENTINEL_SCORE);
        assert!(report.score > 9, "sentinel must beat any single-digit count");
    }

    #[test]
    fn clean_summary_with_nonzero_exit_hits_sentinel_floor() {
        // Harness crashed after printing an all-passing summary.
        let report = score_test_run(&run(Some(1), "5 passed in 0.1s", ""));
        assert_eq!(report.score, SENTINEL_SCORE);
        assert_eq!(report.stats.passed, Some(5));
    }

    #[test]
    fn signal_killed_run_is_scored_not_fatal() {
        let report = score_test_run(&run(None, "", ""));
        assert_eq!(report.score, SENTINEL_SCORE);
    }

    #[test]
    fn huge_counts_saturate_instead_of_overflowing() {
        let out = "4294967295 failed, 1 errors in 1s";
        let report = score_test_run(&run(Some(1), out, ""));
        assert_eq!(report.score, u32::MAX);
    }

    #[test]
    fn last_summary_line_wins() {
        let out = "9 failed, 1 passed in 0.1s\nretrying\n=== 2 failed, 8 passed in 0.2s ===";
        let report = score_test_run(&run(Some(1), out, ""));
        assert_eq!(report.score, 2);
        assert_eq!(report.stats.passed, Some(8));
    }

    #[test]
    fn stderr_is_scanned_after_stdout() {
        let report = score_test_run(&run(Some(1), "", "4 failed in 1.0s"));
        assert_eq!(report.score, 4);
    }

    #[test]
    fn extended_counters_are_parsed() {
        let out = "1 failed, 2 passed, 3 skipped, 4 xfailed, 5 xpassed, 6 errors in 1s";
        let stats = parse_summary(out);
        assert_eq!(
            stats,
            TestStats {
                failed: 1,
                errors: 6,
                skipped: 3,
                xfailed: 4,
                xpassed: 5,
                passed: Some(2),
            }
        );
    }

    #[test]
    fn deselected_line_is_recognized_as_summary() {
        let out = "collected 10 items\n8 deselected in 0.1s";
        let stats = parse_summary(out);
        // Nothing countable toward the score, but the line is chosen.
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.passed, None);
    }
}
