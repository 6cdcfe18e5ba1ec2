use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::ast::annotate;
use crate::generate::generate_candidates;
use crate::mutate::default_catalog;
use crate::parse::parse_module;
use crate::report::{RepairReport, print_summary, write_artifacts};
use crate::session::{RepairConfig, RepairStatus, run_repair};
use crate::ui::Ui;

const EXIT_ERROR: i32 = 1;
const EXIT_BAD_PATH: i32 = 2;
const EXIT_NO_FIX: i32 = 3;

/// Default cap when listing candidates without a search budget.
const DEFAULT_CANDIDATE_LIST_CAP: usize = 600;

/// Top-level CLI arguments for the `py-mend` binary.
#[derive(Debug, Parser)]
#[command(
    name = "py-mend",
    version,
    about = "Mutation-based automated program repair for Python projects"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands supported by `py-mend`.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search for a patch that makes the failing test suite pass.
    Repair {
        /// Path to the project root.
        #[arg(long)]
        project: PathBuf,

        /// Path to the target Python file to mutate.
        #[arg(long)]
        target: PathBuf,

        /// Test command (shell string), run in the staged project copy.
        #[arg(long, default_value = "pytest -q")]
        tests: String,

        /// Max candidate patches to execute against the test suite.
        #[arg(long, default_value_t = 200)]
        budget: usize,

        /// Seconds allowed per test run.
        #[arg(long, default_value_t = 120)]
        timeout: u64,

        /// Random seed (reserved; generation is deterministic today).
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Directory for summary.json and best-patch artifacts.
        #[arg(long, default_value = "apr_results")]
        out_dir: PathBuf,

        /// Emit the machine-readable JSON report to stdout.
        #[arg(long)]
        json: bool,

        /// Exit with code 3 when no candidate improved on the baseline.
        #[arg(long)]
        fail_on_no_fix: bool,
    },

    /// List the candidate patches for a target file without running tests.
    Candidates {
        /// Path to the target Python file.
        #[arg(long)]
        target: PathBuf,

        /// List at most this many candidates.
        #[arg(long)]
        limit: Option<usize>,

        /// Also print each candidate's full source.
        #[arg(long)]
        show_source: bool,
    },
}

/// Parse CLI arguments and dispatch the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Repair {
            project,
            target,
            tests,
            budget,
            timeout,
            seed,
            out_dir,
            json,
            fail_on_no_fix,
        } => {
            if !project.exists() {
                eprintln!("project path does not exist: {}", project.display());
                std::process::exit(EXIT_BAD_PATH);
            }
            if !target.exists() {
                eprintln!("target file does not exist: {}", target.display());
                std::process::exit(EXIT_BAD_PATH);
            }

            let config = RepairConfig {
                project_root: project,
                target_file: target,
                test_cmd: tests,
                budget,
                timeout: Duration::from_secs(timeout),
                seed,
            };

            let mut ui = Ui::new(json);
            ui.title("py-mend: repair");
            ui.line(format!("project: {:?}", config.project_root));
            ui.line(format!("target:  {:?}", config.target_file));
            ui.line(format!("tests:   {:?}", config.test_cmd));

            let outcome = match run_repair(&config, &mut ui) {
                Ok(outcome) => outcome,
                Err(e) => {
                    if json {
                        let failure = serde_json::json!({
                            "tool": "py-mend",
                            "version": env!("CARGO_PKG_VERSION"),
                            "error": format!("{e:#}"),
                        });
                        println!("{}", serde_json::to_string_pretty(&failure)?);
                        std::process::exit(EXIT_ERROR);
                    }
                    ui.error(format!("repair session failed: {e:#}"));
                    return Err(e);
                }
            };

            let report = RepairReport::new(&config, &outcome);
            write_artifacts(&out_dir, &report, &outcome)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_summary(&ui, &report);
            }

            if fail_on_no_fix && report.status == RepairStatus::NoFix {
                eprintln!("no fix found (--fail-on-no-fix)");
                std::process::exit(EXIT_NO_FIX);
            }

            Ok(())
        }

        Command::Candidates {
            target,
            limit,
            show_source,
        } => {
            if !target.exists() {
                eprintln!("target file does not exist: {}", target.display());
                std::process::exit(EXIT_BAD_PATH);
            }

            let source = std::fs::read_to_string(&target)?;
            let mut module = parse_module(&source)?;
            annotate(&mut module);

            let operators = default_catalog();
            let max = limit.unwrap_or(DEFAULT_CANDIDATE_LIST_CAP);
            let all = generate_candidates(&module, &operators, max);

            println!("{} candidates for {}", all.len(), target.display());
            for (i, cand) in all.iter().enumerate() {
                println!("{:>4}  {}", i + 1, cand.mutator);
                if show_source {
                    for line in cand.source.lines() {
                        println!("      | {line}");
                    }
                }
            }

            Ok(())
        }
    }
}
