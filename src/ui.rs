use console::{Term, style};
use std::{env, fmt::Display};

/// Small UI helper:
/// - normal mode: human output to stdout, errors to stderr
/// - `--json` mode: ALL human output to stderr (stdout stays machine-readable JSON)
/// - fancy styling only on a real TTY and when NO_COLOR/CI are not set
#[derive(Debug, Clone)]
pub struct Ui {
    out: Term,
    err: Term,
    fancy: bool,
    enabled: bool,

    // Observability hooks used by unit tests; they never affect formatting.
    candidates_seen: u64,
    runner_errors: u64,
}

impl Ui {
    pub fn new(json: bool) -> Self {
        // In --json mode, keep stdout clean for JSON and send all human output to stderr.
        let out = if json { Term::stderr() } else { Term::stdout() };
        let err = Term::stderr();

        let out_is_tty = out.is_term();
        let no_color = env::var_os("NO_COLOR").is_some();
        let in_ci = env::var_os("CI").is_some();

        Self {
            out,
            err,
            fancy: out_is_tty && !no_color && !in_ci,
            enabled: true,
            candidates_seen: 0,
            runner_errors: 0,
        }
    }

    /// Useful for unit tests to avoid noisy output.
    #[cfg(test)]
    pub fn silent() -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            fancy: false,
            enabled: false,
            candidates_seen: 0,
            runner_errors: 0,
        }
    }

    fn write_out(&self, s: &str) {
        if self.enabled {
            let _ = self.out.write_line(s);
        }
    }

    fn write_err(&self, s: &str) {
        if self.enabled {
            let _ = self.err.write_line(s);
        }
    }

    pub fn line(&self, msg: impl Display) {
        self.write_out(&msg.to_string());
    }

    pub fn title(&self, msg: impl Display) {
        let s = msg.to_string();
        if self.fancy {
            self.write_out(&style(s).bold().to_string());
        } else {
            self.write_out(&s);
        }
    }

    pub fn error(&self, msg: impl Display) {
        let s = msg.to_string();
        if self.fancy {
            self.write_err(&style(s).red().bold().to_string());
        } else {
            self.write_err(&s);
        }
    }

    /// Per-candidate progress line.
    pub fn candidate_progress(
        &mut self,
        tried: usize,
        budget: usize,
        mutator: &str,
        exit: String,
        score: u32,
    ) {
        self.candidates_seen = self.candidates_seen.saturating_add(1);

        let base = format!("[{tried}/{budget}] {mutator} -> exit={exit} score={score}");
        if self.fancy && score == 0 {
            self.write_out(&style(base).green().bold().to_string());
        } else {
            self.write_out(&base);
        }
    }

    /// Used for harness launch errors; keeps stderr/stdout routing consistent.
    pub fn runner_error(&mut self, msg: impl Display) {
        self.runner_errors += 1;
        self.error(msg);
    }
}
