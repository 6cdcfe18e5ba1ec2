mod ast;
mod cli;
mod diff;
mod generate;
mod harness;
mod mutate;
mod parse;
mod render;
mod report;
mod score;
mod session;
mod stage;
mod ui;

/// Entry point for the `py-mend` binary.
fn main() -> anyhow::Result<()> {
    cli::run()
}
