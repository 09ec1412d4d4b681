//! ## kairos-cli
//! **Command-line front end for the simulation kernel**
//!
//! Runs YAML-described scenarios, checks a run against a recorded digest and
//! cross-checks the two scheduler strategies.

use clap::Parser;

mod commands;

use commands::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::run_command(cli)
}
