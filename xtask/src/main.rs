//! Build automation tasks for PeerFS
//!
//! Run with: cargo xtask <command>

use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "PeerFS build automation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run unit and integration tests
    Test {
        /// Only the workspace integration suites
        #[arg(long)]
        integration: bool,
    },

    /// Run clippy lints
    Lint,

    /// Check formatting
    Fmt,

    /// Run all CI checks
    Ci,

    /// Run the codec benchmarks
    Bench,

    /// Generate documentation
    Doc {
        /// Open the docs in a browser
        #[arg(long)]
        open: bool,
    },
}

const FMT: &[&str] = &["fmt", "--all", "--check"];
const CLIPPY: &[&str] = &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"];
const TEST: &[&str] = &["test", "--workspace"];

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Test { integration } => {
            if integration {
                cargo(&["test", "-p", "peerfs-integration-tests"])?;
            } else {
                cargo(TEST)?;
            }
        }
        Commands::Lint => cargo(CLIPPY)?,
        Commands::Fmt => cargo(FMT)?,
        Commands::Ci => {
            println!("Running CI checks...");
            cargo(FMT)?;
            cargo(CLIPPY)?;
            cargo(TEST)?;
            println!("All CI checks passed!");
        }
        Commands::Bench => cargo(&["bench", "-p", "peerfs-crypto"])?,
        Commands::Doc { open } => {
            let mut args = vec!["doc", "--workspace", "--no-deps"];
            if open {
                args.push("--open");
            }
            cargo(&args)?;
        }
    }

    Ok(())
}

fn cargo(args: &[&str]) -> anyhow::Result<()> {
    let status = Command::new(env!("CARGO")).args(args).status()?;

    if !status.success() {
        anyhow::bail!("cargo {} failed", args.join(" "));
    }

    Ok(())
}
