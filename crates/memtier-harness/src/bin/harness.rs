//! CLI entrypoint for memtier tooling.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use memtier_harness::{RouteRequest, audit, check, route};
use serde::Serialize;

/// Offline tooling for the memtier tiering layer.
#[derive(Debug, Parser)]
#[command(name = "memtier-harness")]
#[command(about = "Check tiering environments, simulate routing and audit captured logs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a tier declaration the way the preloaded library would.
    Check {
        /// Value of MEMKIND_MEM_TIERING_CONFIG.
        #[arg(long)]
        config: Option<String>,
        /// Value of MEMKIND_MEM_TIERING_LOG_LEVEL.
        #[arg(long)]
        log_level: Option<String>,
        /// Value of MEMKIND_MEM_TIERING_POLICY.
        #[arg(long)]
        policy: Option<String>,
        /// Output JSON path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run a placement policy over a synthetic allocation stream.
    Route {
        #[arg(long)]
        config: String,
        #[arg(long)]
        policy: Option<String>,
        /// Number of allocations to route.
        #[arg(long, default_value_t = 100)]
        count: usize,
        /// Request size in bytes; repeat to cycle through several sizes.
        #[arg(long = "size")]
        sizes: Vec<usize>,
        /// Control assignment `path=value`; repeatable, applied in order.
        #[arg(long = "ctl")]
        ctl: Vec<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Classify each line of captured program output.
    AuditLog {
        /// Captured stdout of a preloaded program.
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check {
            config,
            log_level,
            policy,
            output,
        } => {
            let report = check(config.as_deref(), log_level.as_deref(), policy.as_deref());
            emit(&report, output.as_deref())?;
            if !report.ok {
                std::process::exit(1);
            }
        }
        Command::Route {
            config,
            policy,
            count,
            sizes,
            ctl,
            output,
        } => {
            let report = match route(&RouteRequest {
                config,
                policy,
                count,
                sizes,
                ctl,
            }) {
                Ok(report) => report,
                Err(err) => {
                    eprintln!("route: {err}");
                    std::process::exit(1);
                }
            };
            emit(&report, output.as_deref())?;
        }
        Command::AuditLog { input, output } => {
            let text = std::fs::read_to_string(&input)?;
            let report = audit(&text);
            emit(&report, output.as_deref())?;
            if !report.is_clean() {
                eprintln!(
                    "{} malformed tiering line(s) in {}",
                    report.malformed.len(),
                    input.display()
                );
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
