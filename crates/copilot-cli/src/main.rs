//! Command-line interface for the market intelligence co-pilot
//!
//! Runs analyses against the simulated data provider.
//!
//! ```bash
//! copilot analyze aapl
//! copilot analyze msft --json --fail 4=not_found
//! copilot repl
//! ```

mod commands;
mod render;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use copilot_analysis::{
    AnalysisOrchestrator, AnalysisRequest, CardSlotRegistry, ErrorKind, OrchestratorConfig,
    ProviderError, RequestId, RequestStatus, SimulatedProvider, TickerMeta, provider,
};
use copilot_utils::{LogFormat, ServiceInfo};
use std::collections::HashSet;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::commands::{Command, CommandError};

#[derive(Parser, Debug)]
#[command(name = "copilot", version)]
#[command(about = "Market intelligence co-pilot", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Timeout for a single card fetch, in seconds
    #[arg(long, global = true, value_name = "SECS")]
    card_timeout_secs: Option<u64>,

    /// Timeout for a whole analysis, in seconds
    #[arg(long, global = true, value_name = "SECS")]
    request_timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze one ticker and print the seven cards
    Analyze {
        ticker: String,

        /// Print the final snapshot as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        simulation: SimulationArgs,
    },
    /// Interactive session
    Repl {
        #[command(flatten)]
        simulation: SimulationArgs,
    },
    /// List the seven analysis cards
    Slots {
        #[arg(long)]
        json: bool,
    },
    /// Show normalized metadata for a ticker
    Meta { ticker: String },
    /// Show service status and health
    Status,
}

#[derive(Args, Debug, Clone)]
struct SimulationArgs {
    /// Base latency of the simulated provider, in milliseconds
    #[arg(long, default_value_t = 150)]
    latency_ms: u64,

    /// Make one card fail on every attempt, e.g. `--fail 4=not_found`
    #[arg(long = "fail", value_name = "SLOT=KIND", value_parser = parse_fault)]
    faults: Vec<Fault>,
}

/// Scripted provider failure for one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fault {
    slot_id: u8,
    kind: ErrorKind,
}

impl Fault {
    fn error(self) -> ProviderError {
        match self.kind {
            ErrorKind::Network => ProviderError::Network("simulated outage".to_string()),
            ErrorKind::Timeout => ProviderError::Timeout { elapsed_ms: 0 },
            ErrorKind::RateLimit => ProviderError::RateLimited {
                provider: "simulated".to_string(),
            },
            _ => ProviderError::NotFound {
                ticker: "requested ticker".to_string(),
                slot: self.slot_id,
            },
        }
    }
}

fn parse_fault(raw: &str) -> Result<Fault, String> {
    let (slot, kind) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SLOT=KIND, got '{raw}'"))?;

    let slot_id: u8 = slot
        .trim()
        .parse()
        .map_err(|_| format!("'{slot}' is not a slot number"))?;
    CardSlotRegistry::slot_by_id(slot_id).map_err(|e| e.to_string())?;

    let kind = match kind.trim().to_lowercase().as_str() {
        "network" => ErrorKind::Network,
        "timeout" => ErrorKind::Timeout,
        "not_found" | "notfound" => ErrorKind::NotFound,
        "rate_limit" | "ratelimit" => ErrorKind::RateLimit,
        other => {
            return Err(format!(
                "unknown failure '{other}', expected network, timeout, not_found or rate_limit"
            ));
        }
    };

    Ok(Fault { slot_id, kind })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    copilot_utils::init_tracing_with(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    });

    let service = ServiceInfo::from_env();
    info!(
        service = %service.service,
        version = %service.version,
        environment = %service.environment,
        "starting copilot"
    );

    match cli.command {
        Commands::Analyze {
            ref ticker,
            json,
            ref simulation,
        } => {
            let orchestrator = build_orchestrator(&cli, simulation)?;
            analyze(&orchestrator, ticker, json).await
        }
        Commands::Repl { ref simulation } => {
            let orchestrator = build_orchestrator(&cli, simulation)?;
            repl(orchestrator, &service).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Slots { json } => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(CardSlotRegistry::all_slots())?
                );
            } else {
                print!("{}", render::slots());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Meta { ref ticker } => {
            let meta = TickerMeta::resolve(ticker)
                .with_context(|| format!("cannot resolve '{ticker}'"))?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => {
            let report = serde_json::json!({
                "status": service.status(),
                "health": service.health(),
                "environment": service.environment,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Orchestrator configuration: defaults, then `COPILOT_*` env, then flags
fn build_config(cli: &Cli) -> Result<OrchestratorConfig> {
    let mut builder = OrchestratorConfig::builder().with_env();
    if let Some(secs) = cli.card_timeout_secs {
        builder = builder.card_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = cli.request_timeout_secs {
        builder = builder.request_timeout(Duration::from_secs(secs));
    }
    builder.build().context("invalid orchestrator configuration")
}

fn build_orchestrator(cli: &Cli, simulation: &SimulationArgs) -> Result<AnalysisOrchestrator> {
    let config = build_config(cli)?;

    // Stagger cards so they land one after another
    let mut simulated = SimulatedProvider::new();
    for slot in CardSlotRegistry::all_slots() {
        let latency = simulation.latency_ms.saturating_mul(u64::from(slot.id) + 1) / 2;
        simulated = simulated.with_slot_latency(slot.id, Duration::from_millis(latency));
    }
    for fault in &simulation.faults {
        simulated = simulated.fail_slot(fault.slot_id, fault.error());
    }

    let provider = provider::layered(Arc::new(simulated), &config);
    Ok(AnalysisOrchestrator::with_config(provider, config)?)
}

fn exit_code(status: RequestStatus) -> ExitCode {
    match status {
        RequestStatus::Succeeded | RequestStatus::PartiallySucceeded => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

/// Submit one ticker, report cards on stderr as they land, print the final snapshot
async fn analyze(orchestrator: &AnalysisOrchestrator, ticker: &str, json: bool) -> Result<ExitCode> {
    let submitted = orchestrator.submit(ticker).await?;
    let request_id = submitted.request_id;

    let finished = if submitted.is_terminal() {
        submitted
    } else {
        follow(orchestrator, request_id).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&finished)?);
    } else {
        print!("{}", render::request(&finished));
    }
    Ok(exit_code(finished.status))
}

async fn follow(orchestrator: &AnalysisOrchestrator, request_id: RequestId) -> Result<AnalysisRequest> {
    let mut updates = orchestrator.subscribe(request_id).await?;
    let mut announced = HashSet::new();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(updates.borrow().clone());
                }
                let snapshot = updates.borrow_and_update().clone();
                for card in snapshot.cards.iter().filter(|c| c.status.is_terminal()) {
                    if announced.insert(card.slot_id) {
                        eprintln!(
                            "{}",
                            render::progress(card, snapshot.ready_count(), snapshot.cards.len())
                        );
                    }
                }
                if snapshot.is_terminal() {
                    return Ok(snapshot);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!(%request_id, "interrupted, cancelling analysis");
                return Ok(orchestrator.cancel(request_id).await?);
            }
        }
    }
}

async fn repl(orchestrator: AnalysisOrchestrator, service: &ServiceInfo) -> Result<()> {
    println!("{}", service.banner());
    println!("{}", Command::help_text().trim_end());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();
    let mut latest: Option<RequestId> = None;

    loop {
        print!("copilot> ");
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(CommandError::Empty) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match command {
            Command::Analyze { ticker } => match orchestrator.submit(&ticker).await {
                Ok(request) if request.is_terminal() => {
                    latest = Some(request.request_id);
                    print!("{}", render::request(&request));
                }
                Ok(request) => {
                    let request_id = request.request_id;
                    latest = Some(request_id);
                    println!("analyzing {ticker} (request {request_id})");

                    let background = orchestrator.clone();
                    tokio::spawn(async move {
                        if let Ok(done) = background.wait(request_id).await {
                            println!("\n{}", render::request(&done));
                        }
                    });
                }
                Err(e) => eprintln!("{}", render::error(&e)),
            },
            Command::Status { request_id } => match request_id.or(latest) {
                Some(id) => match orchestrator.get_status(id).await {
                    Ok(request) => print!("{}", render::request(&request)),
                    Err(e) => eprintln!("{}", render::error(&e)),
                },
                None => println!("no analysis yet"),
            },
            Command::Cancel { request_id } => {
                let target = match request_id {
                    Some(id) => Some(id),
                    None => orchestrator.active_request().await,
                };
                match target {
                    Some(id) => match orchestrator.cancel(id).await {
                        Ok(request) => println!("{id}: {}", request.status),
                        Err(e) => eprintln!("{}", render::error(&e)),
                    },
                    None => println!("nothing to cancel"),
                }
            }
            Command::Slots => print!("{}", render::slots()),
            Command::Help => println!("{}", Command::help_text().trim_end()),
            Command::Exit => break,
        }
    }

    println!("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fault() {
        assert_eq!(
            parse_fault("4=not_found").unwrap(),
            Fault {
                slot_id: 4,
                kind: ErrorKind::NotFound
            }
        );
        assert_eq!(parse_fault(" 2 = Network ").unwrap().kind, ErrorKind::Network);
        assert!(parse_fault("4").is_err());
        assert!(parse_fault("8=network").is_err());
        assert!(parse_fault("x=network").is_err());
        assert!(parse_fault("3=explode").is_err());
    }

    #[test]
    fn test_fault_errors_keep_their_kind() {
        for kind in [
            ErrorKind::Network,
            ErrorKind::Timeout,
            ErrorKind::NotFound,
            ErrorKind::RateLimit,
        ] {
            assert_eq!(Fault { slot_id: 1, kind }.error().kind(), kind);
        }
    }

    #[test]
    fn test_analyze_args() {
        let cli = Cli::try_parse_from([
            "copilot",
            "--card-timeout-secs",
            "3",
            "analyze",
            "aapl",
            "--json",
            "--fail",
            "4=not_found",
            "--fail",
            "6=timeout",
        ])
        .unwrap();

        assert_eq!(cli.card_timeout_secs, Some(3));
        match cli.command {
            Commands::Analyze {
                ticker,
                json,
                simulation,
            } => {
                assert_eq!(ticker, "aapl");
                assert!(json);
                assert_eq!(simulation.latency_ms, 150);
                assert_eq!(simulation.faults.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from(["copilot", "--request-timeout-secs", "90", "status"]).unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(90));

        let cli = Cli::try_parse_from(["copilot", "--card-timeout-secs", "0", "status"]).unwrap();
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_exit_code() {
        assert_eq!(exit_code(RequestStatus::PartiallySucceeded), ExitCode::SUCCESS);
        assert_eq!(exit_code(RequestStatus::Cancelled), ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn test_simulated_faults_reach_the_request() {
        let cli = Cli::try_parse_from([
            "copilot",
            "analyze",
            "aapl",
            "--latency-ms",
            "0",
            "--fail",
            "4=not_found",
        ])
        .unwrap();
        let Commands::Analyze { ref simulation, .. } = cli.command else {
            panic!("expected analyze");
        };

        let orchestrator = build_orchestrator(&cli, simulation).unwrap();
        let request = orchestrator.submit("aapl").await.unwrap();
        let done = orchestrator.wait(request.request_id).await.unwrap();

        assert_eq!(done.status, RequestStatus::Failed);
        assert_eq!(done.ready_count(), 6);
    }
}
