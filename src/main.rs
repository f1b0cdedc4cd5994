//! Krafter CLI.
//!
//! Command-line surface over the orchestration core. This layer owns
//! everything interactive (argument parsing, output formatting, the
//! confirmation prompt for destructive actions) and maps outcomes onto
//! exit codes:
//!
//! - `0` success
//! - `1` prerequisite or fatal failure
//! - `2` partial failure (some nodes formatted/unhealthy, smoke-test
//!   mismatch)
//! - `3` user-cancelled destructive action

use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;

use krafter::config::ClusterConfig;
use krafter::constants::{DEFAULT_LOG_TAIL_LINES, DEFAULT_SMOKE_MESSAGES};
use krafter::error::Error;
use krafter::groups::GroupInspector;
use krafter::orchestrator::Orchestrator;
use krafter::runner::ProcessRunner;
use krafter::telemetry::{init_logging, LogFormat};
use krafter::topics::{Confirmation, DeleteOutcome, TopicManager, TopicSpec};
use krafter::types::ClusterState;

/// KRaft cluster bootstrap and operations tool.
#[derive(Parser)]
#[command(name = "krafter", version, about = "KRaft Kafka cluster orchestrator")]
struct Cli {
    /// Compose file describing the cluster (overrides KRAFTER_COMPOSE_FILE)
    #[arg(short = 'f', long)]
    compose_file: Option<String>,

    /// Enable verbose/debug logging
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the cluster: acquire an identifier and format storage
    Init,
    /// Start all brokers and wait for the cluster to become healthy
    Start,
    /// Stop all brokers
    Stop,
    /// Stop, settle, and start all brokers
    Restart,
    /// Show per-node and cluster state
    Status,
    /// Check partition invariants (under-replicated / unavailable)
    Health,
    /// Tail one node's logs
    Logs {
        /// Node name, e.g. kafka-2
        node: String,
        /// Number of lines
        #[arg(default_value_t = DEFAULT_LOG_TAIL_LINES)]
        lines: u32,
    },
    /// Create a topic
    CreateTopic {
        name: String,
        #[arg(default_value_t = 3)]
        partitions: u32,
        #[arg(default_value_t = 3)]
        replication: u32,
    },
    /// Delete a topic (prompts for confirmation)
    DeleteTopic {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// List all topics
    ListTopics,
    /// Describe one topic
    DescribeTopic { name: String },
    /// Set one topic configuration entry
    AlterTopic {
        name: String,
        key: String,
        value: String,
    },
    /// List consumer groups
    ListGroups,
    /// Describe one consumer group
    DescribeGroup { name: String },
    /// Produce and consume test messages end to end
    SmokeTest {
        #[arg(default_value_t = DEFAULT_SMOKE_MESSAGES)]
        messages: u32,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(LogFormat::from_env(), cli.verbose) {
        eprintln!("failed to initialize logging: {}", e);
    }

    std::process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    let mut config = match ClusterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return 1;
        }
    };
    if let Some(path) = cli.compose_file {
        config.compose_file = path.into();
    }
    if let Err(violations) = config.validate() {
        for violation in &violations {
            error!(violation = %violation, "Invalid configuration");
        }
        return 1;
    }

    let config = Arc::new(config);
    let runner = Arc::new(ProcessRunner::new());
    let orchestrator = Orchestrator::new(Arc::clone(&config), runner.clone());

    // Interrupting a health wait should cancel the poll cleanly; the poll
    // then returns its last snapshot instead of leaving state ambiguous.
    let monitor = orchestrator.health_monitor();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            monitor.shutdown();
        }
    });

    match cli.command {
        Commands::Init => {
            let outcome = orchestrator.init().await;
            if let Some((id, source)) = &outcome.identity {
                println!("Cluster ID: {} ({})", id, source);
            }
            if let Some(report) = &outcome.report {
                for node in &report.nodes {
                    println!("  {}: {}", node.node, node.outcome);
                }
            }
            if let Some(failure) = &outcome.failure {
                error!(phase = %outcome.phase, error = %failure, "init failed");
            } else if !outcome.is_success() {
                error!(phase = %outcome.phase, "init finished with per-node failures");
            } else {
                println!("Initialization complete.");
            }
            outcome.exit_code()
        }
        Commands::Start => match orchestrator.start().await {
            Ok(health) => {
                print_health(&health);
                if health.is_healthy() {
                    0
                } else {
                    2
                }
            }
            Err(e) => fatal(e),
        },
        Commands::Stop => match orchestrator.stop().await {
            Ok(()) => {
                println!("Cluster stopped.");
                0
            }
            Err(e) => fatal(e),
        },
        Commands::Restart => match orchestrator.restart().await {
            Ok(health) => {
                print_health(&health);
                if health.is_healthy() {
                    0
                } else {
                    2
                }
            }
            Err(e) => fatal(e),
        },
        Commands::Status => match orchestrator.status().await {
            Ok(report) => {
                match &report.cluster_id {
                    Some(id) => println!("Cluster ID: {}", id),
                    None => println!("Cluster ID: (not initialized)"),
                }
                print_health(&report.health);
                0
            }
            Err(e) => fatal(e),
        },
        Commands::Health => match orchestrator.check_invariants().await {
            Ok(report) => {
                if report.holds() {
                    println!("All partitions fully replicated and available.");
                    0
                } else {
                    for line in &report.under_replicated {
                        println!("under-replicated: {}", line);
                    }
                    for line in &report.unavailable {
                        println!("unavailable: {}", line);
                    }
                    2
                }
            }
            Err(e) => fatal(e),
        },
        Commands::Logs { node, lines } => match orchestrator.logs(&node, lines).await {
            Ok(output) => {
                print!("{}", output);
                0
            }
            Err(e) => fatal(e),
        },
        Commands::CreateTopic {
            name,
            partitions,
            replication,
        } => {
            let topics = TopicManager::new(Arc::clone(&config), runner.clone());
            match topics
                .create(&TopicSpec::new(name.clone(), partitions, replication))
                .await
            {
                Ok(()) => {
                    println!(
                        "Created topic '{}' ({} partitions, replication {}).",
                        name, partitions, replication
                    );
                    0
                }
                Err(e) => fatal(e),
            }
        }
        Commands::DeleteTopic { name, yes } => {
            let confirmation = if yes {
                Confirmation::Confirmed
            } else {
                confirm_delete(&name)
            };
            let topics = TopicManager::new(Arc::clone(&config), runner.clone());
            match topics.delete(&name, confirmation).await {
                Ok(DeleteOutcome::Deleted) => {
                    println!("Deleted topic '{}'.", name);
                    0
                }
                Ok(DeleteOutcome::Cancelled) => {
                    println!("Cancelled; topic '{}' left untouched.", name);
                    3
                }
                Err(e) => fatal(e),
            }
        }
        Commands::ListTopics => {
            let topics = TopicManager::new(Arc::clone(&config), runner.clone());
            match topics.list().await {
                Ok(names) => {
                    for name in names {
                        println!("{}", name);
                    }
                    0
                }
                Err(e) => fatal(e),
            }
        }
        Commands::DescribeTopic { name } => {
            let topics = TopicManager::new(Arc::clone(&config), runner.clone());
            match topics.describe(&name).await {
                Ok(description) => {
                    print!("{}", description.raw);
                    0
                }
                Err(e) => fatal(e),
            }
        }
        Commands::AlterTopic { name, key, value } => {
            let topics = TopicManager::new(Arc::clone(&config), runner.clone());
            match topics.alter(&name, &key, &value).await {
                Ok(()) => {
                    println!("Set {}={} on topic '{}'.", key, value, name);
                    0
                }
                Err(e) => fatal(e),
            }
        }
        Commands::ListGroups => {
            let groups = GroupInspector::new(Arc::clone(&config), runner.clone());
            match groups.list().await {
                Ok(names) => {
                    for name in names {
                        println!("{}", name);
                    }
                    0
                }
                Err(e) => fatal(e),
            }
        }
        Commands::DescribeGroup { name } => {
            let groups = GroupInspector::new(Arc::clone(&config), runner.clone());
            match groups.describe(&name).await {
                Ok(output) => {
                    print!("{}", output);
                    0
                }
                Err(e) => fatal(e),
            }
        }
        Commands::SmokeTest { messages } => match orchestrator.smoke_test(messages).await {
            Ok(report) => {
                println!(
                    "Smoke test on '{}': sent {}, received {}.",
                    report.topic, report.sent, report.received
                );
                if report.is_success() {
                    0
                } else {
                    2
                }
            }
            Err(e) => fatal(e),
        },
    }
}

fn fatal(e: Error) -> i32 {
    error!(error = %e, "Command failed");
    e.exit_code()
}

fn print_health(health: &krafter::types::ClusterHealth) {
    println!("Cluster state: {}", health.state);
    for node in &health.nodes {
        println!("  {}: {}", node.name, node.state);
    }
    if health.state == ClusterState::Degraded {
        println!("  (metadata quorum still viable)");
    }
}

/// Ask the human. Anything but an explicit yes declines.
fn confirm_delete(name: &str) -> Confirmation {
    print!(
        "Delete topic '{}'? This cannot be undone. [y/N]: ",
        name
    );
    let _ = std::io::stdout().flush();

    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return Confirmation::Declined;
    }
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Confirmation::Confirmed,
        _ => Confirmation::Declined,
    }
}
