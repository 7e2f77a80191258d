//! relsync CLI tool
//!
//! Command-line interface for reconciling title → edition relations in a sqlite repository.
//!
//! ## Commands
//!
//! - `init`: Create the database and write a default configuration file
//! - `plan <parent> [--json]`: Print the work items for a parent without changing anything
//! - `run [<parent>...] [--all] [--json]`: Reconcile parents and report the outcome

use clap::{Parser, Subcommand};
use relsync_core::{
    config::{load_config, write_config, MaintainerConfig, DEFAULT_CONFIG_FILE},
    db::{db_init, DbConnection},
    event::RelationEvent,
    maintainer::RelationMaintainer,
    properties::Pid,
};
use std::{path::PathBuf, process::ExitCode};

#[derive(Parser)]
#[command(name = "relsync")]
#[command(author, version, about = "Keep isPartOf relations in sync with the search index", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Show what a run would change for a parent record
    Plan {
        /// Pid of the parent (title) record
        parent: String,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reconcile parent records
    Run {
        /// Pids of the parent (title) records
        parents: Vec<String>,

        /// Reconcile every title record in the database
        #[arg(short, long)]
        all: bool,

        /// Print every applied change
        #[arg(short, long)]
        verbose: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Commands::Init { force } => {
            let config = if cli.config.exists() && !force {
                println!("Using existing configuration {:?}", cli.config);
                load_config(&cli.config)?
            } else {
                let config = MaintainerConfig::default();
                write_config(&cli.config, &config)?;
                println!("Wrote default configuration to {:?}", cli.config);
                config
            };
            runtime.block_on(db_init(&config.database.path))?;
            println!("Database ready at {:?}", config.database.path);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Plan { parent, json } => {
            let config = load_config(&cli.config)?;
            runtime.block_on(async {
                let db = connect(&config).await?;
                let maintainer = RelationMaintainer::new(&db, &db, &config)?;
                let plan = maintainer.plan(&Pid::new(parent)).await?;
                if json {
                    println!("{}", plan.to_json()?);
                    return Ok(ExitCode::SUCCESS);
                }
                println!("Parent:   {}", plan.parent);
                println!("Criteria: {}", plan.criteria);
                println!("Wanted:   {}", plan.wanted.len());
                println!("Linked:   {}", plan.current.len());
                if plan.items.is_empty() {
                    println!("Nothing to do");
                }
                for item in plan.items.iter() {
                    println!("  {item}");
                }
                Ok::<ExitCode, Box<dyn std::error::Error>>(ExitCode::SUCCESS)
            })
        }
        Commands::Run {
            parents,
            all,
            verbose,
            json,
        } => {
            let config = load_config(&cli.config)?;
            runtime.block_on(async {
                let db = connect(&config).await?;
                let mut parents = parents.into_iter().map(Pid::new).collect::<Vec<_>>();
                if all {
                    parents.extend(db.title_records(&config.metadata.datastream).await?);
                }
                if parents.is_empty() {
                    eprintln!("No parent records given (pass pids or --all)");
                    return Ok(ExitCode::FAILURE);
                }

                let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<RelationEvent>();
                let printer = tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        if verbose && !json {
                            println!("  {event}");
                        }
                    }
                });

                let maintainer = RelationMaintainer::new(&db, &db, &config)?.with_events(tx);
                let report = maintainer.maintain_all(parents).await;
                drop(maintainer);
                printer.await?;

                let code = if report.contains_failures() {
                    ExitCode::FAILURE
                } else {
                    ExitCode::SUCCESS
                };
                if json {
                    println!("{}", report.to_json()?);
                    return Ok(code);
                }
                for (parent, outcome) in report.parents.iter() {
                    match outcome {
                        Ok(r) if r.is_complete() => println!(
                            "✓ {}: {} added, {} removed",
                            parent,
                            r.added.len(),
                            r.removed.len()
                        ),
                        Ok(r) => {
                            println!(
                                "✗ {}: {} added, {} removed, {} failed",
                                parent,
                                r.added.len(),
                                r.removed.len(),
                                r.failures.len()
                            );
                            for failure in r.failures.iter() {
                                println!("    {failure}");
                            }
                        }
                        Err(e) => println!("✗ {parent}: {e}"),
                    }
                }

                Ok::<ExitCode, Box<dyn std::error::Error>>(code)
            })
        }
    }
}

async fn connect(config: &MaintainerConfig) -> Result<DbConnection, Box<dyn std::error::Error>> {
    let pool = db_init(&config.database.path).await?;
    Ok(DbConnection::new(pool, config.relation.uri_prefix.clone()))
}
