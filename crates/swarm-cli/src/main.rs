//! `swarm`: command-line front end for the research swarm.

mod config;
mod render;

use clap::{Parser, Subcommand, ValueEnum};
use config::SwarmConfig;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use swarm_agent::CapabilityClient;
use swarm_core::Persona;
use swarm_orchestrator::{ResearchOrchestrator, RunEvent, RunOutcome};
use swarm_session::{FileRunStore, RunStore};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "swarm", about = "Research Swarm: a team of AI personas researching a topic")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "swarm.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a research session on a topic
    Research {
        /// The research topic
        topic: String,
        /// Extra guidance passed to every persona
        #[arg(short, long)]
        instruction: Option<String>,
        /// Never pause the run to ask questions
        #[arg(long)]
        no_questions: bool,
    },
    /// Manage saved runs
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },
    /// Show the persona roster and delegation tools
    Roster,
}

#[derive(Subcommand)]
enum RunsAction {
    /// List saved runs, newest first
    List,
    /// Show a saved run
    Show {
        id: Uuid,
        #[arg(long, value_enum, default_value_t = View::Report)]
        view: View,
    },
    /// Delete a saved run
    Delete { id: Uuid },
}

#[derive(Clone, Copy, ValueEnum)]
enum View {
    Report,
    Timeline,
    Workflow,
    Delegations,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = SwarmConfig::load(&cli.config).await?;
    config.resolve_api_key(|var| std::env::var(var).ok());

    match cli.command {
        Commands::Research {
            topic,
            instruction,
            no_questions,
        } => research(config, &topic, instruction.as_deref(), no_questions).await,
        Commands::Runs { action } => runs(&config, action).await,
        Commands::Roster => {
            print!("{}", render::roster_view(&config.roster()?));
            Ok(())
        }
    }
}

async fn research(
    config: SwarmConfig,
    topic: &str,
    instruction: Option<&str>,
    no_questions: bool,
) -> anyhow::Result<()> {
    if config.capability.api_key.trim().is_empty() {
        anyhow::bail!(
            "No API key configured. Set GEMINI_API_KEY or [capability].api_key in the config file"
        );
    }

    let roster = config.roster()?;
    let mut orchestrator_config = config.orchestrator.clone();
    if no_questions {
        orchestrator_config.ask_requester = false;
    }

    let store = Arc::new(FileRunStore::new(config.runs_dir()).await?);
    let client = CapabilityClient::new(config.capability.clone());
    let orchestrator = Arc::new(ResearchOrchestrator::new(
        client,
        roster,
        orchestrator_config,
        store,
    ));

    let printer = tokio::spawn(print_events(
        BroadcastStream::new(orchestrator.subscribe()),
        orchestrator.clone(),
    ));
    let stopper = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping research");
                orchestrator.stop_research();
            }
        })
    };

    let outcome = orchestrator.start_research(topic, instruction).await;
    stopper.abort();
    let _ = printer.await;

    match outcome {
        Ok(RunOutcome::Completed { saved_id, report }) => {
            println!("\n{report}");
            eprintln!("\nSaved as run {saved_id}");
            Ok(())
        }
        Ok(RunOutcome::Stopped) => {
            eprintln!("\nResearch process manually stopped by the user.");
            Ok(())
        }
        Err(e) => {
            let message = orchestrator
                .last_failure()
                .map(|f| f.message)
                .unwrap_or_else(|| e.to_string());
            Err(anyhow::anyhow!(message))
        }
    }
}

/// Prints the run as it happens until the orchestrator reports it finished.
async fn print_events(
    mut events: BroadcastStream<RunEvent>,
    orchestrator: Arc<ResearchOrchestrator>,
) {
    let personas: Vec<Persona> = orchestrator.roster().personas().to_vec();
    let mut stdout = std::io::stdout();

    while let Some(event) = events.next().await {
        match event {
            Ok(RunEvent::LogAppended { entry }) => {
                print!("{}", render::live_entry(&entry, &personas));
            }
            Ok(RunEvent::TranscriptStarted { mode }) => println!("\n--- Live {mode} ---"),
            Ok(RunEvent::TranscriptChunk { text }) => print!("{text}"),
            Ok(RunEvent::TranscriptEnded) => println!(),
            Ok(RunEvent::QuestionAsked { .. }) => {
                let orchestrator = orchestrator.clone();
                // Detached: a stdin read left pending by a timeout must not
                // block runtime shutdown.
                let (tx, rx) = tokio::sync::oneshot::channel();
                std::thread::spawn(move || {
                    let _ = tx.send(read_answer());
                });
                tokio::spawn(async move {
                    let answer = rx.await.ok().flatten();
                    if !orchestrator.answer_checkpoint(answer) {
                        warn!("Answer arrived after the question closed");
                    }
                });
            }
            Ok(RunEvent::RunFinished) => break,
            Ok(_) => {}
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Event stream lagged");
            }
        }
        let _ = stdout.flush();
    }
}

fn read_answer() -> Option<String> {
    eprint!("Your answer (leave empty to let the team decide): ");
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()).filter(|a| !a.is_empty()),
    }
}

async fn runs(config: &SwarmConfig, action: RunsAction) -> anyhow::Result<()> {
    let store = FileRunStore::new(config.runs_dir()).await?;
    match action {
        RunsAction::List => {
            print!("{}", render::run_list(&store.list().await?));
        }
        RunsAction::Show { id, view } => {
            let run = store
                .get(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No saved run with id {id}"))?;
            println!("{} ({})\n", run.topic, run.timestamp.format("%Y-%m-%d %H:%M"));
            match view {
                View::Report => println!("{}", run.final_report),
                View::Timeline => print!("{}", render::timeline_view(&run)),
                View::Workflow => print!("{}", render::workflow_view(&run)),
                View::Delegations => print!("{}", render::delegations_view(&run)),
            }
        }
        RunsAction::Delete { id } => {
            store.delete(id).await?;
            println!("Deleted run {id}");
        }
    }
    Ok(())
}
