use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use debate_core::{Brevity, HumanSeat, SessionConfig, SessionOption, SessionStatus, Side};
use events::Event;
use server::config::{StudioConfig, CONFIG_FILE, STUDIO_DIR};
use server::{create_router, state::AppState};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "debate-studio")]
#[command(about = "Structured debates between AI advocates and humans", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create `.debate-studio/` with a default config and database
    Init,
    /// Start the HTTP API
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,
    },
    /// Run one debate in the terminal and stream it to stdout
    Run {
        proposition: String,

        #[arg(long, value_enum)]
        brevity: Option<BrevityArg>,

        /// Take over one advocate seat from the terminal
        #[arg(long, value_enum)]
        human: Option<SideArg>,

        /// Seconds to wait for each human turn
        #[arg(long, requires = "human")]
        deadline: Option<u64>,

        /// Skip question normalization
        #[arg(long)]
        no_normalize: bool,

        /// Print only completed turns, not streamed tokens
        #[arg(long)]
        quiet: bool,
    },
    /// List debates recorded in this directory
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum BrevityArg {
    Short,
    Standard,
    Extended,
}

impl From<BrevityArg> for Brevity {
    fn from(arg: BrevityArg) -> Self {
        match arg {
            BrevityArg::Short => Brevity::Short,
            BrevityArg::Standard => Brevity::Standard,
            BrevityArg::Extended => Brevity::Extended,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Pro,
    Con,
}

impl From<SideArg> for Side {
    fn from(arg: SideArg) -> Self {
        match arg {
            SideArg::Pro => Side::Pro,
            SideArg::Con => Side::Con,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    match cli.command {
        Some(Commands::Init) => init_project(&cwd).await,
        Some(Commands::Serve { port, host }) => serve(&cwd, port, host).await,
        Some(Commands::Run {
            proposition,
            brevity,
            human,
            deadline,
            no_normalize,
            quiet,
        }) => {
            let mut config = SessionConfig::new(proposition).with_normalize(!no_normalize);
            if let Some(brevity) = brevity {
                config = config.with_option(SessionOption::Brevity(brevity.into()));
            }
            if let Some(side) = human {
                config = config.with_human(HumanSeat {
                    side: side.into(),
                    deadline_secs: deadline,
                    on_timeout: Default::default(),
                });
            }
            run_debate(&cwd, config, quiet).await
        }
        Some(Commands::Status) => status(&cwd).await,
        None => serve(&cwd, cli.port, None).await,
    }
}

async fn init_project(cwd: &Path) -> Result<()> {
    let studio_dir = StudioConfig::studio_dir(cwd);

    if studio_dir.exists() {
        println!("Already initialized at {}", studio_dir.display());
        return Ok(());
    }

    println!("Initializing Debate Studio in {}", cwd.display());

    let config = StudioConfig::default();
    config
        .write(cwd)
        .await
        .context("Failed to write config")?;

    if let Some(database_url) = config.database_url(cwd) {
        let pool = db::create_pool(&database_url).await?;
        db::run_migrations(&pool).await?;
    }

    println!();
    println!("Created:");
    println!("  {}/", STUDIO_DIR);
    println!("  ├── {}", CONFIG_FILE);
    println!("  └── {}", config.database.path.display());
    println!();
    println!("Next steps:");
    println!("  1. Pick an agent backend in {}/{}", STUDIO_DIR, CONFIG_FILE);
    println!("  2. Run 'debate-studio serve' or 'debate-studio run \"<proposition>\"'");

    Ok(())
}

async fn serve(cwd: &Path, port: Option<u16>, host: Option<String>) -> Result<()> {
    init_tracing();

    let config = StudioConfig::read(cwd).await;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let state = AppState::from_config(&config, cwd)
        .await
        .context("Failed to initialize application state")?;
    let registry = state.registry.clone();
    let reaper_cancel = CancellationToken::new();
    let reaper = registry.spawn_reaper(config.server.reap_interval(), reaper_cancel.clone());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;

    println!();
    println!("Debate Studio");
    println!("════════════════════════════════════════");
    println!();
    println!("  API Server:  http://localhost:{}", port);
    println!("  Swagger UI:  http://localhost:{}/swagger-ui", port);
    println!("  Agents:      {}", config.agents.label());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Stopping running sessions");
    reaper_cancel.cancel();
    if let Err(e) = reaper.await {
        tracing::warn!(error = %e, "Reaper task panicked");
    }
    registry.shutdown("server shutting down").await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

async fn run_debate(cwd: &Path, session_config: SessionConfig, quiet: bool) -> Result<()> {
    init_tracing();

    let config = StudioConfig::read(cwd).await;
    let state = AppState::from_config(&config, cwd)
        .await
        .context("Failed to initialize application state")?;
    let registry = state.registry.clone();
    let interventions = state.interventions();

    let handle = registry.start(session_config).await?;
    let mut subscription = handle.subscribe(None).await?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut streaming: Option<u32> = None;

    println!("Session {}", handle.id());

    loop {
        let envelope = tokio::select! {
            envelope = subscription.next() => envelope,
            _ = tokio::signal::ctrl_c() => {
                if let Err(e) = interventions.stop(handle.id(), Some("interrupted".to_string())) {
                    tracing::warn!(error = %e, "Could not stop session");
                }
                continue;
            }
        };
        let Some(envelope) = envelope else {
            break;
        };

        match envelope.event {
            Event::SessionStarted { config } => {
                println!("Proposition: {}", config.proposition);
            }
            Event::PhaseTransition { to, .. } => {
                println!();
                println!("══ {} ══", to);
            }
            Event::TurnToken {
                speaker,
                attempt,
                token,
                ..
            } if !quiet => {
                match streaming {
                    None => print!("\n[{}] ", speaker),
                    Some(previous) if previous != attempt => {
                        print!("\n[{}] (retry {}) ", speaker, attempt)
                    }
                    Some(_) => {}
                }
                streaming = Some(attempt);
                print!("{}", token);
                std::io::stdout().flush()?;
            }
            Event::TurnComplete { utterance } => {
                if streaming.take().is_some() {
                    println!();
                } else {
                    println!("\n[{}] {}", utterance.speaker, utterance.text);
                }
                for warning in &utterance.metadata.quality {
                    println!("  ! {}: {}", warning.check, warning.message);
                }
            }
            Event::AwaitingHumanInput { request } => {
                println!();
                println!(
                    "Your turn ({}, {}), end with Enter:",
                    request.side, request.phase
                );
                if let Some(text) = stdin.next_line().await? {
                    let submitted =
                        interventions.submit_human_turn(handle.id(), Some(request.id), text);
                    if let Err(e) = submitted {
                        println!("  rejected: {}", e);
                    }
                }
            }
            Event::SessionCompleted { utterance_count } => {
                println!();
                println!("Debate completed with {} utterances", utterance_count);
            }
            Event::SessionFailed { reason, .. } => {
                println!();
                println!("Debate ended: {}", reason);
            }
            _ => {}
        }
    }

    let session = handle.wait_terminal().await;
    registry.shutdown("run finished").await;

    if session.status == SessionStatus::Failed {
        anyhow::bail!(session.error.unwrap_or_else(|| "session failed".to_string()));
    }
    Ok(())
}

async fn status(cwd: &Path) -> Result<()> {
    let studio_dir = StudioConfig::studio_dir(cwd);

    if !studio_dir.exists() {
        println!("No debates here.");
        println!("Run 'debate-studio init' to initialize.");
        return Ok(());
    }

    let config = StudioConfig::read(cwd).await;
    let Some(database_url) = config.database_url(cwd) else {
        println!("Persistence is disabled; sessions live only inside a running server.");
        return Ok(());
    };

    let db_path = studio_dir.join(&config.database.path);
    if !config.database.path.is_absolute() && !db_path.exists() {
        println!("Database not initialized.");
        return Ok(());
    }

    let pool = db::create_pool(&database_url).await?;
    let sessions = db::DebateSessionRepository::new(pool).find_all().await?;

    println!();
    println!("Path:   {}", cwd.display());
    println!("Agents: {}", config.agents.label());
    println!();

    if sessions.is_empty() {
        println!("No debates yet.");
    } else {
        println!("Debates ({}):", sessions.len());
        for session in &sessions {
            let status_icon = match session.status {
                SessionStatus::Initializing => "○",
                SessionStatus::Live => "◑",
                SessionStatus::Paused => "◐",
                SessionStatus::Completed => "●",
                SessionStatus::Failed => "✕",
            };
            println!(
                "  {} [{}] {} ({} turns, {})",
                status_icon,
                session.status,
                session.proposition(),
                session.last_sequence,
                session.phase()
            );
        }
    }

    println!();

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "debate_studio=info,server=info,orchestrator=info,tower_http=info".into()
            }),
        )
        .init();
}
