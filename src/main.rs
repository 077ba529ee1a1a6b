use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use cleaning_sessions::api::{self, ApiState};
use cleaning_sessions::config::EngineConfig;
use cleaning_sessions::engine::Engine;
use cleaning_sessions::session::CodeNumbering;
use cleaning_sessions::shutdown::install_shutdown_handler;
use cleaning_sessions::template::JobTemplate;

#[derive(Parser, Debug)]
#[command(name = "cleaning-sessions")]
#[command(version)]
#[command(about = "Job session scheduling and lifecycle engine")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),

    /// Expand a job template file into sessions without storing them
    Generate(GenerateArgs),
}

// =============================================================================
// Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Session counter strategy when a template is regenerated
    #[arg(long, value_enum, default_value = "restart")]
    code_numbering: NumberingArg,

    /// Maximum number of sessions kept in memory
    #[arg(long, default_value = "100000")]
    max_sessions: usize,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Path to a job template (JSON)
    template: PathBuf,

    /// Counter of the first generated session
    #[arg(long, default_value = "1")]
    first_counter: u32,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NumberingArg {
    Restart,
    Continue,
}

impl From<NumberingArg> for CodeNumbering {
    fn from(arg: NumberingArg) -> Self {
        match arg {
            NumberingArg::Restart => CodeNumbering::Restart,
            NumberingArg::Continue => CodeNumbering::Continue,
        }
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct SessionListItem {
    full_job_code: String,
    scheduled_date: String,
    scheduled_end_date: Option<String>,
    scheduled_time: Option<String>,
}

#[derive(Serialize)]
struct SessionListOutput {
    job_code: String,
    sessions: Vec<SessionListItem>,
    total_count: usize,
}

// =============================================================================
// Commands
// =============================================================================

async fn run_server(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let listen_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    let config = EngineConfig::new(listen_addr)
        .with_code_numbering(args.code_numbering.into())
        .with_max_sessions(args.max_sessions);

    tracing::info!(
        listen_addr = %config.listen_addr,
        code_numbering = %config.code_numbering,
        max_sessions = config.store.max_sessions,
        "Starting cleaning-sessions"
    );

    let shutdown = install_shutdown_handler()?;
    let engine = Arc::new(Engine::in_memory(config.clone()));
    api::serve(config.listen_addr, ApiState::new(engine), shutdown).await?;
    Ok(())
}

fn handle_generate(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let template = JobTemplate::from_json_file(&args.template)?;
    let engine = Engine::in_memory(EngineConfig::default());
    let sessions = engine.preview_sessions(&template, args.first_counter)?;

    let items: Vec<SessionListItem> = sessions
        .into_iter()
        .map(|s| SessionListItem {
            full_job_code: s.full_job_code,
            scheduled_date: s.scheduled_date.to_string(),
            scheduled_end_date: s.scheduled_end_date.map(|d| d.to_string()),
            scheduled_time: s.scheduled_time.map(|t| t.format("%H:%M").to_string()),
        })
        .collect();

    match args.output {
        OutputFormat::Json => {
            let output = SessionListOutput {
                job_code: template.job_code,
                total_count: items.len(),
                sessions: items,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No sessions generated.");
            } else {
                println!("{:<20} {:<12} {:<12} TIME", "CODE", "DATE", "END DATE");
                println!("{}", "-".repeat(52));
                for item in &items {
                    println!(
                        "{:<20} {:<12} {:<12} {}",
                        item.full_job_code,
                        item.scheduled_date,
                        item.scheduled_end_date.as_deref().unwrap_or("-"),
                        item.scheduled_time.as_deref().unwrap_or("-"),
                    );
                }
                println!();
                println!("{} session(s)", items.len());
            }
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Serve(serve_args) => run_server(serve_args).await?,
        Commands::Generate(generate_args) => handle_generate(generate_args)?,
    }

    Ok(())
}
