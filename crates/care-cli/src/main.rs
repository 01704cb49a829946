// ============================================================================
// student-care - command-line support companion for students
// ============================================================================
// Usage:
//   student-care                       Identify, then chat (persistent)
//   student-care chat --stateless      Chat without identification or history
//   student-care stats [--json]        Show record counts per collection
//   student-care history <contact>     Show a student's last exchange
// ============================================================================

use anyhow::Result;
use care_core::session::PERSISTENT_BANNER;
use care_core::{
    store, CareConfig, CareStore, HistoryStore, OllamaClient, Persistence, PersonaResponder, Session,
    SessionEnd, StoreBackend, UserRegistry,
};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Student mental-health support companion
#[derive(Parser)]
#[command(name = "student-care", version, about = "Chat with a student mental-health support companion")]
struct Cli {
    /// Store backend: qdrant or local (default: $CARE_STORE or qdrant)
    #[arg(long, global = true)]
    backend: Option<StoreBackend>,

    /// Qdrant gRPC URL (default: $QDRANT_URL or http://localhost:6334)
    #[arg(long, global = true)]
    qdrant_url: Option<String>,

    /// Path to the local database file (default: ~/.student-care/care.redb)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Ollama server URL (default: $OLLAMA_URL or http://localhost:11434)
    #[arg(long, global = true)]
    ollama_url: Option<String>,

    /// Chat model name (default: $CARE_MODEL or llama3.2-vision:11b)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Model request timeout in seconds (default: none)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session (the default)
    Chat {
        /// Skip identification and do not record history
        #[arg(long)]
        stateless: bool,
    },

    /// Show record counts for users and chat history
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a student's most recent exchange and the follow-up it produces
    History {
        /// Phone number or email of the student
        contact: String,

        /// Look back this many days
        #[arg(long, default_value = "30")]
        days: i64,
    },
}

impl Cli {
    fn config(&self) -> CareConfig {
        let mut config = CareConfig::default();
        if let Some(backend) = self.backend {
            config.store.backend = backend;
        }
        if let Some(url) = &self.qdrant_url {
            config.store.qdrant_url = url.clone();
        }
        if let Some(path) = &self.db_path {
            config.store.db_path = Some(path.clone());
        }
        if let Some(url) = &self.ollama_url {
            config.model.base_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.model.model = model.clone();
        }
        if self.timeout.is_some() {
            config.model.timeout_secs = self.timeout;
        }
        config
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("student_care={}", level).parse()?)
                .add_directive(format!("care_core={}", level).parse()?),
        )
        .init();

    Ok(())
}

fn connection_failed_message(backend: StoreBackend) -> &'static str {
    match backend {
        StoreBackend::Qdrant => "Qdrant connection failed. Please try again later.",
        StoreBackend::Local => "Local database could not be opened. Please try again later.",
    }
}

/// Connect to the configured store, printing the failure message on error
async fn open_store(config: &CareConfig) -> Option<Arc<dyn CareStore>> {
    match store::connect(&config.store).await {
        Ok(store) => Some(store),
        Err(e) => {
            error!("Store connection failed: {}", e);
            println!("{}", connection_failed_message(config.store.backend));
            None
        }
    }
}

/// Longest look-back accepted by `history --days`
const MAX_HISTORY_DAYS: i64 = 36_500;

fn check_history_days(days: i64) -> Result<()> {
    if !(1..=MAX_HISTORY_DAYS).contains(&days) {
        anyhow::bail!("--days must be between 1 and {}, got {}", MAX_HISTORY_DAYS, days);
    }
    Ok(())
}

fn format_timestamp(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", ts))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }

    let config = cli.config();
    match cli.command.unwrap_or(Commands::Chat { stateless: false }) {
        Commands::Chat { stateless } => cmd_chat(&config, stateless).await,
        Commands::Stats { json } => cmd_stats(&config, json).await,
        Commands::History { contact, days } => cmd_history(&config, &contact, days).await,
    }
}

async fn cmd_chat(config: &CareConfig, stateless: bool) -> Result<()> {
    let model = OllamaClient::new(&config.model)?;
    info!("Using model {} at {}", model.model(), model.base_url());
    let responder = PersonaResponder::new(Arc::new(model));

    let persistence = if stateless {
        None
    } else {
        // Banner precedes the connection attempt
        println!("{}", PERSISTENT_BANNER);
        let Some(store) = open_store(config).await else {
            return Ok(());
        };
        Some(Persistence {
            registry: UserRegistry::new(store.clone()),
            history: HistoryStore::new(store, &config.history),
        })
    };

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let end = Session::new(responder, persistence, input, std::io::stdout())
        .without_banner(!stateless)
        .run()
        .await?;

    if end == SessionEnd::EndOfInput {
        println!();
    }
    debug!("Session ended: {:?}", end);
    Ok(())
}

async fn cmd_stats(config: &CareConfig, json: bool) -> Result<()> {
    let Some(store) = open_store(config).await else {
        return Ok(());
    };
    let stats = store.stats().await?;

    if json {
        let report = serde_json::json!({
            "generated_at": Utc::now().to_rfc3339(),
            "backend": store.backend_name(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== student-care Store Stats ===");
    println!("Backend:      {}", store.backend_name());
    println!();
    println!("{:13} {}", config.store.user_collection, stats.users);
    println!("{:13} {}", config.store.chat_collection, stats.chat_entries);

    Ok(())
}

async fn cmd_history(config: &CareConfig, contact: &str, days: i64) -> Result<()> {
    check_history_days(days)?;

    let Some(store) = open_store(config).await else {
        return Ok(());
    };

    let registry = UserRegistry::new(store.clone());
    let Some(user) = registry.identify(contact).await? else {
        println!("No user found for {}.", contact);
        return Ok(());
    };

    let history_config = care_core::HistoryConfig { window_days: days };
    let history = HistoryStore::new(store, &history_config);

    println!("User:   {} ({})", user.name, user.id);
    match history.last_within_window(user.id).await {
        Some(entry) => {
            println!("Last:   {}", format_timestamp(entry.created_at));
            println!("Input:  {}", entry.user_input);
            println!("Reply:  {}", entry.bot_response);
            match care_core::follow_up::follow_up_question(Some(&entry)) {
                Some(question) => println!("Follow-up: {}", question),
                None => println!("Follow-up: (none)"),
            }
        }
        None => println!("No conversation in the last {} days.", days),
    }

    Ok(())
}
