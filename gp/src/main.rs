//! gp - workout plan assistant client
//!
//! CLI entry point for chatting with the assistant and building plans.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use gymplan::cli::{Cli, Command, DocsCommand, HistoryCommand, SessionCommand};
use gymplan::codec::{calendar_file_name, decode_plan, encode_calendar};
use gymplan::config::Config;
use gymplan::import::{self, ImportError};
use gymplan::repl::{ChatRepl, PlanRepl, output_path, write_export};
use gymplan::service::{DocumentClient, HttpPlanService, PlanService};
use gymplan::session::{FileIdentityStore, IdentityStore, SessionChannel, WsConnector};
use gymplan::workflow::PlanWorkflow;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gymplan")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(log_dir.join("gymplan.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(base_url = %config.service.base_url, "gp loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Chat { new } => {
            debug!(new, "main: matched Chat command");
            cmd_chat(&config, new).await
        }
        Command::Plan { import } => {
            debug!(?import, "main: matched Plan command");
            cmd_plan(&config, import.as_deref()).await
        }
        Command::Calendar { plan, out } => {
            debug!(plan = %plan.display(), ?out, "main: matched Calendar command");
            cmd_calendar(&plan, out.as_deref())
        }
        Command::History { command } => {
            debug!(?command, "main: matched History command");
            cmd_history(&config, command).await
        }
        Command::Session { command } => {
            debug!(?command, "main: matched Session command");
            cmd_session(&config, command)
        }
        Command::Docs { command } => {
            debug!(?command, "main: matched Docs command");
            cmd_docs(&config, command).await
        }
    }
}

fn identity_store(config: &Config) -> Arc<FileIdentityStore> {
    Arc::new(FileIdentityStore::new(config.storage.session_file()))
}

fn http_service(config: &Config) -> Result<HttpPlanService> {
    HttpPlanService::from_config(&config.service).context("Failed to create service client")
}

/// Interactive chat
async fn cmd_chat(config: &Config, fresh: bool) -> Result<()> {
    debug!(fresh, "cmd_chat: called");
    let service: Arc<dyn PlanService> = Arc::new(http_service(config)?);
    let channel = SessionChannel::new(&config.service.chat_url, Arc::new(WsConnector), identity_store(config));
    ChatRepl::new(channel, service).run(fresh).await
}

/// Interactive plan builder
async fn cmd_plan(config: &Config, import: Option<&Path>) -> Result<()> {
    debug!(?import, "cmd_plan: called");
    let service: Arc<dyn PlanService> = Arc::new(http_service(config)?);
    let workflow = PlanWorkflow::new(service, config.notices.insight_ttl());
    PlanRepl::new(workflow, identity_store(config))?.run(import).await
}

/// Offline calendar export of a plan file
fn cmd_calendar(plan_path: &Path, out: Option<&Path>) -> Result<()> {
    debug!(plan = %plan_path.display(), ?out, "cmd_calendar: called");
    let raw = fs::read_to_string(plan_path).context(format!("Failed to read {}", plan_path.display()))?;
    let document = decode_plan(&raw).context("Failed to import workout plan")?;
    let ics = encode_calendar(&document.plan, &document.profile.name, Local::now().date_naive());

    let out = out.map(|p| p.to_string_lossy().into_owned());
    let path = output_path(out.as_deref(), &calendar_file_name(&document.profile.name));
    write_export(&path, &ics)?;
    println!("Saved {}", path.display());
    Ok(())
}

/// Stored chat history on the service
async fn cmd_history(config: &Config, command: HistoryCommand) -> Result<()> {
    debug!(?command, "cmd_history: called");
    let service = http_service(config)?;
    let stored = identity_store(config).get();

    match command {
        HistoryCommand::Show { session } => {
            let session_id = session.or(stored);
            match import::fetch_transcript(&service, session_id.as_deref()).await {
                Ok(entries) => {
                    println!("{}", import::format_transcript(&entries));
                    Ok(())
                }
                Err(ImportError::EmptyHistory) => {
                    println!("No chat history found for the current session.");
                    Ok(())
                }
                Err(e) => Err(eyre!(e.user_message())),
            }
        }
        HistoryCommand::Clear { session } => {
            let session_id = session
                .or(stored)
                .ok_or_else(|| eyre!(ImportError::NoSession.to_string()))?;
            service
                .clear_history(&session_id)
                .await
                .map_err(|e| eyre!(e.user_message()))?;
            println!("Chat history cleared for session {}", session_id);
            Ok(())
        }
    }
}

/// Local session identity
fn cmd_session(config: &Config, command: SessionCommand) -> Result<()> {
    debug!(?command, "cmd_session: called");
    let store = identity_store(config);
    match command {
        SessionCommand::Show => {
            match store.get() {
                Some(id) => println!("{}", id),
                None => println!("No active chat session"),
            }
            Ok(())
        }
        SessionCommand::Reset => {
            store.clear()?;
            println!("Session identity cleared");
            Ok(())
        }
    }
}

/// Reference documents on the service
async fn cmd_docs(config: &Config, command: DocsCommand) -> Result<()> {
    debug!(?command, "cmd_docs: called");
    let documents = DocumentClient::new(http_service(config)?);
    match command {
        DocsCommand::List => {
            let names = documents.list().await.map_err(|e| eyre!(e.user_message()))?;
            if names.is_empty() {
                println!("{}", "No documents uploaded.".dimmed());
            }
            for name in names {
                println!("{}", name);
            }
        }
        DocsCommand::Upload { file } => {
            let message = documents.upload(&file).await.map_err(|e| eyre!(e.user_message()))?;
            println!("{}", if message.is_empty() { "Uploaded".to_string() } else { message });
        }
        DocsCommand::Delete { name } => {
            let message = documents.delete(&name).await.map_err(|e| eyre!(e.user_message()))?;
            println!("{}", if message.is_empty() { "Deleted".to_string() } else { message });
        }
    }
    Ok(())
}
