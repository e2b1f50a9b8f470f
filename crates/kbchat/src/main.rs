// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! kbchat - administration CLI for the conversation store.

mod doctor;
mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kbchat_config::model::KbchatConfig;
use kbchat_core::{ConversationListFilter, KbchatError, Pagination, StorageAdapter};
use kbchat_storage::SqliteConversationStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// kbchat - inspect and maintain the conversation store.
#[derive(Parser, Debug)]
#[command(name = "kbchat", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database or bring its schema up to date.
    Migrate,
    /// Run diagnostic checks against configuration and database.
    Doctor,
    /// Conversation counts for the last 24 hours.
    Stats {
        #[arg(long)]
        kb_id: String,
    },
    /// List conversations, newest first.
    List {
        #[arg(long)]
        kb_id: String,
        #[arg(long)]
        app_id: Option<String>,
        /// Case-insensitive substring of the subject.
        #[arg(long)]
        subject: Option<String>,
        /// Case-insensitive substring of the client address.
        #[arg(long)]
        remote_ip: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        per_page: Option<u32>,
    },
    /// Show one conversation with its messages and references.
    Show { id: String },
}

fn load_config(
    path: Option<&PathBuf>,
) -> Result<KbchatConfig, Vec<kbchat_config::ConfigError>> {
    match path {
        Some(p) => kbchat_config::load_and_validate_path(p),
        None => kbchat_config::load_and_validate(),
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "kbchat={log_level},kbchat_storage={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Cancel outstanding store work on Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling");
            trigger.cancel();
        }
    });
    token
}

async fn open_store(config: &KbchatConfig) -> Result<SqliteConversationStore, KbchatError> {
    let store = SqliteConversationStore::new(config.storage.clone());
    store.initialize().await?;
    Ok(store.with_cancellation(cancel_on_interrupt()))
}

async fn run(cli: Cli, config: KbchatConfig, config_errors: usize) -> Result<(), KbchatError> {
    match cli.command {
        Commands::Migrate => doctor::run_migrate(&config, cli.json).await,
        Commands::Doctor => doctor::run_doctor(&config, config_errors, cli.json, cli.plain).await,
        Commands::Stats { kb_id } => {
            let store = open_store(&config).await?;
            report::run_stats(&store, &kb_id, cli.json).await?;
            store.close().await
        }
        Commands::List {
            kb_id,
            app_id,
            subject,
            remote_ip,
            page,
            per_page,
        } => {
            let filter = ConversationListFilter {
                kb_id,
                app_id,
                subject,
                remote_ip,
                pagination: Pagination::new(page, config.listing.clamp_page_size(per_page)),
            };
            let store = open_store(&config).await?;
            report::run_list(&store, &filter, cli.json).await?;
            store.close().await
        }
        Commands::Show { id } => {
            let store = open_store(&config).await?;
            report::run_show(&store, &id, cli.json).await?;
            store.close().await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let (config, config_errors) = match load_config(cli.config.as_ref()) {
        Ok(config) => (config, 0),
        // Doctor reports configuration problems itself.
        Err(errors) if matches!(cli.command, Commands::Doctor) => {
            kbchat_config::render_errors(&errors);
            (KbchatConfig::default(), errors.len())
        }
        Err(errors) => {
            kbchat_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    if let Err(e) = run(cli, config, config_errors).await {
        error!(kind = %e.kind(), "command failed");
        eprintln!("kbchat: {e}");
        std::process::exit(1);
    }
}
