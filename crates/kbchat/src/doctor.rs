// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kbchat doctor` and `kbchat migrate`.
//!
//! Doctor runs read-only diagnostics against the configured database; migrate
//! opens the database, which applies any pending schema migrations.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use kbchat_config::model::KbchatConfig;
use kbchat_core::{HealthStatus, KbchatError, StorageAdapter};
use kbchat_storage::{Database, SqliteConversationStore};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u128(d.as_millis())
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run every check and print a report.
///
/// `config_errors` carries the diagnostics from loading configuration, so a
/// broken config is reported instead of aborting the command.
pub async fn run_doctor(
    config: &KbchatConfig,
    config_errors: usize,
    json: bool,
    plain: bool,
) -> Result<(), KbchatError> {
    let mut results = vec![check_config(config_errors)];
    let (database, db) = check_database(config).await;
    results.push(database);
    if let Some(store) = db {
        results.push(check_integrity(&store).await);
        results.push(check_journal_mode(&store, config.storage.wal_mode).await);
        results.push(check_schema(&store).await);
        store.close().await?;
    }

    if json {
        let out = serde_json::to_string_pretty(&results)
            .map_err(|e| KbchatError::Internal(e.to_string()))?;
        println!("{out}");
        return Ok(());
    }

    let use_color = !plain && std::io::stdout().is_terminal();
    println!();
    println!("  kbchat doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", render_line(result, use_color));
    }
    println!();

    let issues = results
        .iter()
        .filter(|r| r.status != CheckStatus::Pass)
        .count();
    match issues {
        0 => println!("  All checks passed."),
        1 => println!("  1 issue found."),
        n => println!("  {n} issues found."),
    }
    println!();
    Ok(())
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    let ms = result.duration.as_millis();
    if !use_color {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        return format!("    {tag} {:<20} {} ({ms}ms)", result.name, result.message);
    }

    use colored::Colorize;
    let (symbol, message) = match result.status {
        CheckStatus::Pass => ("✓".green(), result.message.normal()),
        CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
        CheckStatus::Fail => ("✗".red(), result.message.red()),
    };
    format!("    {symbol} {:<20} {message} ({ms}ms)", result.name)
}

fn check_config(errors: usize) -> CheckResult {
    let start = Instant::now();
    if errors == 0 {
        CheckResult::new("Configuration", CheckStatus::Pass, "valid", start)
    } else {
        CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{errors} error(s), defaults used"),
            start,
        )
    }
}

/// Open the store without creating a missing database file.
async fn check_database(config: &KbchatConfig) -> (CheckResult, Option<SqliteConversationStore>) {
    let start = Instant::now();
    let path = &config.storage.database_path;
    if !Path::new(path).exists() {
        return (
            CheckResult::new(
                "Database",
                CheckStatus::Warn,
                format!("not found: {path} (run `kbchat migrate` to create it)"),
                start,
            ),
            None,
        );
    }

    let store = SqliteConversationStore::new(config.storage.clone());
    match store.initialize().await {
        Ok(()) => (
            CheckResult::new("Database", CheckStatus::Pass, "connected", start),
            Some(store),
        ),
        Err(e) => (
            CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start),
            None,
        ),
    }
}

async fn check_integrity(store: &SqliteConversationStore) -> CheckResult {
    let start = Instant::now();
    match store.health_check().await {
        Ok(HealthStatus::Healthy) => CheckResult::new("Integrity", CheckStatus::Pass, "ok", start),
        Ok(HealthStatus::Degraded(detail)) => {
            CheckResult::new("Integrity", CheckStatus::Warn, detail, start)
        }
        Ok(HealthStatus::Unhealthy(detail)) => {
            CheckResult::new("Integrity", CheckStatus::Fail, detail, start)
        }
        Err(e) => CheckResult::new("Integrity", CheckStatus::Fail, e.to_string(), start),
    }
}

async fn check_journal_mode(store: &SqliteConversationStore, want_wal: bool) -> CheckResult {
    let start = Instant::now();
    let mode = match store.db() {
        Ok(db) => {
            db.call(|conn| conn.query_row("PRAGMA journal_mode", [], |r| r.get::<_, String>(0)))
                .await
        }
        Err(e) => Err(e),
    };
    match mode {
        Ok(mode) if want_wal && !mode.eq_ignore_ascii_case("wal") => CheckResult::new(
            "Journal mode",
            CheckStatus::Warn,
            format!("{mode} (WAL requested)"),
            start,
        ),
        Ok(mode) => CheckResult::new("Journal mode", CheckStatus::Pass, mode, start),
        Err(e) => CheckResult::new("Journal mode", CheckStatus::Fail, e.to_string(), start),
    }
}

async fn check_schema(store: &SqliteConversationStore) -> CheckResult {
    let start = Instant::now();
    let version = match store.db() {
        Ok(db) => schema_version(&db).await,
        Err(e) => Err(e),
    };
    match version {
        Ok(Some(v)) => CheckResult::new("Schema", CheckStatus::Pass, format!("version {v}"), start),
        Ok(None) => CheckResult::new("Schema", CheckStatus::Fail, "no migrations applied", start),
        Err(e) => CheckResult::new("Schema", CheckStatus::Fail, e.to_string(), start),
    }
}

/// Highest applied migration version, if any.
pub async fn schema_version(db: &Database) -> Result<Option<i64>, KbchatError> {
    db.call(|conn| {
        conn.query_row(
            "SELECT MAX(version) FROM refinery_schema_history",
            [],
            |r| r.get::<_, Option<i64>>(0),
        )
    })
    .await
}

/// Run `kbchat migrate`.
pub async fn run_migrate(config: &KbchatConfig, json: bool) -> Result<(), KbchatError> {
    let db = Database::open_with_config(&config.storage).await?;
    let version = schema_version(&db).await?;
    db.close().await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "database_path": config.storage.database_path,
                "schema_version": version,
            })
        );
    } else {
        println!(
            "kbchat: schema at version {} in {}",
            version.unwrap_or_default(),
            config.storage.database_path
        );
    }
    Ok(())
}
