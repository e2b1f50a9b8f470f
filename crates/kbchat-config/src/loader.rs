// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./kbchat.toml` > `~/.config/kbchat/kbchat.toml` >
//! `/etc/kbchat/kbchat.toml`, with environment variable overrides via the
//! `KBCHAT_` prefix.

// figment::Error is external and cannot be boxed without a wrapper.
#![allow(clippy::result_large_err)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::KbchatConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/kbchat/kbchat.toml` (system-wide)
/// 3. `~/.config/kbchat/kbchat.toml` (user XDG config)
/// 4. `./kbchat.toml` (local directory)
/// 5. `KBCHAT_*` environment variables
pub fn load_config() -> Result<KbchatConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<KbchatConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KbchatConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
///
/// Unlike the hierarchy files, an explicit path must exist.
pub fn load_config_from_path(path: &Path) -> Result<KbchatConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KbchatConfig::default()))
        .merge(Toml::file_exact(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(KbchatConfig::default()))
        .merge(Toml::file("/etc/kbchat/kbchat.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("kbchat/kbchat.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("kbchat.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `KBCHAT_STORAGE_DATABASE_PATH` must map to
/// `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("KBCHAT_").map(|key| {
        // `key` keeps the env var's case with the prefix stripped.
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = key_str
            .replacen("storage_", "storage.", 1)
            .replacen("logging_", "logging.", 1)
            .replacen("listing_", "listing.", 1);
        mapped.into()
    })
}
