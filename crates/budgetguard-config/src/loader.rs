// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./budgetguard.toml` > `~/.config/budgetguard/budgetguard.toml`
//! > `/etc/budgetguard/budgetguard.toml` with environment variable overrides via
//! the `BUDGETGUARD_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::GuardConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/budgetguard/budgetguard.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "budgetguard.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "BUDGETGUARD_";

/// `~/.config/budgetguard/budgetguard.toml` or platform equivalent.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("budgetguard").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/budgetguard/budgetguard.toml` (system-wide)
/// 3. `~/.config/budgetguard/budgetguard.toml` (user XDG config)
/// 4. `./budgetguard.toml` (local directory)
/// 5. `BUDGETGUARD_*` environment variables
pub fn load_config() -> Result<GuardConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<GuardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GuardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<GuardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GuardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Config files in merge order, lowest precedence first.
pub fn config_files() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from(SYSTEM_CONFIG_PATH)];
    files.extend(user_config_path());
    files.push(PathBuf::from(LOCAL_CONFIG_FILE));
    files
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    config_files()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(GuardConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// All keys are top-level, so `BUDGETGUARD_BUDGET_USD` maps to `budget_usd`
/// without any splitting.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX)
}
