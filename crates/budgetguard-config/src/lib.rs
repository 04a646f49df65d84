// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for Budgetguard.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, environment variable overrides, and diagnostic
//! error rendering with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use budgetguard_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Budget: {:?}", config.budget_usd);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

use diagnostic::ConfigSource;

pub use diagnostic::{ConfigError, render_errors, render_to_string};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{GuardConfig, OverrunPolicy, TokenCounterKind};

/// Load configuration from the XDG hierarchy and validate it.
///
/// Deserialization failures become diagnostics pointing into whichever
/// config file set the offending key.
pub fn load_and_validate() -> Result<GuardConfig, Vec<ConfigError>> {
    finish(loader::load_config(), || {
        loader::config_files()
            .iter()
            .filter_map(|path| ConfigSource::read(path))
            .collect()
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<GuardConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![ConfigSource::inline(toml_content)]
    })
}

/// Load configuration from a file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<GuardConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        ConfigSource::read(path).into_iter().collect()
    })
}

/// Validate a loaded config, or turn the load failure into diagnostics.
/// Sources are only read when there is an error to point into.
fn finish(
    loaded: Result<GuardConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<ConfigSource>,
) -> Result<GuardConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}
