// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as a positive budget, threshold ranges, and non-empty paths.

use crate::diagnostic::ConfigError;
use crate::model::GuardConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    match config.budget_usd {
        None => errors.push(ConfigError::MissingKey {
            key: "budget_usd".to_string(),
        }),
        Some(budget) if !budget.is_finite() || budget <= 0.0 => {
            errors.push(ConfigError::Validation {
                message: format!("budget_usd must be a positive number, got {budget}"),
            });
        }
        Some(_) => {}
    }

    for threshold in &config.warning_thresholds {
        if *threshold == 0 || *threshold > 100 {
            errors.push(ConfigError::Validation {
                message: format!(
                    "warning_thresholds entries must be between 1 and 100, got {threshold}"
                ),
            });
        }
    }

    if let Some(path) = &config.pricing_file
        && path.as_os_str().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "pricing_file must not be empty".to_string(),
        });
    }

    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log_level `{}` is not one of {}",
                config.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
