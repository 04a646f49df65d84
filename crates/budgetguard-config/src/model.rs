// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model for a budget-guarded session.
//!
//! The struct uses `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use budgetguard_core::Tier;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Default warning thresholds, in percent of the budget.
pub const DEFAULT_WARNING_THRESHOLDS: [u32; 3] = [30, 80, 95];

/// Session configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with `BUDGETGUARD_*`
/// environment variable overrides. Every key except `budget_usd` has a default.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Hard spending ceiling in USD. Required, must be positive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_usd: Option<f64>,

    /// Pricing tier applied to every call unless a client overrides it.
    #[serde(default)]
    pub tier: Tier,

    /// Utilization percentages that trigger a warning, each at most once.
    #[serde(default = "default_warning_thresholds")]
    pub warning_thresholds: Vec<u32>,

    /// JSON pricing table replacing the built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_file: Option<PathBuf>,

    /// What to do when a settled call pushes spend past the budget.
    #[serde(default)]
    pub overrun_policy: OverrunPolicy,

    /// Token counter used for pre-call estimates.
    #[serde(default)]
    pub token_counter: TokenCounterKind,

    /// Level for the embedding application's `tracing` subscriber (trace,
    /// debug, info, warn, error). Usable as an `EnvFilter` directive; the
    /// budgetguard crates never install a subscriber themselves.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            budget_usd: None,
            tier: Tier::default(),
            warning_thresholds: default_warning_thresholds(),
            pricing_file: None,
            overrun_policy: OverrunPolicy::default(),
            token_counter: TokenCounterKind::default(),
            log_level: default_log_level(),
        }
    }
}

impl GuardConfig {
    /// Config with the given budget and defaults for everything else.
    pub fn with_budget(budget_usd: f64) -> Self {
        Self {
            budget_usd: Some(budget_usd),
            ..Self::default()
        }
    }

    /// Warning thresholds sorted ascending with duplicates removed.
    pub fn normalized_thresholds(&self) -> Vec<u32> {
        let mut thresholds = self.warning_thresholds.clone();
        thresholds.sort_unstable();
        thresholds.dedup();
        thresholds
    }
}

fn default_warning_thresholds() -> Vec<u32> {
    DEFAULT_WARNING_THRESHOLDS.to_vec()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Reaction to a settled call whose spend exceeds the budget.
///
/// The ledger always records the real cost; the policy only decides how
/// loudly the overrun is reported.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OverrunPolicy {
    /// Record silently.
    Ignore,
    /// Record and emit a `tracing::warn!` event.
    #[default]
    Warn,
    /// Record, then return an `Overrun` error to the caller. A non-streaming
    /// response travels inside the error, since it has been paid for.
    Fail,
}

/// Which token counter backs the estimator.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TokenCounterKind {
    /// Four characters per token, rounded up.
    #[default]
    Heuristic,
    /// BPE counting with tiktoken vocabularies.
    Tiktoken,
}
