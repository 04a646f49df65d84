// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost accounting for Budgetguard.
//!
//! This crate provides:
//! - **Pricing**: per-model, per-tier prices with alias and versioned-name resolution
//! - **Token counting**: heuristic and tiktoken-backed counters
//! - **Estimator / calculator**: pre-call upper bounds and post-call exact costs
//! - **Ledger**: the atomic reserve/commit/rollback account
//! - **Warnings**: utilization thresholds that fire once per session

pub mod calculator;
pub mod estimator;
pub mod ledger;
pub mod pricing;
pub mod tokens;
pub mod warning;

pub use calculator::{CostCalculator, CostRecord};
pub use estimator::{CostEstimate, CostEstimator, REASONING_OUTPUT_MULTIPLIER};
pub use ledger::{BudgetLedger, BudgetSummary, Settlement};
pub use pricing::{PricingTable, ResolvedPricing};
pub use tokens::{HeuristicCounter, TiktokenCounter, TokenCounter, TokenEncoding};
pub use warning::{BudgetWarning, DEFAULT_WARNING_THRESHOLDS, WarningCallback, WarningNotifier};
