// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pre-call cost estimation.
//!
//! Estimates are deliberately pessimistic. Input tokens come from the
//! configured [`TokenCounter`]; output tokens are the caller's cap, or the
//! model's output ceiling when no cap is set. Reasoning models bill hidden
//! tokens as output, so their output estimate is multiplied by
//! [`REASONING_OUTPUT_MULTIPLIER`].
//!
//! The estimate only under-shoots when the counter under-counts the prompt,
//! or when the provider bills more output than the cap (times the reasoning
//! multiplier) allows.

use std::sync::Arc;

use budgetguard_core::{BudgetGuardError, CompletionRequest, Message, Tier};
use serde::Serialize;
use tracing::debug;

use crate::pricing::PricingTable;
use crate::tokens::TokenCounter;

/// Output inflation applied to reasoning models.
pub const REASONING_OUTPUT_MULTIPLIER: u32 = 4;

/// A conservative cost estimate with its breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    /// Canonical model name.
    pub model: String,
    pub tier: Tier,
    pub input_tokens: u32,
    /// Output tokens after the reasoning multiplier.
    pub output_tokens: u32,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub input_price_per_1k: f64,
    pub output_price_per_1k: f64,
    pub is_reasoning_model: bool,
}

/// Produces upper-bound cost estimates for prospective requests.
#[derive(Clone)]
pub struct CostEstimator {
    pricing: Arc<PricingTable>,
    counter: Arc<dyn TokenCounter>,
}

impl CostEstimator {
    pub fn new(pricing: Arc<PricingTable>, counter: Arc<dyn TokenCounter>) -> Self {
        Self { pricing, counter }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Estimate the cost of sending `messages` to `model`.
    pub fn estimate(
        &self,
        model: &str,
        messages: &[Message],
        max_output_tokens: Option<u32>,
        tier: Tier,
    ) -> Result<CostEstimate, BudgetGuardError> {
        let prices = self.pricing.prices(model, tier)?;
        let encoding = self.pricing.encoding(model)?;

        let input_tokens = u32::try_from(self.counter.count_messages(encoding, messages))
            .unwrap_or(u32::MAX);

        let base_output = match max_output_tokens {
            Some(cap) => cap,
            None => self.pricing.max_output_tokens(model)?,
        };
        let is_reasoning_model = self.pricing.is_reasoning_model(model);
        let output_tokens = if is_reasoning_model {
            base_output.saturating_mul(REASONING_OUTPUT_MULTIPLIER)
        } else {
            base_output
        };

        let input_cost = f64::from(input_tokens) / 1000.0 * prices.input_price_per_1k;
        let output_cost = f64::from(output_tokens) / 1000.0 * prices.output_price_per_1k;
        let total_cost = input_cost + output_cost;

        debug!(
            model = %prices.model,
            tier = %tier,
            input_tokens,
            output_tokens,
            is_reasoning_model,
            estimated_cost = total_cost,
            "cost estimated"
        );

        Ok(CostEstimate {
            model: prices.model,
            tier,
            input_tokens,
            output_tokens,
            input_cost,
            output_cost,
            total_cost,
            input_price_per_1k: prices.input_price_per_1k,
            output_price_per_1k: prices.output_price_per_1k,
            is_reasoning_model,
        })
    }

    /// Estimate a full request using its model, messages, and output cap.
    pub fn estimate_request(
        &self,
        request: &CompletionRequest,
        tier: Tier,
    ) -> Result<CostEstimate, BudgetGuardError> {
        self.estimate(&request.model, &request.messages, request.max_tokens, tier)
    }
}

impl std::fmt::Debug for CostEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostEstimator")
            .field("pricing", &self.pricing)
            .finish_non_exhaustive()
    }
}
