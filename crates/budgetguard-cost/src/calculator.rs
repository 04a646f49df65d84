// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exact cost of a completed call from provider-reported usage.

use std::sync::Arc;

use budgetguard_core::{BudgetGuardError, Tier, TokenUsage};
use serde::Serialize;

use crate::pricing::PricingTable;

/// Cost breakdown for one completed call. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostRecord {
    pub model: String,
    pub tier: Tier,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Subset of `input_tokens` billed at the cached-input price.
    pub cached_input_tokens: u32,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

/// Prices token usage against a [`PricingTable`].
#[derive(Debug, Clone)]
pub struct CostCalculator {
    pricing: Arc<PricingTable>,
}

impl CostCalculator {
    pub fn new(pricing: Arc<PricingTable>) -> Self {
        Self { pricing }
    }

    /// Cost of a completed call.
    ///
    /// Cached input tokens are billed at the cached price when the model has
    /// one and at the regular input price otherwise. Fails only when pricing
    /// data is missing.
    pub fn calculate(
        &self,
        usage: &TokenUsage,
        model: &str,
        tier: Tier,
    ) -> Result<CostRecord, BudgetGuardError> {
        let prices = self.pricing.prices(model, tier)?;

        let cached = usage.cached_input_tokens.min(usage.input_tokens);
        let uncached = usage.input_tokens - cached;
        let cached_price = prices
            .cached_input_price_per_1k
            .unwrap_or(prices.input_price_per_1k);

        let input_cost = f64::from(uncached) / 1000.0 * prices.input_price_per_1k
            + f64::from(cached) / 1000.0 * cached_price;
        let output_cost = f64::from(usage.output_tokens) / 1000.0 * prices.output_price_per_1k;

        Ok(CostRecord {
            model: prices.model,
            tier,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cached_input_tokens: cached,
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
        })
    }

    /// Total cost for plain input/output token counts.
    pub fn calculate_tokens(
        &self,
        input_tokens: u32,
        output_tokens: u32,
        model: &str,
        tier: Tier,
    ) -> Result<f64, BudgetGuardError> {
        let usage = TokenUsage::new(input_tokens, output_tokens);
        Ok(self.calculate(&usage, model, tier)?.total_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> CostCalculator {
        CostCalculator::new(Arc::new(PricingTable::embedded().unwrap()))
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    #[test]
    fn gpt_4o_mini_ten_in_twenty_out() {
        let c = calculator();
        let record = c
            .calculate(&TokenUsage::new(10, 20), "gpt-4o-mini", Tier::Standard)
            .unwrap();
        assert!(approx(record.input_cost, 0.0000015));
        assert!(approx(record.output_cost, 0.000012));
        assert!(approx(record.total_cost, 0.0000135));
        assert_eq!(record.input_tokens, 10);
        assert_eq!(record.output_tokens, 20);
    }

    #[test]
    fn zero_usage_costs_nothing() {
        let c = calculator();
        let cost = c.calculate_tokens(0, 0, "gpt-4o", Tier::Standard).unwrap();
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn cached_tokens_billed_at_cached_price() {
        let c = calculator();
        let usage = TokenUsage {
            input_tokens: 1000,
            output_tokens: 0,
            cached_input_tokens: 400,
        };
        let record = c.calculate(&usage, "gpt-4o-mini", Tier::Standard).unwrap();
        let expected = 0.6 * 0.00015 + 0.4 * 0.000075;
        assert!(approx(record.input_cost, expected));
        assert_eq!(record.cached_input_tokens, 400);
    }

    #[test]
    fn cached_count_capped_at_input() {
        let c = calculator();
        let usage = TokenUsage {
            input_tokens: 10,
            output_tokens: 0,
            cached_input_tokens: 50,
        };
        let record = c.calculate(&usage, "gpt-4o-mini", Tier::Standard).unwrap();
        assert_eq!(record.cached_input_tokens, 10);
    }

    #[test]
    fn unknown_model_is_pricing_error() {
        let c = calculator();
        let err = c.calculate_tokens(1, 1, "nope", Tier::Standard).unwrap_err();
        assert!(matches!(err, BudgetGuardError::PricingData(_)));
    }
}
