// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model pricing tables and model-name resolution.
//!
//! Prices are USD per 1,000 tokens, keyed by canonical model name and tier.
//! A default table covering OpenAI, Anthropic, and Google models is compiled
//! into the crate from `data/pricing.json`; callers can load their own table
//! in the same format.
//!
//! Unknown models and missing prices are hard errors, never a zero price.

use std::collections::BTreeMap;
use std::path::Path;

use budgetguard_core::{BudgetGuardError, Tier};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tokens::TokenEncoding;

/// Default pricing table shipped with the crate.
const EMBEDDED_PRICING: &str = include_str!("../data/pricing.json");

/// Output ceiling used when a model entry does not declare one.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

/// Context window used when a model entry does not declare one.
pub const DEFAULT_CONTEXT_WINDOW: u32 = 128_000;

/// Prices for one model in one tier, USD per 1,000 tokens.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TierPricing {
    #[serde(default)]
    pub input_price_per_1k: Option<f64>,
    #[serde(default)]
    pub output_price_per_1k: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_input_price_per_1k: Option<f64>,
}

/// A model entry: tier prices plus optional metadata.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelEntry {
    /// Output ceiling used for estimates when the caller sets no cap.
    #[serde(default, alias = "max_tokens", skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
    /// Marks models that bill hidden reasoning tokens as output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<bool>,
    /// Overrides the tokenizer family inferred from the model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<TokenEncoding>,
    /// Tier name ("standard", "batch") to prices.
    #[serde(flatten)]
    pub tiers: BTreeMap<String, TierPricing>,
}

/// On-disk shape of a pricing file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct PricingFile {
    #[serde(default)]
    models: BTreeMap<String, ModelEntry>,
    #[serde(default)]
    model_aliases: BTreeMap<String, String>,
}

/// Immutable pricing table with alias and versioned-name resolution.
#[derive(Debug, Clone)]
pub struct PricingTable {
    models: BTreeMap<String, ModelEntry>,
    aliases: BTreeMap<String, String>,
}

/// Prices resolved for a model/tier pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPricing {
    /// Canonical model name.
    pub model: String,
    /// Tier whose prices were used (after the standard fallback).
    pub tier: String,
    pub input_price_per_1k: f64,
    pub output_price_per_1k: f64,
    pub cached_input_price_per_1k: Option<f64>,
}

impl PricingTable {
    /// Load the default table compiled into the crate.
    pub fn embedded() -> Result<Self, BudgetGuardError> {
        Self::from_json_str(EMBEDDED_PRICING)
    }

    /// Load a table from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BudgetGuardError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BudgetGuardError::PricingData(format!(
                "failed to read pricing file {}: {e}",
                path.display()
            ))
        })?;
        let table = Self::from_json_str(&content)?;
        debug!(
            path = %path.display(),
            models = table.models.len(),
            aliases = table.aliases.len(),
            "pricing table loaded"
        );
        Ok(table)
    }

    /// Parse and validate a table from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self, BudgetGuardError> {
        let file: PricingFile = serde_json::from_str(content).map_err(|e| {
            BudgetGuardError::PricingData(format!("failed to parse pricing configuration: {e}"))
        })?;
        let table = Self {
            models: file.models,
            aliases: file.model_aliases,
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), BudgetGuardError> {
        if self.models.is_empty() {
            return Err(BudgetGuardError::PricingData(
                "pricing configuration contains no models".to_string(),
            ));
        }

        for (alias, target) in &self.aliases {
            if !self.models.contains_key(target) {
                return Err(BudgetGuardError::PricingData(format!(
                    "alias '{alias}' points at unknown model '{target}'"
                )));
            }
        }

        for (name, entry) in &self.models {
            for (tier, prices) in &entry.tiers {
                let fields = [
                    ("input_price_per_1k", prices.input_price_per_1k),
                    ("output_price_per_1k", prices.output_price_per_1k),
                    ("cached_input_price_per_1k", prices.cached_input_price_per_1k),
                ];
                for (field, value) in fields {
                    if let Some(v) = value
                        && (!v.is_finite() || v < 0.0)
                    {
                        return Err(BudgetGuardError::PricingData(format!(
                            "{field} for model '{name}' tier '{tier}' must be a non-negative number, got {v}"
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Canonical model names, sorted.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Resolve a model name, alias, or dated/versioned variant to its canonical name.
    ///
    /// Order: exact match, alias table, then trailing dash-delimited segments
    /// are stripped from the right until a known model remains
    /// (`gpt-4o-mini-2024-07-18` resolves to `gpt-4o-mini`).
    pub fn resolve(&self, name: &str) -> Result<String, BudgetGuardError> {
        if self.models.contains_key(name) {
            return Ok(name.to_string());
        }

        if let Some(target) = self.aliases.get(name) {
            return Ok(target.clone());
        }

        let mut candidate = name;
        while let Some((prefix, _)) = candidate.rsplit_once('-') {
            if self.models.contains_key(prefix) {
                return Ok(prefix.to_string());
            }
            if let Some(target) = self.aliases.get(prefix) {
                return Ok(target.clone());
            }
            candidate = prefix;
        }

        Err(BudgetGuardError::PricingData(format!(
            "model '{name}' not found in pricing configuration. Available models: {}",
            self.models.keys().cloned().collect::<Vec<_>>().join(", ")
        )))
    }

    fn entry(&self, model: &str) -> Result<(String, &ModelEntry), BudgetGuardError> {
        let canonical = self.resolve(model)?;
        let entry = self.models.get(&canonical).ok_or_else(|| {
            BudgetGuardError::PricingData(format!("model '{canonical}' has no pricing entry"))
        })?;
        Ok((canonical, entry))
    }

    /// Tier prices for a model, falling back to `standard` when the tier is absent.
    fn tier_pricing(
        &self,
        model: &str,
        tier: Tier,
    ) -> Result<(String, String, &TierPricing), BudgetGuardError> {
        let (canonical, entry) = self.entry(model)?;
        let requested = tier.to_string();
        let (tier_name, prices) = match entry.tiers.get(&requested) {
            Some(prices) => (requested, prices),
            None => {
                let standard = Tier::Standard.to_string();
                let prices = entry.tiers.get(&standard).ok_or_else(|| {
                    BudgetGuardError::PricingData(format!(
                        "no '{requested}' or '{standard}' pricing for model '{canonical}'"
                    ))
                })?;
                (standard, prices)
            }
        };
        Ok((canonical, tier_name, prices))
    }

    /// Input price per 1,000 tokens.
    ///
    /// With `cached = true`, returns the cached-input price when the model
    /// declares one and the regular input price otherwise.
    pub fn input_price(
        &self,
        model: &str,
        tier: Tier,
        cached: bool,
    ) -> Result<f64, BudgetGuardError> {
        let (canonical, tier_name, prices) = self.tier_pricing(model, tier)?;
        if cached && let Some(price) = prices.cached_input_price_per_1k {
            return Ok(price);
        }
        prices.input_price_per_1k.ok_or_else(|| {
            BudgetGuardError::PricingData(format!(
                "input price not found for model '{canonical}' tier '{tier_name}'"
            ))
        })
    }

    /// Output price per 1,000 tokens.
    pub fn output_price(&self, model: &str, tier: Tier) -> Result<f64, BudgetGuardError> {
        let (canonical, tier_name, prices) = self.tier_pricing(model, tier)?;
        prices.output_price_per_1k.ok_or_else(|| {
            BudgetGuardError::PricingData(format!(
                "output price not found for model '{canonical}' tier '{tier_name}'"
            ))
        })
    }

    /// All prices for a model/tier pair in one lookup.
    pub fn prices(&self, model: &str, tier: Tier) -> Result<ResolvedPricing, BudgetGuardError> {
        let (canonical, tier_name, prices) = self.tier_pricing(model, tier)?;
        let missing = |field: &str| {
            BudgetGuardError::PricingData(format!(
                "{field} price not found for model '{canonical}' tier '{tier_name}'"
            ))
        };
        let input = prices.input_price_per_1k.ok_or_else(|| missing("input"))?;
        let output = prices.output_price_per_1k.ok_or_else(|| missing("output"))?;
        Ok(ResolvedPricing {
            model: canonical.clone(),
            tier: tier_name.clone(),
            input_price_per_1k: input,
            output_price_per_1k: output,
            cached_input_price_per_1k: prices.cached_input_price_per_1k,
        })
    }

    /// Whether the model bills hidden reasoning tokens (o-series).
    ///
    /// Unknown models are treated as non-reasoning; pricing lookups for them
    /// fail anyway.
    pub fn is_reasoning_model(&self, model: &str) -> bool {
        match self.entry(model) {
            Ok((canonical, entry)) => entry.reasoning.unwrap_or_else(|| {
                ["o1", "o3", "o4"]
                    .iter()
                    .any(|prefix| canonical.starts_with(prefix))
            }),
            Err(_) => false,
        }
    }

    /// Maximum output tokens for a model.
    pub fn max_output_tokens(&self, model: &str) -> Result<u32, BudgetGuardError> {
        let (_, entry) = self.entry(model)?;
        Ok(entry.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS))
    }

    /// Context window size for a model.
    pub fn context_window(&self, model: &str) -> Result<u32, BudgetGuardError> {
        let (_, entry) = self.entry(model)?;
        Ok(entry.context_window.unwrap_or(DEFAULT_CONTEXT_WINDOW))
    }

    /// Tokenizer family for a model.
    pub fn encoding(&self, model: &str) -> Result<TokenEncoding, BudgetGuardError> {
        let (canonical, entry) = self.entry(model)?;
        Ok(entry
            .encoding
            .unwrap_or_else(|| TokenEncoding::for_model(&canonical)))
    }
}
