// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budgeted session: one ledger shared by every call made through it.
//!
//! A [`BudgetedSession`] is cheap to clone; clones share the same ledger,
//! warning state, and pricing. Build one with [`SessionBuilder`] or directly
//! from a [`GuardConfig`].

use std::sync::Arc;

use budgetguard_config::validation::validate_config;
use budgetguard_config::{GuardConfig, OverrunPolicy, TokenCounterKind};
use budgetguard_core::{BudgetGuardError, CompletionRequest, CompletionResponse, Tier, Transport};
use budgetguard_cost::{
    BudgetLedger, BudgetSummary, BudgetWarning, CostCalculator, CostEstimator,
    DEFAULT_WARNING_THRESHOLDS, HeuristicCounter, PricingTable, TiktokenCounter, TokenCounter,
    WarningCallback, WarningNotifier,
};
use tracing::info;

use crate::intercept::{GuardedClient, GuardedResponse, guarded_complete, guarded_stream};
use crate::stream::MeteredStream;

/// Receives admission rejections when configured; the call then returns `None`.
pub type BudgetExceededCallback = Arc<dyn Fn(&BudgetGuardError) + Send + Sync>;

pub(crate) struct SessionInner {
    pub(crate) ledger: BudgetLedger,
    pub(crate) estimator: CostEstimator,
    pub(crate) calculator: CostCalculator,
    pub(crate) notifier: WarningNotifier,
    pub(crate) tier: Tier,
    pub(crate) overrun_policy: OverrunPolicy,
    pub(crate) on_budget_exceeded: Option<BudgetExceededCallback>,
}

/// Enforces a hard spending ceiling across concurrent LLM calls.
#[derive(Clone)]
pub struct BudgetedSession {
    inner: Arc<SessionInner>,
}

impl BudgetedSession {
    /// Session with default settings and the built-in pricing table.
    pub fn new(budget_usd: f64) -> Result<Self, BudgetGuardError> {
        SessionBuilder::new(budget_usd).build()
    }

    pub fn builder(budget_usd: f64) -> SessionBuilder {
        SessionBuilder::new(budget_usd)
    }

    /// Validate `config` and build a session from it.
    pub fn from_config(config: &GuardConfig) -> Result<Self, BudgetGuardError> {
        SessionBuilder::from_config(config)?.build()
    }

    pub(crate) fn inner(&self) -> &Arc<SessionInner> {
        &self.inner
    }

    /// Run one call through the protocol at the session tier.
    ///
    /// Streams when `request.stream` is set. Returns `Ok(None)` when the call
    /// was rejected and an `on_budget_exceeded` callback handled it.
    pub async fn reserve_and_call<T>(
        &self,
        transport: &T,
        request: CompletionRequest,
    ) -> Result<Option<GuardedResponse>, BudgetGuardError>
    where
        T: Transport + ?Sized,
    {
        let tier = self.inner.tier;
        if request.stream {
            Ok(guarded_stream(&self.inner, transport, request, tier)
                .await?
                .map(GuardedResponse::Stream))
        } else {
            Ok(guarded_complete(&self.inner, transport, request, tier)
                .await?
                .map(GuardedResponse::Complete))
        }
    }

    /// Guarded non-streaming call.
    pub async fn complete<T>(
        &self,
        transport: &T,
        request: CompletionRequest,
    ) -> Result<Option<CompletionResponse>, BudgetGuardError>
    where
        T: Transport + ?Sized,
    {
        guarded_complete(&self.inner, transport, request, self.inner.tier).await
    }

    /// Guarded streaming call. Cost is settled while the stream is consumed.
    pub async fn stream<T>(
        &self,
        transport: &T,
        request: CompletionRequest,
    ) -> Result<Option<MeteredStream>, BudgetGuardError>
    where
        T: Transport + ?Sized,
    {
        guarded_stream(&self.inner, transport, request, self.inner.tier).await
    }

    /// Bind a transport to this session at the session tier.
    pub fn wrap<T: Transport>(&self, transport: T) -> GuardedClient<T> {
        GuardedClient::new(self.clone(), transport, self.inner.tier)
    }

    /// Bind a transport to this session with its own pricing tier.
    pub fn wrap_with_tier<T: Transport>(&self, transport: T, tier: Tier) -> GuardedClient<T> {
        GuardedClient::new(self.clone(), transport, tier)
    }

    /// Consistent snapshot of budget, spend, reservations, and utilization.
    pub fn summary(&self) -> BudgetSummary {
        self.inner.ledger.snapshot()
    }

    /// Zero spend, drop reservations, and re-arm every warning threshold.
    ///
    /// Calls still in flight will fail to commit; only reset an idle session.
    pub fn reset(&self) {
        self.inner.ledger.reset();
        self.inner.notifier.reset();
        info!(budget = self.inner.ledger.budget(), "session reset");
    }

    pub fn total_spent(&self) -> f64 {
        self.inner.ledger.spent()
    }

    pub fn remaining(&self) -> f64 {
        self.inner.ledger.remaining()
    }

    pub fn budget(&self) -> f64 {
        self.inner.ledger.budget()
    }

    pub fn reserved(&self) -> f64 {
        self.inner.ledger.reserved()
    }

    pub fn tier(&self) -> Tier {
        self.inner.tier
    }

    pub fn outstanding_reservations(&self) -> usize {
        self.inner.ledger.outstanding()
    }

    /// Warning thresholds that have fired since the last reset.
    pub fn fired_thresholds(&self) -> Vec<u32> {
        self.inner.notifier.fired()
    }

    /// The estimator, for previewing a call's cost without reserving it.
    pub fn estimator(&self) -> &CostEstimator {
        &self.inner.estimator
    }
}

impl std::fmt::Debug for BudgetedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetedSession")
            .field("summary", &self.summary())
            .field("tier", &self.inner.tier)
            .field("overrun_policy", &self.inner.overrun_policy)
            .finish_non_exhaustive()
    }
}

/// Builder for [`BudgetedSession`].
pub struct SessionBuilder {
    budget_usd: f64,
    tier: Tier,
    warning_thresholds: Vec<u32>,
    pricing: Option<PricingTable>,
    counter: Option<Arc<dyn TokenCounter>>,
    overrun_policy: OverrunPolicy,
    on_budget_exceeded: Option<BudgetExceededCallback>,
    on_warning: Option<WarningCallback>,
}

impl SessionBuilder {
    pub fn new(budget_usd: f64) -> Self {
        Self {
            budget_usd,
            tier: Tier::default(),
            warning_thresholds: DEFAULT_WARNING_THRESHOLDS.to_vec(),
            pricing: None,
            counter: None,
            overrun_policy: OverrunPolicy::default(),
            on_budget_exceeded: None,
            on_warning: None,
        }
    }

    /// Builder populated from a validated config.
    ///
    /// Loads `pricing_file` when set and constructs the configured token
    /// counter. Validation errors are joined into one `Config` error.
    pub fn from_config(config: &GuardConfig) -> Result<Self, BudgetGuardError> {
        validate_config(config).map_err(|errors| {
            BudgetGuardError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        let budget_usd = config
            .budget_usd
            .ok_or_else(|| BudgetGuardError::Config("budget_usd is required".to_string()))?;

        let mut builder = Self::new(budget_usd)
            .tier(config.tier)
            .warning_thresholds(config.normalized_thresholds())
            .overrun_policy(config.overrun_policy);

        if let Some(path) = &config.pricing_file {
            builder = builder.pricing(PricingTable::from_path(path)?);
        }

        let counter: Arc<dyn TokenCounter> = match config.token_counter {
            TokenCounterKind::Heuristic => Arc::new(HeuristicCounter),
            TokenCounterKind::Tiktoken => Arc::new(TiktokenCounter::new()?),
        };
        Ok(builder.token_counter(counter))
    }

    pub fn tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn warning_thresholds(mut self, thresholds: impl IntoIterator<Item = u32>) -> Self {
        self.warning_thresholds = thresholds.into_iter().collect();
        self
    }

    /// Replace the built-in pricing table.
    pub fn pricing(mut self, table: PricingTable) -> Self {
        self.pricing = Some(table);
        self
    }

    pub fn token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn overrun_policy(mut self, policy: OverrunPolicy) -> Self {
        self.overrun_policy = policy;
        self
    }

    /// Handle rejections here instead of returning them as errors.
    pub fn on_budget_exceeded<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BudgetGuardError) + Send + Sync + 'static,
    {
        self.on_budget_exceeded = Some(Arc::new(callback));
        self
    }

    /// Called once per newly crossed warning threshold.
    pub fn on_warning<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BudgetWarning) + Send + Sync + 'static,
    {
        self.on_warning = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> Result<BudgetedSession, BudgetGuardError> {
        let ledger = BudgetLedger::new(self.budget_usd)?;
        let pricing = Arc::new(match self.pricing {
            Some(table) => table,
            None => PricingTable::embedded()?,
        });
        let counter = self
            .counter
            .unwrap_or_else(|| Arc::new(HeuristicCounter));

        let mut notifier = WarningNotifier::new(self.warning_thresholds);
        if let Some(callback) = self.on_warning {
            notifier = notifier.with_callback(callback);
        }

        info!(
            budget_usd = self.budget_usd,
            tier = %self.tier,
            overrun_policy = %self.overrun_policy,
            thresholds = ?notifier.thresholds(),
            "budgeted session created"
        );

        Ok(BudgetedSession {
            inner: Arc::new(SessionInner {
                ledger,
                estimator: CostEstimator::new(Arc::clone(&pricing), counter),
                calculator: CostCalculator::new(pricing),
                notifier,
                tier: self.tier,
                overrun_policy: self.overrun_policy,
                on_budget_exceeded: self.on_budget_exceeded,
            }),
        })
    }
}
