// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Utilization threshold warnings.
//!
//! Each configured threshold fires at most once until [`WarningNotifier::reset`].
//! Firing always emits a `tracing::warn!` event; an optional callback receives
//! a [`BudgetWarning`] per newly crossed threshold, invoked after the
//! notifier lock is released.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::warn;

use crate::ledger::BudgetSummary;

/// Thresholds used when none are configured, in percent.
pub const DEFAULT_WARNING_THRESHOLDS: [u32; 3] = [30, 80, 95];

/// Payload handed to the warning callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetWarning {
    /// Threshold that was crossed, in percent.
    pub threshold: u32,
    pub spent: f64,
    pub remaining: f64,
    pub budget: f64,
    pub utilization_percent: f64,
}

/// Callback invoked once per newly crossed threshold.
pub type WarningCallback = Arc<dyn Fn(&BudgetWarning) + Send + Sync>;

/// Tracks which thresholds have fired.
pub struct WarningNotifier {
    thresholds: Vec<u32>,
    fired: Mutex<BTreeSet<u32>>,
    callback: Option<WarningCallback>,
}

impl WarningNotifier {
    /// Thresholds are sorted and deduplicated.
    pub fn new(thresholds: impl IntoIterator<Item = u32>) -> Self {
        let set: BTreeSet<u32> = thresholds.into_iter().collect();
        Self {
            thresholds: set.into_iter().collect(),
            fired: Mutex::new(BTreeSet::new()),
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: WarningCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn thresholds(&self) -> &[u32] {
        &self.thresholds
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<u32>> {
        self.fired.lock().unwrap_or_else(|poisoned| {
            warn!("warning notifier mutex poisoned, recovering state");
            poisoned.into_inner()
        })
    }

    /// Thresholds fired so far, ascending.
    pub fn fired(&self) -> Vec<u32> {
        self.lock().iter().copied().collect()
    }

    /// Check a ledger snapshot and fire any newly crossed thresholds.
    ///
    /// Returns the warnings fired by this call. Zero budgets never fire.
    pub fn evaluate(&self, summary: &BudgetSummary) -> Vec<BudgetWarning> {
        if summary.budget <= 0.0 {
            return Vec::new();
        }
        let utilization = (summary.spent + summary.reserved) / summary.budget * 100.0;

        let newly_fired: Vec<u32> = {
            let mut fired = self.lock();
            self.thresholds
                .iter()
                .copied()
                .filter(|t| utilization >= f64::from(*t) && fired.insert(*t))
                .collect()
        };

        let warnings: Vec<BudgetWarning> = newly_fired
            .into_iter()
            .map(|threshold| BudgetWarning {
                threshold,
                spent: summary.spent,
                remaining: summary.remaining,
                budget: summary.budget,
                utilization_percent: utilization,
            })
            .collect();

        for warning in &warnings {
            warn!(
                threshold = warning.threshold,
                utilization_percent = warning.utilization_percent,
                spent = warning.spent,
                remaining = warning.remaining,
                budget = warning.budget,
                "budget utilization threshold crossed"
            );
            if let Some(callback) = &self.callback {
                callback(warning);
            }
        }

        warnings
    }

    /// Forget fired thresholds so they can fire again.
    pub fn reset(&self) {
        self.lock().clear();
    }
}

impl Default for WarningNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_WARNING_THRESHOLDS)
    }
}

impl std::fmt::Debug for WarningNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarningNotifier")
            .field("thresholds", &self.thresholds)
            .field("fired", &self.fired())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn summary(budget: f64, spent: f64, reserved: f64) -> BudgetSummary {
        BudgetSummary {
            budget,
            spent,
            reserved,
            remaining: budget - spent - reserved,
            utilization_percent: if budget > 0.0 {
                (spent + reserved) / budget * 100.0
            } else {
                0.0
            },
        }
    }

    #[test]
    fn thresholds_sorted_and_deduplicated() {
        let n = WarningNotifier::new([95, 30, 80, 30]);
        assert_eq!(n.thresholds(), &[30, 80, 95]);
        assert_eq!(WarningNotifier::default().thresholds(), &DEFAULT_WARNING_THRESHOLDS);
    }

    #[test]
    fn threshold_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let n = WarningNotifier::new([80]).with_callback(Arc::new(move |w| {
            assert_eq!(w.threshold, 80);
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(n.evaluate(&summary(10.0, 7.0, 0.0)).is_empty());
        assert_eq!(n.evaluate(&summary(10.0, 8.5, 0.0)).len(), 1);
        assert!(n.evaluate(&summary(10.0, 9.0, 0.0)).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(n.fired(), vec![80]);
    }

    #[test]
    fn one_jump_fires_every_crossed_threshold() {
        let n = WarningNotifier::default();
        let fired = n.evaluate(&summary(1.0, 0.96, 0.0));
        let thresholds: Vec<u32> = fired.iter().map(|w| w.threshold).collect();
        assert_eq!(thresholds, vec![30, 80, 95]);
    }

    #[test]
    fn reserved_counts_toward_utilization() {
        let n = WarningNotifier::new([50]);
        assert_eq!(n.evaluate(&summary(10.0, 2.0, 3.0)).len(), 1);
    }

    #[test]
    fn zero_budget_never_fires() {
        let n = WarningNotifier::default();
        assert!(n.evaluate(&summary(0.0, 0.0, 0.0)).is_empty());
    }

    #[test]
    fn reset_allows_refiring() {
        let n = WarningNotifier::new([30]);
        assert_eq!(n.evaluate(&summary(1.0, 0.5, 0.0)).len(), 1);
        n.reset();
        assert!(n.fired().is_empty());
        assert_eq!(n.evaluate(&summary(1.0, 0.5, 0.0)).len(), 1);
    }

    #[test]
    fn callback_may_reenter_notifier() {
        let notifier = Arc::new(std::sync::OnceLock::<Arc<WarningNotifier>>::new());
        let handle = Arc::clone(&notifier);
        let n = Arc::new(WarningNotifier::new([10]).with_callback(Arc::new(move |_| {
            // Would deadlock if invoked while the fired-set lock is held.
            let inner = handle.get().expect("notifier set");
            assert_eq!(inner.fired(), vec![10]);
        })));
        notifier.set(Arc::clone(&n)).unwrap();
        assert_eq!(n.evaluate(&summary(1.0, 0.2, 0.0)).len(), 1);
    }

    #[tracing_test::traced_test]
    #[test]
    fn crossing_is_logged() {
        let n = WarningNotifier::new([80]);
        n.evaluate(&summary(1.0, 0.9, 0.0));
        assert!(logs_contain("budget utilization threshold crossed"));
    }
}
