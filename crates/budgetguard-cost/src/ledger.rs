// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget ledger with atomic reserve/commit/rollback.
//!
//! The ledger holds `{budget, spent, reserved}` plus a map of outstanding
//! reservations behind a single mutex. Admission happens in [`BudgetLedger::reserve`]:
//! the remaining capacity check and the reservation itself run in one critical
//! section, so `spent + reserved <= budget` holds after every successful
//! reservation no matter how many callers race.
//!
//! Settlement is not re-checked against the budget. A commit whose actual cost
//! exceeds its reservation records the real spend, which may push `spent`
//! past the budget; callers decide how to react.
//!
//! The lock is a blocking `std::sync::Mutex` held for O(1) work only. It is
//! never held across an await point, so it is safe to use from async code and
//! from `Drop` implementations.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use budgetguard_core::{BudgetGuardError, ReservationId};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct LedgerState {
    spent: f64,
    reserved: f64,
    reservations: HashMap<ReservationId, f64>,
}

/// Thread-safe account of a fixed budget.
#[derive(Debug)]
pub struct BudgetLedger {
    budget: f64,
    state: Mutex<LedgerState>,
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub id: ReservationId,
    /// Amount that was held for the call.
    pub reserved: f64,
    /// Amount recorded as spent.
    pub actual: f64,
}

impl Settlement {
    /// Whether the call cost more than was reserved for it.
    pub fn overran(&self) -> bool {
        self.actual > self.reserved
    }
}

/// Point-in-time view of the ledger, taken under one lock acquisition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub budget: f64,
    pub spent: f64,
    pub reserved: f64,
    pub remaining: f64,
    /// `(spent + reserved) / budget * 100`, or 0 for a zero budget.
    pub utilization_percent: f64,
}

fn check_amount(field: &'static str, value: f64) -> Result<(), BudgetGuardError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(BudgetGuardError::InvalidAmount { field, value })
    }
}

impl BudgetLedger {
    /// Create a ledger with a fixed budget in USD.
    ///
    /// A zero budget is allowed and admits only zero-cost reservations.
    pub fn new(budget: f64) -> Result<Self, BudgetGuardError> {
        check_amount("budget", budget)?;
        Ok(Self {
            budget,
            state: Mutex::new(LedgerState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("budget ledger mutex poisoned, recovering state");
            poisoned.into_inner()
        })
    }

    /// Reserve `estimated_cost` against the remaining budget.
    ///
    /// Fails with [`BudgetGuardError::BudgetExceeded`] and leaves the ledger
    /// untouched when the estimate does not fit.
    pub fn reserve(&self, estimated_cost: f64) -> Result<ReservationId, BudgetGuardError> {
        check_amount("estimated_cost", estimated_cost)?;

        let mut state = self.lock();
        let remaining = self.budget - state.spent - state.reserved;
        if estimated_cost > remaining {
            drop(state);
            warn!(
                estimated_cost,
                remaining,
                budget = self.budget,
                "reservation rejected: budget exceeded"
            );
            return Err(BudgetGuardError::BudgetExceeded {
                estimated_cost,
                remaining,
            });
        }

        let id = ReservationId::new();
        state.reserved += estimated_cost;
        state.reservations.insert(id.clone(), estimated_cost);
        let reserved = state.reserved;
        drop(state);

        debug!(
            reservation_id = %id,
            amount = estimated_cost,
            reserved,
            "budget reserved"
        );
        Ok(id)
    }

    /// Settle a reservation with its actual cost.
    ///
    /// The reservation is released and `actual_cost` is added to spend. There
    /// is no budget re-check. Unknown or already-settled ids fail with
    /// [`BudgetGuardError::InvalidReservation`].
    pub fn commit(
        &self,
        id: &ReservationId,
        actual_cost: f64,
    ) -> Result<Settlement, BudgetGuardError> {
        check_amount("actual_cost", actual_cost)?;

        let mut state = self.lock();
        let Some(reserved) = state.reservations.remove(id) else {
            return Err(BudgetGuardError::InvalidReservation { id: id.to_string() });
        };
        release(&mut state, reserved);
        state.spent += actual_cost;
        let spent = state.spent;
        drop(state);

        info!(
            reservation_id = %id,
            reserved,
            actual_cost,
            spent,
            budget = self.budget,
            "reservation committed"
        );
        Ok(Settlement {
            id: id.clone(),
            reserved,
            actual: actual_cost,
        })
    }

    /// Release a reservation without recording spend.
    ///
    /// Unknown ids are ignored, so calling this after a commit is harmless.
    /// Returns `true` when something was released.
    pub fn rollback(&self, id: &ReservationId) -> bool {
        let mut state = self.lock();
        let Some(amount) = state.reservations.remove(id) else {
            return false;
        };
        release(&mut state, amount);
        drop(state);

        debug!(reservation_id = %id, amount, "reservation rolled back");
        true
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn spent(&self) -> f64 {
        self.lock().spent
    }

    pub fn reserved(&self) -> f64 {
        self.lock().reserved
    }

    /// `budget - spent - reserved`. Negative after an overrun.
    pub fn remaining(&self) -> f64 {
        let state = self.lock();
        self.budget - state.spent - state.reserved
    }

    /// Number of unsettled reservations.
    pub fn outstanding(&self) -> usize {
        self.lock().reservations.len()
    }

    pub fn snapshot(&self) -> BudgetSummary {
        let state = self.lock();
        let (spent, reserved) = (state.spent, state.reserved);
        drop(state);

        let utilization_percent = if self.budget > 0.0 {
            (spent + reserved) / self.budget * 100.0
        } else {
            0.0
        };
        BudgetSummary {
            budget: self.budget,
            spent,
            reserved,
            remaining: self.budget - spent - reserved,
            utilization_percent,
        }
    }

    /// Zero spend and drop all reservations. The budget is kept.
    ///
    /// Not meant to be called with calls in flight: their later commits fail
    /// with `InvalidReservation` and their spend is lost.
    pub fn reset(&self) {
        let mut state = self.lock();
        let dropped = state.reservations.len();
        *state = LedgerState::default();
        drop(state);

        if dropped > 0 {
            warn!(dropped, "ledger reset with outstanding reservations");
        } else {
            debug!("ledger reset");
        }
    }
}

fn release(state: &mut LedgerState, amount: f64) {
    state.reserved -= amount;
    if state.reservations.is_empty() {
        // Clear accumulated float drift once nothing is held.
        state.reserved = 0.0;
    }
}
