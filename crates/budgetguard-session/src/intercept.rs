// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The interception protocol wrapped around every transport call.
//!
//! Each call goes through states: Idle -> Estimated -> Reserved, then ends in
//! Succeeded, Failed, or Rejected.
//!
//! - **Admission**: estimate the cost, then reserve it on the ledger. A
//!   rejection either goes to the `on_budget_exceeded` callback (and the call
//!   returns `None`) or is returned as an error.
//! - **Settlement**: price the reported usage, commit it, evaluate warning
//!   thresholds, and apply the overrun policy.
//! - **Release**: a [`ReservationGuard`] rolls the reservation back when it is
//!   dropped unsettled, so transport errors, panics, and cancelled futures
//!   never leak reserved budget.

use std::sync::Arc;

use budgetguard_config::OverrunPolicy;
use budgetguard_core::{
    BudgetGuardError, CompletionRequest, CompletionResponse, ReservationId, Tier, TokenUsage,
    Transport,
};
use budgetguard_cost::CostRecord;
use tracing::{debug, warn};

use crate::session::{BudgetedSession, SessionInner};
use crate::stream::MeteredStream;

/// States of a single guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Nothing has happened yet.
    Idle,
    /// A cost estimate exists.
    Estimated,
    /// Budget is held for the call.
    Reserved,
    /// The call completed and its cost was committed.
    Succeeded,
    /// The call failed or was abandoned; the reservation was released.
    Failed,
    /// Admission was refused; the transport was never called.
    Rejected,
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallState::Idle => write!(f, "idle"),
            CallState::Estimated => write!(f, "estimated"),
            CallState::Reserved => write!(f, "reserved"),
            CallState::Succeeded => write!(f, "succeeded"),
            CallState::Failed => write!(f, "failed"),
            CallState::Rejected => write!(f, "rejected"),
        }
    }
}

/// Result of a guarded call: a full response or a metered stream.
pub enum GuardedResponse {
    Complete(CompletionResponse),
    Stream(MeteredStream),
}

impl GuardedResponse {
    pub fn into_complete(self) -> Option<CompletionResponse> {
        match self {
            GuardedResponse::Complete(response) => Some(response),
            GuardedResponse::Stream(_) => None,
        }
    }

    pub fn into_stream(self) -> Option<MeteredStream> {
        match self {
            GuardedResponse::Stream(stream) => Some(stream),
            GuardedResponse::Complete(_) => None,
        }
    }
}

impl std::fmt::Debug for GuardedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardedResponse::Complete(response) => {
                f.debug_tuple("Complete").field(response).finish()
            }
            GuardedResponse::Stream(stream) => f.debug_tuple("Stream").field(stream).finish(),
        }
    }
}

/// Holds a reservation until it is settled.
///
/// Dropping an unsettled guard rolls the reservation back.
pub(crate) struct ReservationGuard {
    session: Arc<SessionInner>,
    id: Option<ReservationId>,
    model: String,
    tier: Tier,
}

impl ReservationGuard {
    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn id(&self) -> Option<&ReservationId> {
        self.id.as_ref()
    }

    /// Price `usage`, commit it, and run the post-commit checks.
    ///
    /// If pricing fails the guard is dropped and the reservation released.
    pub(crate) fn settle(mut self, usage: &TokenUsage) -> Result<CostRecord, BudgetGuardError> {
        let session = Arc::clone(&self.session);
        let record = session.calculator.calculate(usage, &self.model, self.tier)?;

        let id = self.id.take().ok_or_else(|| {
            BudgetGuardError::Internal("reservation already settled".to_string())
        })?;
        let settlement = session.ledger.commit(&id, record.total_cost)?;

        debug!(
            state = %CallState::Succeeded,
            reservation_id = %id,
            model = %record.model,
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            cached_input_tokens = record.cached_input_tokens,
            cost_usd = record.total_cost,
            "call settled"
        );
        if settlement.overran() {
            debug!(
                reservation_id = %id,
                reserved = settlement.reserved,
                actual = settlement.actual,
                "call cost more than its reservation"
            );
        }

        session.after_commit(record.total_cost)?;
        Ok(record)
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id.take()
            && self.session.ledger.rollback(&id)
        {
            debug!(
                state = %CallState::Failed,
                reservation_id = %id,
                model = %self.model,
                "unsettled reservation released"
            );
        }
    }
}

impl std::fmt::Debug for ReservationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationGuard")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("tier", &self.tier)
            .finish()
    }
}

impl SessionInner {
    /// Post-commit checks: warning thresholds, then the overrun policy.
    pub(crate) fn after_commit(&self, actual_cost: f64) -> Result<(), BudgetGuardError> {
        let summary = self.ledger.snapshot();
        self.notifier.evaluate(&summary);

        if summary.spent > summary.budget {
            match self.overrun_policy {
                OverrunPolicy::Ignore => {}
                OverrunPolicy::Warn => warn!(
                    spent = summary.spent,
                    budget = summary.budget,
                    actual_cost,
                    "spend exceeds budget after settlement"
                ),
                OverrunPolicy::Fail => {
                    return Err(BudgetGuardError::Overrun {
                        spent: summary.spent,
                        budget: summary.budget,
                        actual_cost,
                        response: None,
                    });
                }
            }
        }
        Ok(())
    }

    /// Estimate and reserve.
    ///
    /// `Ok(None)` means the call was rejected and the rejection went to the
    /// `on_budget_exceeded` callback.
    pub(crate) fn admit(
        self: &Arc<Self>,
        request: &CompletionRequest,
        tier: Tier,
    ) -> Result<Option<ReservationGuard>, BudgetGuardError> {
        let estimate = self.estimator.estimate_request(request, tier)?;
        debug!(
            state = %CallState::Estimated,
            model = %estimate.model,
            estimated_cost = estimate.total_cost,
            "call estimated"
        );

        match self.ledger.reserve(estimate.total_cost) {
            Ok(id) => {
                debug!(
                    state = %CallState::Reserved,
                    reservation_id = %id,
                    model = %estimate.model,
                    "call admitted"
                );
                Ok(Some(ReservationGuard {
                    session: Arc::clone(self),
                    id: Some(id),
                    model: estimate.model,
                    tier,
                }))
            }
            Err(err) if err.is_budget_exceeded() => {
                debug!(state = %CallState::Rejected, model = %estimate.model, "call rejected");
                match &self.on_budget_exceeded {
                    Some(callback) => {
                        callback(&err);
                        Ok(None)
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }
}

/// Non-streaming protocol.
pub(crate) async fn guarded_complete<T>(
    session: &Arc<SessionInner>,
    transport: &T,
    mut request: CompletionRequest,
    tier: Tier,
) -> Result<Option<CompletionResponse>, BudgetGuardError>
where
    T: Transport + ?Sized,
{
    request.stream = false;
    let Some(guard) = session.admit(&request, tier)? else {
        return Ok(None);
    };

    let response = match transport.complete(request).await {
        Ok(response) => response,
        Err(err) => {
            debug!(
                state = %CallState::Failed,
                transport = transport.name(),
                model = guard.model(),
                error = %err,
                "transport call failed"
            );
            drop(guard);
            return Err(err);
        }
    };

    match guard.settle(&response.usage) {
        Ok(_) => Ok(Some(response)),
        Err(BudgetGuardError::Overrun {
            spent,
            budget,
            actual_cost,
            ..
        }) => Err(BudgetGuardError::Overrun {
            spent,
            budget,
            actual_cost,
            response: Some(Box::new(response)),
        }),
        Err(err) => Err(err),
    }
}

/// Streaming protocol. Settlement happens inside the returned stream.
pub(crate) async fn guarded_stream<T>(
    session: &Arc<SessionInner>,
    transport: &T,
    mut request: CompletionRequest,
    tier: Tier,
) -> Result<Option<MeteredStream>, BudgetGuardError>
where
    T: Transport + ?Sized,
{
    request.stream = true;
    let Some(guard) = session.admit(&request, tier)? else {
        return Ok(None);
    };

    match transport.stream(request).await {
        Ok(inner) => Ok(Some(MeteredStream::new(inner, guard))),
        Err(err) => {
            debug!(
                state = %CallState::Failed,
                transport = transport.name(),
                model = guard.model(),
                error = %err,
                "transport stream failed to open"
            );
            drop(guard);
            Err(err)
        }
    }
}

/// A transport bound to a session and a pricing tier.
///
/// Created by [`BudgetedSession::wrap`] or [`BudgetedSession::wrap_with_tier`].
pub struct GuardedClient<T> {
    session: BudgetedSession,
    transport: T,
    tier: Tier,
}

impl<T: Transport> GuardedClient<T> {
    pub(crate) fn new(session: BudgetedSession, transport: T, tier: Tier) -> Self {
        Self {
            session,
            transport,
            tier,
        }
    }

    pub fn session(&self) -> &BudgetedSession {
        &self.session
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.transport
    }

    /// Guarded non-streaming call.
    pub async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<Option<CompletionResponse>, BudgetGuardError> {
        guarded_complete(self.session.inner(), &self.transport, request, self.tier).await
    }

    /// Guarded streaming call.
    pub async fn stream(
        &self,
        request: CompletionRequest,
    ) -> Result<Option<MeteredStream>, BudgetGuardError> {
        guarded_stream(self.session.inner(), &self.transport, request, self.tier).await
    }

    /// Guarded call, streaming or not depending on `request.stream`.
    pub async fn call(
        &self,
        request: CompletionRequest,
    ) -> Result<Option<GuardedResponse>, BudgetGuardError> {
        if request.stream {
            Ok(self.stream(request).await?.map(GuardedResponse::Stream))
        } else {
            Ok(self.complete(request).await?.map(GuardedResponse::Complete))
        }
    }
}

impl<T> std::fmt::Debug for GuardedClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedClient")
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}
