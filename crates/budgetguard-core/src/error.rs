// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Budgetguard workspace.

use thiserror::Error;

use crate::types::CompletionResponse;

/// The primary error type used across the ledger, pricing, and interception layers.
#[derive(Debug, Error)]
pub enum BudgetGuardError {
    /// A reservation was refused because the estimate exceeds the remaining budget.
    ///
    /// Raised before any transport call is made.
    #[error(
        "estimated cost ${estimated_cost:.6} would exceed remaining budget ${remaining:.6}"
    )]
    BudgetExceeded {
        /// The rejected estimate in USD.
        estimated_cost: f64,
        /// Remaining capacity at the moment of rejection in USD.
        remaining: f64,
    },

    /// Pricing data is missing, unknown, or malformed. Not retryable.
    #[error("pricing data error: {0}")]
    PricingData(String),

    /// The underlying transport call failed.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A commit referenced a reservation that does not exist (double commit,
    /// or commit after rollback).
    #[error("reservation {id} not found")]
    InvalidReservation { id: String },

    /// A monetary amount was negative or not finite.
    #[error("invalid {field}: {value}")]
    InvalidAmount { field: &'static str, value: f64 },

    /// Recorded spend went past the budget after settlement and the session
    /// is configured to fail on overrun.
    #[error("spend ${spent:.6} exceeds budget ${budget:.6} after settling a ${actual_cost:.6} call")]
    Overrun {
        spent: f64,
        budget: f64,
        actual_cost: f64,
        /// The already-billed response of a non-streaming call. Streams have
        /// delivered their chunks by the time this is raised.
        response: Option<Box<CompletionResponse>>,
    },

    /// Configuration errors (invalid values, unreadable files).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BudgetGuardError {
    /// Build a transport error from any error value.
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this is an admission rejection.
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, Self::BudgetExceeded { .. })
    }

    /// The paid-for response carried by an `Overrun` error.
    pub fn into_overrun_response(self) -> Option<CompletionResponse> {
        match self {
            Self::Overrun { response, .. } => response.map(|r| *r),
            _ => None,
        }
    }

    /// Whether retrying the same request later could succeed.
    ///
    /// Budget rejections may clear once in-flight calls settle; transport
    /// failures are left to the caller's retry policy. Everything else needs
    /// a configuration or code fix.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BudgetExceeded { .. } | Self::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_exceeded_message_carries_amounts() {
        let err = BudgetGuardError::BudgetExceeded {
            estimated_cost: 5.0,
            remaining: 3.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("5.000000"), "got: {msg}");
        assert!(msg.contains("3.000000"), "got: {msg}");
        assert!(err.is_budget_exceeded());
        assert!(err.is_retryable());
    }

    #[test]
    fn transport_helper_keeps_source() {
        let err = BudgetGuardError::transport("upstream 500", std::io::Error::other("boom"));
        match &err {
            BudgetGuardError::Transport { message, source } => {
                assert_eq!(message, "upstream 500");
                assert!(source.is_some());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn pricing_errors_are_not_retryable() {
        let err = BudgetGuardError::PricingData("unknown model".into());
        assert!(!err.is_retryable());
        assert!(!err.is_budget_exceeded());
    }

    #[test]
    fn overrun_response_is_recoverable() {
        let err = BudgetGuardError::Overrun {
            spent: 2.0,
            budget: 1.0,
            actual_cost: 1.5,
            response: Some(Box::new(CompletionResponse {
                id: "resp-1".to_string(),
                model: "gpt-4o-mini".to_string(),
                content: "paid for".to_string(),
                stop_reason: None,
                usage: crate::types::TokenUsage::new(10, 20),
            })),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.into_overrun_response().unwrap().content, "paid for");
        assert!(
            BudgetGuardError::Internal("x".into())
                .into_overrun_response()
                .is_none()
        );
    }
}
