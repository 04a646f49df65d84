// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Budgetguard.
//!
//! This crate provides the error type, the request/response/usage types, and
//! the [`Transport`] trait used throughout the workspace. Vendor adapters
//! implement `Transport`; the session crate wraps it with budget enforcement.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::BudgetGuardError;
pub use traits::{ChunkStream, Transport};
pub use types::{
    CompletionRequest, CompletionResponse, Message, ReservationId, StreamChunk, StreamEventType,
    Tier, TokenUsage,
};
