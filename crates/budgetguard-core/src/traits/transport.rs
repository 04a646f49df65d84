// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport trait for the underlying LLM call (OpenAI, Anthropic, Gemini, ...).

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::BudgetGuardError;
use crate::types::{CompletionRequest, CompletionResponse, StreamChunk};

/// A boxed stream of response chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, BudgetGuardError>> + Send>>;

/// Capability to issue one blocking or streaming LLM call.
///
/// Implementations are thin adapters over a vendor SDK or HTTP client. They
/// never touch the budget; the interception layer wraps them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable name used in log fields.
    fn name(&self) -> &str {
        "transport"
    }

    /// Sends a completion request and returns the full response.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, BudgetGuardError>;

    /// Sends a completion request and returns a stream of response chunks.
    ///
    /// Usage may arrive on `MessageStart` (input only), as running totals on
    /// content deltas, or on a final `MessageDelta`/`MessageStop`. A stream
    /// that ends without any usage is not billed.
    async fn stream(&self, request: CompletionRequest) -> Result<ChunkStream, BudgetGuardError>;
}
