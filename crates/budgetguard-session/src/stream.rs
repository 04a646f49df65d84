// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metered wrapper around a transport's chunk stream.
//!
//! Chunks pass through unmodified. Usage on the `MessageStart` event is
//! remembered as the input count. Usage on content deltas is treated as a
//! running total: only the latest one is kept. A `MessageDelta` or
//! `MessageStop` carrying usage is terminal and settles the reservation;
//! otherwise the stream settles from the last usage seen when it ends
//! naturally. A stream dropped before either point releases its reservation.

use std::pin::Pin;
use std::task::{Context, Poll};

use budgetguard_core::{BudgetGuardError, ChunkStream, StreamChunk, StreamEventType, TokenUsage};
use budgetguard_cost::CostRecord;
use futures_core::Stream;
use tracing::debug;

use crate::intercept::ReservationGuard;

/// A chunk stream that settles its reservation from the reported usage.
pub struct MeteredStream {
    inner: ChunkStream,
    /// `None` once settled or released.
    guard: Option<ReservationGuard>,
    start_usage: Option<TokenUsage>,
    /// Latest running usage reported on a content delta.
    last_usage: Option<TokenUsage>,
    cost: Option<CostRecord>,
    /// Surfaced on the poll after the terminal chunk.
    pending_error: Option<BudgetGuardError>,
    finished: bool,
}

impl MeteredStream {
    pub(crate) fn new(inner: ChunkStream, guard: ReservationGuard) -> Self {
        Self {
            inner,
            guard: Some(guard),
            start_usage: None,
            last_usage: None,
            cost: None,
            pending_error: None,
            finished: false,
        }
    }

    /// Cost committed for this stream, once the terminal chunk has been seen.
    pub fn cost(&self) -> Option<&CostRecord> {
        self.cost.as_ref()
    }

    /// Whether the reservation is still held.
    pub fn is_pending(&self) -> bool {
        self.guard.is_some()
    }

    fn observe(&mut self, chunk: &StreamChunk) {
        let Some(usage) = chunk.usage else {
            return;
        };
        match chunk.event_type {
            StreamEventType::MessageStart => self.start_usage = Some(usage),
            StreamEventType::ContentDelta => self.last_usage = Some(usage),
            StreamEventType::MessageDelta | StreamEventType::MessageStop => self.settle(usage),
        }
    }

    fn settle(&mut self, usage: TokenUsage) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let usage = merge_usage(self.start_usage, usage);
        match guard.settle(&usage) {
            Ok(record) => self.cost = Some(record),
            Err(err) => self.pending_error = Some(err),
        }
    }

    /// Natural end of the inner stream.
    fn finish(&mut self) {
        self.finished = true;
        if self.guard.is_none() {
            return;
        }
        match self.last_usage.take() {
            Some(usage) => self.settle(usage),
            None => {
                if let Some(guard) = self.guard.take() {
                    debug!(model = guard.model(), "stream ended without usage");
                }
            }
        }
    }
}

/// Fill gaps in the terminal usage from the start event.
fn merge_usage(start: Option<TokenUsage>, terminal: TokenUsage) -> TokenUsage {
    let Some(start) = start else {
        return terminal;
    };
    TokenUsage {
        input_tokens: if terminal.input_tokens == 0 {
            start.input_tokens
        } else {
            terminal.input_tokens
        },
        output_tokens: terminal.output_tokens,
        cached_input_tokens: if terminal.cached_input_tokens == 0 {
            start.cached_input_tokens
        } else {
            terminal.cached_input_tokens
        },
    }
}

impl Stream for MeteredStream {
    type Item = Result<StreamChunk, BudgetGuardError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(err) = this.pending_error.take() {
            return Poll::Ready(Some(Err(err)));
        }
        if this.finished {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.observe(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err))),
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(this.pending_error.take().map(Err))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for MeteredStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeteredStream")
            .field("guard", &self.guard)
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}
