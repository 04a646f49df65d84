// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic testing.
//!
//! `MockTransport` implements `Transport` with a FIFO queue of scripted
//! replies, enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::Mutex;

use budgetguard_core::{
    BudgetGuardError, ChunkStream, CompletionRequest, CompletionResponse, StreamChunk,
    TokenUsage, Transport,
};

/// Usage reported when no reply is scripted.
pub const DEFAULT_USAGE: TokenUsage = TokenUsage {
    input_tokens: 10,
    output_tokens: 20,
    cached_input_tokens: 0,
};

/// One scripted reply.
#[derive(Debug)]
pub enum MockReply {
    /// A successful call with the given text and usage.
    Complete { content: String, usage: TokenUsage },
    /// A streaming call yielding exactly these items.
    Chunks(Vec<Result<StreamChunk, BudgetGuardError>>),
    /// The call fails with a transport error.
    Fail(String),
    /// The call panics inside the transport future.
    Panic(String),
}

impl MockReply {
    pub fn complete(content: impl Into<String>, usage: TokenUsage) -> Self {
        Self::Complete {
            content: content.into(),
            usage,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }

    /// The usual start / delta / usage / stop sequence for a streamed reply.
    pub fn streamed(content: impl Into<String>, usage: TokenUsage) -> Self {
        Self::Chunks(standard_chunks(content.into(), usage))
    }
}

fn standard_chunks(content: String, usage: TokenUsage) -> Vec<Result<StreamChunk, BudgetGuardError>> {
    vec![
        Ok(StreamChunk::start(None)),
        Ok(StreamChunk::delta(content)),
        Ok(StreamChunk::usage(usage, Some("stop".to_string()))),
        Ok(StreamChunk::stop()),
    ]
}

/// A transport that returns scripted replies.
///
/// Replies are popped from a FIFO queue shared by `complete` and `stream`.
/// When the queue is empty, a "mock response" reply with [`DEFAULT_USAGE`]
/// is returned.
#[derive(Clone)]
pub struct MockTransport {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    /// Pre-load the reply queue.
    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        let transport = Self::new();
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            ..transport
        }
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a reply to the end of the queue.
    pub async fn push(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Number of calls that reached the transport.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in order.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_reply(&self, request: CompletionRequest) -> MockReply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockReply::complete("mock response", DEFAULT_USAGE))
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn scripted_failure(message: String) -> BudgetGuardError {
    BudgetGuardError::transport(message, std::io::Error::other("mock transport failure"))
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, BudgetGuardError> {
        let model = request.model.clone();
        match self.next_reply(request).await {
            MockReply::Complete { content, usage } => Ok(CompletionResponse {
                id: format!("mock-resp-{}", uuid::Uuid::new_v4()),
                model,
                content,
                stop_reason: Some("stop".to_string()),
                usage,
            }),
            MockReply::Chunks(_) => Err(BudgetGuardError::Internal(
                "streamed reply scripted for a non-streaming call".to_string(),
            )),
            MockReply::Fail(message) => Err(scripted_failure(message)),
            MockReply::Panic(message) => panic!("{message}"),
        }
    }

    async fn stream(&self, request: CompletionRequest) -> Result<ChunkStream, BudgetGuardError> {
        let chunks = match self.next_reply(request).await {
            MockReply::Complete { content, usage } => standard_chunks(content, usage),
            MockReply::Chunks(chunks) => chunks,
            MockReply::Fail(message) => return Err(scripted_failure(message)),
            MockReply::Panic(message) => panic!("{message}"),
        };
        Ok(Box::pin(stream::iter(chunks)))
    }
}
