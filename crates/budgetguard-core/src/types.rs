// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the pricing, ledger, and interception layers.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque identifier for a single budget reservation.
///
/// A fresh UUID v4 is minted for every call attempt and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(pub String);

impl ReservationId {
    /// Mint a new unique reservation id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pricing mode affecting per-token rates for the same model.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    /// Regular synchronous pricing.
    #[default]
    Standard,
    /// Batch API pricing, conventionally a 50% discount.
    Batch,
}

/// A single chat message in a prospective request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role label ("system", "user", "assistant", "tool").
    pub role: String,
    /// Plain-text content of the message.
    pub content: String,
    /// Optional participant name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    /// Attach a participant name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The call arguments extracted from a vendor SDK call surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier as the caller wrote it (may be an alias or dated variant).
    pub model: String,
    /// Conversation payload.
    pub messages: Vec<Message>,
    /// Output token cap, if the caller set one.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Whether the caller asked for an incremental response.
    #[serde(default)]
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            stream: false,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Token usage reported by a completed call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens, including any cached ones.
    pub input_tokens: u32,
    /// Completion tokens (including hidden reasoning tokens where billed).
    pub output_tokens: u32,
    /// Portion of `input_tokens` served from the provider's prompt cache.
    #[serde(default)]
    pub cached_input_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cached_input_tokens: 0,
        }
    }
}

/// A complete (non-streaming) response from a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Provider-assigned response id.
    pub id: String,
    /// Model that served the call, as reported by the provider.
    pub model: String,
    /// Generated text.
    pub content: String,
    /// Stop reason reported by the provider.
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Token usage for billing.
    pub usage: TokenUsage,
}

/// Kind of an incremental stream element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum StreamEventType {
    /// Opening event. May carry input-token usage.
    MessageStart,
    /// Incremental content.
    ContentDelta,
    /// Message-level delta. Usually carries the final usage totals.
    MessageDelta,
    /// The message is complete.
    MessageStop,
}

/// A single element of a streaming response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub event_type: StreamEventType,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl StreamChunk {
    pub fn start(usage: Option<TokenUsage>) -> Self {
        Self {
            event_type: StreamEventType::MessageStart,
            text: None,
            usage,
            stop_reason: None,
        }
    }

    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::ContentDelta,
            text: Some(text.into()),
            usage: None,
            stop_reason: None,
        }
    }

    /// A message delta carrying final usage totals.
    pub fn usage(usage: TokenUsage, stop_reason: Option<String>) -> Self {
        Self {
            event_type: StreamEventType::MessageDelta,
            text: None,
            usage: Some(usage),
            stop_reason,
        }
    }

    pub fn stop() -> Self {
        Self {
            event_type: StreamEventType::MessageStop,
            text: None,
            usage: None,
            stop_reason: None,
        }
    }
}
