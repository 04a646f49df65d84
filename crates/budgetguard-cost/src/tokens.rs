// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pluggable token counting for pre-call estimates.
//!
//! Two counters ship with the crate:
//! - [`HeuristicCounter`]: ~4 characters per token, rounded up. No vocabulary
//!   files, works for every provider.
//! - [`TiktokenCounter`]: BPE counting with the OpenAI `o200k_base` /
//!   `cl100k_base` encodings via `tiktoken-rs`.

use budgetguard_core::{BudgetGuardError, Message};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tiktoken_rs::CoreBPE;

/// Per-message formatting overhead (role label, separators).
pub const TOKENS_PER_MESSAGE: usize = 3;

/// Extra token when a message carries a `name` field.
pub const TOKENS_PER_NAME: usize = 1;

/// Every reply is primed with an assistant header.
pub const REPLY_PRIMING_TOKENS: usize = 3;

const CHARS_PER_TOKEN: usize = 4;

/// Tokenizer family a model uses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TokenEncoding {
    /// GPT-5, GPT-4.1, GPT-4o, o-series, and the default for non-OpenAI models.
    O200kBase,
    /// GPT-4 and GPT-3.5.
    Cl100kBase,
}

impl TokenEncoding {
    /// Infer the encoding from a canonical model name.
    pub fn for_model(model: &str) -> Self {
        const O200K: [&str; 6] = ["gpt-5", "gpt-4.1", "gpt-4o", "o1", "o3", "o4"];
        const CL100K: [&str; 2] = ["gpt-4", "gpt-3.5"];

        if O200K.iter().any(|p| model.starts_with(p)) {
            Self::O200kBase
        } else if CL100K.iter().any(|p| model.starts_with(p)) {
            Self::Cl100kBase
        } else {
            Self::O200kBase
        }
    }
}

/// Counts tokens for cost estimation.
pub trait TokenCounter: Send + Sync {
    /// Tokens in a plain text string.
    fn count_text(&self, encoding: TokenEncoding, text: &str) -> usize;

    /// Tokens in a message list, including formatting overhead.
    fn count_messages(&self, encoding: TokenEncoding, messages: &[Message]) -> usize {
        let mut total = 0;
        for message in messages {
            total += TOKENS_PER_MESSAGE;
            total += self.count_text(encoding, &message.role);
            total += self.count_text(encoding, &message.content);
            if let Some(name) = &message.name {
                total += self.count_text(encoding, name) + TOKENS_PER_NAME;
            }
        }
        total + REPLY_PRIMING_TOKENS
    }
}

/// Character-based estimate: one token per four characters, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count_text(&self, _encoding: TokenEncoding, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }
}

/// BPE counter backed by `tiktoken-rs`.
pub struct TiktokenCounter {
    o200k: CoreBPE,
    cl100k: CoreBPE,
}

impl TiktokenCounter {
    /// Build both encoders. The vocabularies are bundled with `tiktoken-rs`.
    pub fn new() -> Result<Self, BudgetGuardError> {
        let o200k = tiktoken_rs::o200k_base()
            .map_err(|e| BudgetGuardError::Internal(format!("failed to load o200k_base: {e}")))?;
        let cl100k = tiktoken_rs::cl100k_base()
            .map_err(|e| BudgetGuardError::Internal(format!("failed to load cl100k_base: {e}")))?;
        Ok(Self { o200k, cl100k })
    }

    fn bpe(&self, encoding: TokenEncoding) -> &CoreBPE {
        match encoding {
            TokenEncoding::O200kBase => &self.o200k,
            TokenEncoding::Cl100kBase => &self.cl100k,
        }
    }
}

impl std::fmt::Debug for TiktokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenCounter").finish_non_exhaustive()
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_text(&self, encoding: TokenEncoding, text: &str) -> usize {
        self.bpe(encoding).encode_with_special_tokens(text).len()
    }
}
