// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Miette diagnostics for `budgetguard.toml`.
//!
//! Figment errors are mapped onto [`ConfigError`] variants. Every key in the
//! file is top-level, so a span is found by scanning each loaded source for
//! `key =` before the first table header. Sources are searched from the
//! highest-precedence layer down.

#![allow(unused_assignments)] // emitted by the miette derive

use std::path::Path;

use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a candidate must beat to be offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Name given to configuration passed in as a string.
pub const INLINE_SOURCE: &str = "<inline>";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(budgetguard::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys `budgetguard.toml` accepts.
        valid_keys: String,
        #[label("not a budgetguard setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(code(budgetguard::config::invalid_value), help("{}", value_hint(key)))]
    InvalidValue {
        key: String,
        detail: String,
        #[label("set here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(budgetguard::config::missing_key),
        help("add `{key} = <value>` to budgetguard.toml or set BUDGETGUARD_{}", key.to_uppercase())
    )]
    MissingKey { key: String },

    /// A value that parsed but is out of range.
    #[error("validation error: {message}")]
    #[diagnostic(code(budgetguard::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(budgetguard::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// What each setting expects, shown under a type or variant error.
fn value_hint(key: &str) -> &'static str {
    match key {
        "budget_usd" => "a positive number of US dollars, e.g. `budget_usd = 10.0`",
        "tier" => "one of `standard`, `batch`",
        "warning_thresholds" => "a list of percentages, e.g. `warning_thresholds = [30, 80, 95]`",
        "pricing_file" => "a path to a JSON pricing table",
        "overrun_policy" => "one of `ignore`, `warn`, `fail`",
        "token_counter" => "one of `heuristic`, `tiktoken`",
        "log_level" => "one of `trace`, `debug`, `info`, `warn`, `error`",
        _ => "see the budgetguard.toml reference for accepted values",
    }
}

/// One loaded TOML layer, kept for span lookup.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub name: String,
    pub content: String,
}

impl ConfigSource {
    pub fn inline(content: &str) -> Self {
        Self {
            name: INLINE_SOURCE.to_string(),
            content: content.to_string(),
        }
    }

    /// `None` when the file does not exist or cannot be read.
    pub fn read(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        Some(Self {
            name: path.display().to_string(),
            content,
        })
    }

    /// Byte offset of a top-level `key = ...` assignment.
    pub fn key_offset(&self, key: &str) -> Option<usize> {
        top_level_key_offset(&self.content, key)
    }
}

/// Offset of `key` where it is assigned at the top level of `content`.
///
/// Scanning stops at the first `[table]` header.
pub fn top_level_key_offset(content: &str, key: &str) -> Option<usize> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            return None;
        }
        if let Some(rest) = trimmed.strip_prefix(key)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

/// Span of `key` in the highest-precedence source that assigns it.
fn locate(key: &str, sources: &[ConfigSource]) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    sources
        .iter()
        .rev()
        .find_map(|source| {
            source.key_offset(key).map(|offset| {
                (
                    Some(SourceSpan::new(offset.into(), key.len())),
                    Some(NamedSource::new(&source.name, source.content.clone())),
                )
            })
        })
        .unwrap_or((None, None))
}

/// Best match for `unknown` among `candidates`, if any is close enough.
pub fn suggest_key(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|candidate| (strsim::jaro_winkler(unknown, candidate), *candidate))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

/// Map every error in a figment failure to a diagnostic.
///
/// `sources` must be in merge order, lowest precedence first.
pub fn figment_to_config_errors(err: figment::Error, sources: &[ConfigSource]) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            // Skip array indices so `warning_thresholds.1` reports the key.
            let key = error
                .path
                .iter()
                .rev()
                .find(|segment| segment.parse::<usize>().is_err())
                .cloned()
                .unwrap_or_default();
            match error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = locate(&field, sources);
                    ConfigError::UnknownKey {
                        suggestion: suggest_key(&field, expected),
                        valid_keys: expected.join(", "),
                        key: field,
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: field.into_owned(),
                },
                Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
                    let (span, src) = locate(&key, sources);
                    ConfigError::InvalidValue {
                        detail: format!("found {actual}, expected {expected}"),
                        key,
                        span,
                        src,
                    }
                }
                Kind::UnknownVariant(found, expected) => {
                    let (span, src) = locate(&key, sources);
                    let detail = match suggest_key(&found, expected) {
                        Some(s) => format!("unknown value `{found}`, did you mean `{s}`?"),
                        None => format!("unknown value `{found}`"),
                    };
                    ConfigError::InvalidValue {
                        key,
                        detail,
                        span,
                        src,
                    }
                }
                kind if key.is_empty() => ConfigError::Other(kind.to_string()),
                kind => ConfigError::Other(format!("`{key}`: {kind}")),
            }
        })
        .collect()
}

/// Render diagnostics as miette would print them.
pub fn render_to_string(errors: &[ConfigError]) -> String {
    let handler = GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        if handler.render_report(&mut out, error).is_err() {
            out.push_str(&format!("Error: {error}\n"));
        }
    }
    out
}

/// Print diagnostics to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    eprint!("{}", render_to_string(errors));
}
