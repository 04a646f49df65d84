// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Budgetguard integration tests.
//!
//! Provides a scripted [`Transport`](budgetguard_core::Transport) for fast,
//! deterministic tests without external API calls.
//!
//! # Components
//!
//! - [`MockTransport`] - Scripted transport with queued replies, failures, and delays
//! - [`MockReply`] - One scripted reply

pub mod mock_transport;

pub use mock_transport::{MockReply, MockTransport};
