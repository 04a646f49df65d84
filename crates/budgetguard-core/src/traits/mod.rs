// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for collaborators of the budget guard.
//!
//! Traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod transport;

pub use transport::{ChunkStream, Transport};
