// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget-enforcing wrapper for LLM transports.
//!
//! Every call made through a [`BudgetedSession`] is estimated, admitted
//! against a shared ledger, forwarded to the [`Transport`](budgetguard_core::Transport),
//! and settled from the provider's reported usage. Concurrent callers can
//! never be admitted past the budget.
//!
//! ```no_run
//! # async fn run(transport: impl budgetguard_core::Transport) -> Result<(), budgetguard_core::BudgetGuardError> {
//! use budgetguard_core::{CompletionRequest, Message};
//! use budgetguard_session::BudgetedSession;
//!
//! let session = BudgetedSession::new(5.0)?;
//! let client = session.wrap(transport);
//! let request = CompletionRequest::new("gpt-4o-mini", vec![Message::user("hello")])
//!     .with_max_tokens(256);
//! if let Some(response) = client.complete(request).await? {
//!     println!("{} (spent ${:.4})", response.content, session.total_spent());
//! }
//! # Ok(())
//! # }
//! ```

pub mod intercept;
pub mod session;
pub mod stream;

pub use budgetguard_config::OverrunPolicy;
pub use budgetguard_cost::{BudgetSummary, BudgetWarning};
pub use intercept::{CallState, GuardedClient, GuardedResponse};
pub use session::{BudgetExceededCallback, BudgetedSession, SessionBuilder};
pub use stream::MeteredStream;
