// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sessions built from TOML configuration, with the configured log level
//! driving an `EnvFilter` subscriber.

use std::io;
use std::sync::{Arc, Mutex};

use budgetguard_config::load_and_validate_str;
use budgetguard_core::{CompletionRequest, Message, Tier, TokenUsage};
use budgetguard_session::{BudgetedSession, OverrunPolicy};
use budgetguard_test_utils::{MockReply, MockTransport};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = SharedBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run an overrunning call under a subscriber filtered at `log_level` and
/// return everything it wrote.
fn overrun_output(log_level: &str) -> String {
    let toml = format!(
        "budget_usd = 0.00001\noverrun_policy = \"warn\"\nlog_level = \"{log_level}\"\n"
    );
    let config = load_and_validate_str(&toml).unwrap();
    let session = BudgetedSession::from_config(&config).unwrap();
    let transport =
        MockTransport::with_replies(vec![MockReply::complete("ok", TokenUsage::new(10, 20))]);

    let buffer = SharedBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .with_writer(buffer.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let request = CompletionRequest::new("gpt-4o-mini", vec![Message::user("hi")])
            .with_max_tokens(10);
        let response = futures::executor::block_on(session.complete(&transport, request));
        assert!(response.unwrap().is_some());
    });

    assert!(session.total_spent() > session.budget());
    buffer.contents()
}

#[test]
fn configured_level_admits_overrun_warning() {
    let output = overrun_output("warn");
    assert!(output.contains("spend exceeds budget after settlement"), "{output}");
    assert!(!output.contains("call settled"));
}

#[test]
fn configured_level_suppresses_overrun_warning() {
    let output = overrun_output("error");
    assert!(output.is_empty(), "{output}");
}

#[test]
fn debug_level_shows_reservation_lifecycle() {
    let output = overrun_output("debug");
    assert!(output.contains("call settled"), "{output}");
}

#[test]
fn session_takes_tier_and_policy_from_config() {
    let config = load_and_validate_str(
        r#"
budget_usd = 2.5
tier = "batch"
overrun_policy = "fail"
warning_thresholds = [95, 50, 50]
"#,
    )
    .unwrap();
    let session = BudgetedSession::from_config(&config).unwrap();

    assert_eq!(session.budget(), 2.5);
    assert_eq!(session.tier(), Tier::Batch);
    assert_eq!(config.overrun_policy, OverrunPolicy::Fail);
    assert_eq!(config.normalized_thresholds(), vec![50, 95]);
}

#[test]
fn config_without_budget_is_rejected() {
    let errors = load_and_validate_str("tier = \"standard\"\n").unwrap_err();
    assert!(!errors.is_empty());
}

#[test]
fn config_and_notifier_share_default_thresholds() {
    assert_eq!(
        budgetguard_config::model::DEFAULT_WARNING_THRESHOLDS,
        budgetguard_cost::DEFAULT_WARNING_THRESHOLDS
    );
    let config = load_and_validate_str("budget_usd = 1.0\n").unwrap();
    assert_eq!(
        config.warning_thresholds,
        budgetguard_cost::DEFAULT_WARNING_THRESHOLDS.to_vec()
    );
}
