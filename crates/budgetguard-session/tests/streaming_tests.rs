// SPDX-FileCopyrightText: 2026 Budgetguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for metered streams.

use budgetguard_core::{
    BudgetGuardError, CompletionRequest, Message, StreamChunk, StreamEventType, TokenUsage,
};
use budgetguard_session::{BudgetedSession, OverrunPolicy};
use budgetguard_test_utils::{MockReply, MockTransport};
use futures::StreamExt;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-10
}

fn request(max_tokens: u32) -> CompletionRequest {
    CompletionRequest::new("gpt-4o-mini", vec![Message::user("hi")])
        .with_max_tokens(max_tokens)
        .streaming()
}

fn transport(chunks: Vec<Result<StreamChunk, BudgetGuardError>>) -> MockTransport {
    MockTransport::with_replies(vec![MockReply::Chunks(chunks)])
}

#[tokio::test]
async fn deltas_pass_through_before_settlement() {
    let session = BudgetedSession::new(1.0).unwrap();
    let transport = transport(vec![
        Ok(StreamChunk::delta("one ")),
        Ok(StreamChunk::delta("two ")),
        Ok(StreamChunk::delta("three")),
        Ok(StreamChunk::usage(TokenUsage::new(10, 20), Some("stop".into()))),
    ]);

    let mut stream = session
        .stream(&transport, request(100))
        .await
        .unwrap()
        .expect("admitted");

    for expected in ["one ", "two ", "three"] {
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk, StreamChunk::delta(expected));
        assert_eq!(session.total_spent(), 0.0);
        assert!(session.reserved() > 0.0);
        assert!(stream.is_pending());
    }

    let terminal = stream.next().await.unwrap().unwrap();
    assert_eq!(terminal.event_type, StreamEventType::MessageDelta);
    assert!(session.total_spent() > 0.0);
    assert_eq!(session.reserved(), 0.0);
    assert!(!stream.is_pending());
    assert!(approx(stream.cost().expect("settled").total_cost, 0.0000135));

    assert!(stream.next().await.is_none());
    drop(stream);
    assert!(approx(session.total_spent(), 0.0000135));
}

#[tokio::test]
async fn abandoned_stream_releases_reservation() {
    let session = BudgetedSession::new(1.0).unwrap();
    let transport = transport(vec![
        Ok(StreamChunk::delta("partial")),
        Ok(StreamChunk::usage(TokenUsage::new(10, 20), None)),
        Ok(StreamChunk::stop()),
    ]);

    let mut stream = session
        .stream(&transport, request(100))
        .await
        .unwrap()
        .expect("admitted");
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.text.as_deref(), Some("partial"));
    assert!(session.reserved() > 0.0);

    drop(stream);
    assert_eq!(session.total_spent(), 0.0);
    assert_eq!(session.reserved(), 0.0);
    assert_eq!(session.outstanding_reservations(), 0);
}

#[tokio::test]
async fn unconsumed_stream_releases_reservation() {
    let session = BudgetedSession::new(1.0).unwrap();
    let stream = session
        .stream(&MockTransport::new(), request(100))
        .await
        .unwrap()
        .expect("admitted");
    assert_eq!(session.outstanding_reservations(), 1);
    drop(stream);
    assert_eq!(session.outstanding_reservations(), 0);
    assert_eq!(session.total_spent(), 0.0);
}

#[tokio::test]
async fn start_usage_supplies_input_tokens() {
    let session = BudgetedSession::new(1.0).unwrap();
    let transport = transport(vec![
        Ok(StreamChunk::start(Some(TokenUsage::new(1000, 0)))),
        Ok(StreamChunk::delta("hello")),
        Ok(StreamChunk::usage(TokenUsage::new(0, 20), Some("end_turn".into()))),
        Ok(StreamChunk::stop()),
    ]);

    let mut stream = session
        .stream(&transport, request(100))
        .await
        .unwrap()
        .expect("admitted");

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.event_type, StreamEventType::MessageStart);
    // A start event with usage is not terminal.
    assert!(stream.is_pending());

    let rest: Vec<_> = stream.by_ref().collect().await;
    assert_eq!(rest.len(), 3);

    let cost = stream.cost().expect("settled");
    assert_eq!(cost.input_tokens, 1000);
    assert_eq!(cost.output_tokens, 20);
    assert!(approx(cost.total_cost, 0.000162));
    assert!(approx(session.total_spent(), 0.000162));
}

#[tokio::test]
async fn stream_without_usage_is_released_at_end() {
    let session = BudgetedSession::new(1.0).unwrap();
    let transport = transport(vec![
        Ok(StreamChunk::start(None)),
        Ok(StreamChunk::delta("no usage")),
        Ok(StreamChunk::stop()),
    ]);

    let mut stream = session
        .stream(&transport, request(100))
        .await
        .unwrap()
        .expect("admitted");
    while stream.next().await.is_some() {}

    assert!(stream.cost().is_none());
    assert!(!stream.is_pending());
    assert_eq!(session.reserved(), 0.0);
    assert_eq!(session.total_spent(), 0.0);
}

#[tokio::test]
async fn mid_stream_error_passes_through_and_rolls_back() {
    let session = BudgetedSession::new(1.0).unwrap();
    let transport = transport(vec![
        Ok(StreamChunk::delta("partial")),
        Err(BudgetGuardError::transport(
            "connection reset",
            std::io::Error::other("reset"),
        )),
    ]);

    let mut stream = session
        .stream(&transport, request(100))
        .await
        .unwrap()
        .expect("admitted");
    stream.next().await.unwrap().unwrap();
    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, BudgetGuardError::Transport { ref message, .. } if message == "connection reset"));

    drop(stream);
    assert_eq!(session.reserved(), 0.0);
    assert_eq!(session.total_spent(), 0.0);
}

#[tokio::test]
async fn failure_to_open_stream_rolls_back() {
    let session = BudgetedSession::new(1.0).unwrap();
    let transport = MockTransport::with_replies(vec![MockReply::fail("rate limited")]);

    let err = session
        .stream(&transport, request(100))
        .await
        .unwrap_err();
    assert!(matches!(err, BudgetGuardError::Transport { .. }));
    assert_eq!(session.outstanding_reservations(), 0);
}

#[tokio::test]
async fn consumer_panic_releases_reservation() {
    let session = BudgetedSession::new(1.0).unwrap();
    let transport = MockTransport::new();
    let stream = session
        .stream(&transport, request(100))
        .await
        .unwrap()
        .expect("admitted");

    let task = tokio::spawn(async move {
        let mut stream = stream;
        let _ = stream.next().await;
        panic!("consumer crashed");
    });

    assert!(task.await.unwrap_err().is_panic());
    assert_eq!(session.reserved(), 0.0);
    assert_eq!(session.total_spent(), 0.0);
}

#[tokio::test]
async fn overrun_fail_yields_error_after_terminal_chunk() {
    let session = BudgetedSession::builder(0.00001)
        .overrun_policy(OverrunPolicy::Fail)
        .build()
        .unwrap();
    let transport = transport(vec![
        Ok(StreamChunk::delta("text")),
        Ok(StreamChunk::usage(TokenUsage::new(10, 20), None)),
        Ok(StreamChunk::stop()),
    ]);

    let mut stream = session
        .stream(&transport, request(10))
        .await
        .unwrap()
        .expect("admitted");

    let items: Vec<_> = stream.by_ref().collect().await;
    assert_eq!(items.len(), 4);
    assert!(items[0].is_ok());
    assert_eq!(
        items[1].as_ref().unwrap().event_type,
        StreamEventType::MessageDelta
    );
    assert!(matches!(items[2], Err(BudgetGuardError::Overrun { .. })));
    assert_eq!(
        items[3].as_ref().unwrap().event_type,
        StreamEventType::MessageStop
    );

    // The true cost is recorded regardless.
    assert!(approx(session.total_spent(), 0.0000135));
    assert!(stream.cost().is_none());
}

#[tokio::test]
async fn rejected_stream_returns_none_with_callback() {
    let session = BudgetedSession::builder(0.0001)
        .on_budget_exceeded(|_| {})
        .build()
        .unwrap();
    let transport = MockTransport::new();

    let result = session.stream(&transport, request(1000)).await.unwrap();
    assert!(result.is_none());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn interleaved_streams_settle_independently() {
    let session = BudgetedSession::new(1.0).unwrap();
    let transport = MockTransport::with_replies(vec![
        MockReply::streamed("kept", TokenUsage::new(10, 20)),
        MockReply::streamed("dropped", TokenUsage::new(10, 20)),
    ]);

    let mut kept = session.stream(&transport, request(100)).await.unwrap().unwrap();
    let mut dropped = session.stream(&transport, request(100)).await.unwrap().unwrap();
    assert_eq!(session.outstanding_reservations(), 2);

    dropped.next().await;
    drop(dropped);
    assert_eq!(session.outstanding_reservations(), 1);

    while kept.next().await.is_some() {}
    assert_eq!(session.outstanding_reservations(), 0);
    assert!(approx(session.total_spent(), 0.0000135));
    assert_eq!(session.reserved(), 0.0);
}

fn delta_with_usage(text: &str, input: u32, output: u32) -> StreamChunk {
    StreamChunk {
        usage: Some(TokenUsage::new(input, output)),
        ..StreamChunk::delta(text)
    }
}

fn gemini_request() -> CompletionRequest {
    CompletionRequest::new("gemini-2.0-flash", vec![Message::user("hi")])
        .with_max_tokens(2000)
        .streaming()
}

#[tokio::test]
async fn running_usage_on_deltas_bills_the_last_total() {
    let session = BudgetedSession::new(1.0).unwrap();
    let transport = transport(vec![
        Ok(delta_with_usage("a", 1000, 1)),
        Ok(delta_with_usage("b", 1000, 500)),
        Ok(delta_with_usage("c", 1000, 1000)),
    ]);

    let mut stream = session
        .stream(&transport, gemini_request())
        .await
        .unwrap()
        .expect("admitted");

    let mut seen = 0;
    while let Some(chunk) = stream.next().await {
        chunk.unwrap();
        seen += 1;
        if seen < 3 {
            assert!(stream.is_pending());
            assert_eq!(session.total_spent(), 0.0);
        }
    }

    let cost = stream.cost().expect("settled at end of stream");
    assert_eq!(cost.input_tokens, 1000);
    assert_eq!(cost.output_tokens, 1000);
    assert!(approx(session.total_spent(), 0.0005));
    assert_eq!(session.reserved(), 0.0);
}

#[tokio::test]
async fn abandoned_stream_with_running_usage_rolls_back() {
    let session = BudgetedSession::new(1.0).unwrap();
    let transport = transport(vec![
        Ok(delta_with_usage("a", 1000, 1)),
        Ok(delta_with_usage("b", 1000, 500)),
        Ok(delta_with_usage("c", 1000, 1000)),
    ]);

    let mut stream = session
        .stream(&transport, gemini_request())
        .await
        .unwrap()
        .expect("admitted");
    stream.next().await.unwrap().unwrap();
    stream.next().await.unwrap().unwrap();
    drop(stream);

    assert_eq!(session.total_spent(), 0.0);
    assert_eq!(session.reserved(), 0.0);
    assert_eq!(session.outstanding_reservations(), 0);
}

#[tokio::test]
async fn terminal_usage_wins_over_running_usage() {
    let session = BudgetedSession::new(1.0).unwrap();
    let transport = transport(vec![
        Ok(delta_with_usage("a", 1000, 1)),
        Ok(StreamChunk::usage(TokenUsage::new(1000, 1000), None)),
        Ok(StreamChunk::stop()),
    ]);

    let mut stream = session
        .stream(&transport, gemini_request())
        .await
        .unwrap()
        .expect("admitted");
    stream.next().await.unwrap().unwrap();
    assert!(stream.is_pending());
    stream.next().await.unwrap().unwrap();
    assert!(!stream.is_pending());
    while stream.next().await.is_some() {}

    assert!(approx(session.total_spent(), 0.0005));
}

#[tokio::test]
async fn overrun_settled_at_end_of_stream_yields_error_last() {
    let session = BudgetedSession::builder(0.0002)
        .overrun_policy(OverrunPolicy::Fail)
        .build()
        .unwrap();
    let transport = transport(vec![
        Ok(delta_with_usage("a", 100, 10)),
        Ok(delta_with_usage("b", 1000, 1000)),
    ]);
    let request = CompletionRequest::new("gemini-2.0-flash", vec![Message::user("hi")])
        .with_max_tokens(100)
        .streaming();

    let mut stream = session
        .stream(&transport, request)
        .await
        .unwrap()
        .expect("admitted");

    let items: Vec<_> = stream.by_ref().collect().await;
    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok() && items[1].is_ok());
    assert!(matches!(items[2], Err(BudgetGuardError::Overrun { .. })));
    assert!(stream.next().await.is_none());
    assert!(approx(session.total_spent(), 0.0005));
}
