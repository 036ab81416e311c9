use super::*;
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::error::FetchError;

/// Fetcher double that replays a scripted sequence of attempt outcomes,
/// then stays pending.
struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<Fetched, FetchError>>>,
    calls: AtomicU32,
}

impl ScriptedFetcher {
    fn new(script: Vec<Result<Fetched, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateFetcher for ScriptedFetcher {
    async fn fetch(&self, _target: &PollTarget) -> Result<Fetched, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(Fetched::Pending))
    }
}

fn target() -> PollTarget {
    PollTarget {
        message_id: shared::domain::MessageId::from("msg-1"),
        key: shared::domain::LogicalKey::from("wallet-1"),
    }
}

fn fast(attempts: u32) -> PollBudget {
    PollBudget::new(attempts, Duration::from_millis(1))
}

fn malformed() -> FetchError {
    serde_json::from_str::<Value>("nope").unwrap_err().into()
}

#[tokio::test]
async fn returns_early_once_a_result_is_ready() {
    let fetcher = ScriptedFetcher::new(vec![
        Ok(Fetched::Pending),
        Ok(Fetched::Pending),
        Ok(Fetched::Ready(json!({ "answer": 42 }))),
    ]);

    let outcome = poll_until_ready(&fetcher, &target(), fast(8)).await;
    assert_eq!(outcome, PollOutcome::Ready(json!({ "answer": 42 })));
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn exhausts_after_exactly_the_budgeted_attempts() {
    let fetcher = ScriptedFetcher::new(Vec::new());

    let outcome = poll_until_ready(&fetcher, &target(), fast(4)).await;
    assert_eq!(outcome, PollOutcome::Exhausted);
    assert_eq!(fetcher.calls(), 4);
}

#[tokio::test]
async fn zero_attempt_budget_exhausts_without_fetching() {
    let fetcher = ScriptedFetcher::new(Vec::new());

    let outcome = poll_until_ready(&fetcher, &target(), fast(0)).await;
    assert_eq!(outcome, PollOutcome::Exhausted);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn fetch_failure_counts_as_a_pending_attempt() {
    let fetcher = ScriptedFetcher::new(vec![
        Err(malformed()),
        Ok(Fetched::Ready(json!(true))),
    ]);

    let outcome = poll_until_ready(&fetcher, &target(), fast(3)).await;
    assert_eq!(outcome, PollOutcome::Ready(json!(true)));
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn undecodable_payload_counts_as_a_pending_attempt() {
    let fetcher = ScriptedFetcher::new(vec![
        Ok(Fetched::Ready(json!("not a number"))),
        Ok(Fetched::Ready(json!(7))),
    ]);

    let outcome = poll_until_decoded(&fetcher, &target(), fast(3), |value| {
        serde_json::from_value::<u32>(value.clone())
    })
    .await;
    assert_eq!(outcome, PollOutcome::Ready(7));
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn all_failures_end_in_exhaustion_not_error() {
    let fetcher = ScriptedFetcher::new(vec![Err(malformed()), Err(malformed())]);

    let outcome = poll_until_ready(&fetcher, &target(), fast(2)).await;
    assert_eq!(outcome, PollOutcome::Exhausted);
    assert_eq!(fetcher.calls(), 2);
}
