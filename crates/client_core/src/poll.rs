use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::fetch::{Fetched, PollTarget, StateFetcher};

/// Per-call-site retry budget. Data categories settle with different
/// latencies (profile creation is slower than cached reads), so every call
/// site picks its own attempt count and delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub attempts: u32,
    pub delay: Duration,
}

impl PollBudget {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

/// Terminal state of a polling loop. Exhaustion is a defined fallback
/// outcome for the caller, distinct from a remote-side failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    Exhausted,
}

/// Polls `target` until one attempt yields a payload that `decode` accepts,
/// or the budget runs out. Each attempt waits the fixed delay first; no
/// backoff, the windows are short. Fetch failures and malformed payloads are
/// logged and treated like a pending result, so a flaky attempt never kills
/// the loop. Returns as soon as a result is decoded, leaving the rest of the
/// budget unused.
pub async fn poll_until_decoded<T, F>(
    fetcher: &dyn StateFetcher,
    target: &PollTarget,
    budget: PollBudget,
    decode: F,
) -> PollOutcome<T>
where
    F: Fn(&Value) -> Result<T, serde_json::Error>,
{
    for attempt in 1..=budget.attempts {
        sleep(budget.delay).await;
        match fetcher.fetch(target).await {
            Ok(Fetched::Ready(value)) => match decode(&value) {
                Ok(decoded) => {
                    debug!(key = %target.key, attempt, "poll target ready");
                    return PollOutcome::Ready(decoded);
                }
                Err(err) => {
                    warn!(key = %target.key, attempt, "discarding malformed payload: {err}");
                }
            },
            Ok(Fetched::Pending) => {
                debug!(
                    key = %target.key,
                    attempt,
                    max_attempts = budget.attempts,
                    "poll target pending"
                );
            }
            Err(err) => {
                warn!(key = %target.key, attempt, "fetch attempt failed, treating as pending: {err}");
            }
        }
    }

    PollOutcome::Exhausted
}

/// Raw-value variant for callers that decode elsewhere.
pub async fn poll_until_ready(
    fetcher: &dyn StateFetcher,
    target: &PollTarget,
    budget: PollBudget,
) -> PollOutcome<Value> {
    poll_until_decoded(fetcher, target, budget, |value| Ok(value.clone())).await
}

#[cfg(test)]
#[path = "tests/poll_tests.rs"]
mod tests;
