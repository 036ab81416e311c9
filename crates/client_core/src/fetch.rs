use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use shared::{
    domain::{LogicalKey, MessageId, ProcessId},
    protocol::ResultEnvelope,
};

use crate::error::FetchError;

/// Outcome of a single fetch attempt. `Pending` is the normal state during
/// the eventual-consistency window and is what drives the retry loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Ready(Value),
    Pending,
}

/// Correlation handles for one submitted action. Carries both the message
/// identifier and the logical cache key so either fetch strategy can serve
/// the same poll.
#[derive(Debug, Clone)]
pub struct PollTarget {
    pub message_id: MessageId,
    pub key: LogicalKey,
}

/// One attempt at retrieving a submitted action's outcome. Implementations
/// must report "not there yet" as `Fetched::Pending`, reserving errors for
/// genuine transport or parse failures.
#[async_trait]
pub trait StateFetcher: Send + Sync {
    async fn fetch(&self, target: &PollTarget) -> Result<Fetched, FetchError>;
}

/// Identifier-based strategy: reads the result envelope committed for a
/// message. An envelope without response messages means the process has not
/// gotten to it yet.
pub struct MessageResultFetcher {
    http: Client,
    compute_unit_url: String,
    process_id: ProcessId,
}

impl MessageResultFetcher {
    pub fn new(compute_unit_url: impl Into<String>, process_id: ProcessId) -> Self {
        Self {
            http: Client::new(),
            compute_unit_url: compute_unit_url.into(),
            process_id,
        }
    }
}

#[async_trait]
impl StateFetcher for MessageResultFetcher {
    async fn fetch(&self, target: &PollTarget) -> Result<Fetched, FetchError> {
        let response = self
            .http
            .get(format!(
                "{}/result/{}",
                self.compute_unit_url, target.message_id
            ))
            .query(&[("process-id", self.process_id.0.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Fetched::Pending);
        }

        let envelope: ResultEnvelope = response.error_for_status()?.json().await?;
        let Some(first) = envelope.messages.into_iter().next() else {
            return Ok(Fetched::Pending);
        };
        let Some(data) = first.data.filter(|data| !data.trim().is_empty()) else {
            return Ok(Fetched::Pending);
        };

        let value: Value = serde_json::from_str(&data)?;
        Ok(Fetched::Ready(value))
    }
}

/// Key-based strategy: reads the process's materialized snapshot through the
/// compute unit's cache route. Not-found and JSON `null` both mean the
/// snapshot has not been written yet.
pub struct CacheStateFetcher {
    http: Client,
    compute_unit_url: String,
    process_id: ProcessId,
}

impl CacheStateFetcher {
    pub fn new(compute_unit_url: impl Into<String>, process_id: ProcessId) -> Self {
        Self {
            http: Client::new(),
            compute_unit_url: compute_unit_url.into(),
            process_id,
        }
    }
}

#[async_trait]
impl StateFetcher for CacheStateFetcher {
    async fn fetch(&self, target: &PollTarget) -> Result<Fetched, FetchError> {
        let response = self
            .http
            .get(format!(
                "{}/{}/cache/{}",
                self.compute_unit_url, self.process_id, target.key
            ))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Fetched::Pending);
        }

        let text = response.error_for_status()?.text().await?;
        let value: Value = serde_json::from_str(&text)?;
        if value.is_null() {
            return Ok(Fetched::Pending);
        }
        Ok(Fetched::Ready(value))
    }
}

#[cfg(test)]
#[path = "tests/fetch_tests.rs"]
mod tests;
