use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{Action, MessageId, ProcessId, WalletAddress},
    protocol::Tag,
};
use tracing::info;
use uuid::Uuid;

use crate::error::SubmitError;

/// A bundled message ready for signing: target process, ordered tags, and
/// the opaque payload (base64 so the envelope stays binary-safe).
#[derive(Debug, Clone, Serialize)]
pub struct DataItemDraft {
    pub target: Option<ProcessId>,
    pub tags: Vec<Tag>,
    pub data_b64: String,
    pub anchor: String,
}

/// The externally supplied signing credential. Real deployments wrap a
/// wallet; the client only ever needs an address and a signature.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Active signing identity, or `None` when no wallet is connected.
    fn address(&self) -> Option<WalletAddress>;
    async fn sign(&self, draft: &DataItemDraft) -> Result<Vec<u8>>;
}

pub struct MissingWalletSigner;

#[async_trait]
impl WalletSigner for MissingWalletSigner {
    fn address(&self) -> Option<WalletAddress> {
        None
    }

    async fn sign(&self, _draft: &DataItemDraft) -> Result<Vec<u8>> {
        Err(anyhow!("no wallet signer available"))
    }
}

/// Development signer that emits the draft as an unsigned JSON envelope.
/// Good enough for local messenger units and tests; production wallets
/// implement [`WalletSigner`] with real data-item signatures.
pub struct DevWalletSigner {
    address: WalletAddress,
}

impl DevWalletSigner {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: WalletAddress(address.into()),
        }
    }
}

#[derive(Serialize)]
struct DevEnvelope<'a> {
    owner: &'a str,
    #[serde(flatten)]
    draft: &'a DataItemDraft,
}

#[async_trait]
impl WalletSigner for DevWalletSigner {
    fn address(&self) -> Option<WalletAddress> {
        Some(self.address.clone())
    }

    async fn sign(&self, draft: &DataItemDraft) -> Result<Vec<u8>> {
        let envelope = DevEnvelope {
            owner: &self.address.0,
            draft,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

/// Signs action messages and hands them to the messenger unit. One network
/// call per submission, no retries: a failure is surfaced immediately and
/// the caller decides whether to resubmit as a new operation.
pub struct MessengerTransport {
    http: Client,
    messenger_unit_url: String,
    process_id: ProcessId,
    signer: Arc<dyn WalletSigner>,
}

impl MessengerTransport {
    pub fn new(
        messenger_unit_url: impl Into<String>,
        process_id: ProcessId,
        signer: Arc<dyn WalletSigner>,
    ) -> Self {
        Self {
            http: Client::new(),
            messenger_unit_url: messenger_unit_url.into(),
            process_id,
            signer,
        }
    }

    pub fn address(&self) -> Option<WalletAddress> {
        self.signer.address()
    }

    pub fn process_id(&self) -> &ProcessId {
        &self.process_id
    }

    /// Submits one signed action message to the bound process. The `Action`
    /// tag always leads; caller tags follow in order, duplicates allowed.
    /// Success means the message is durably queued, not that it has been
    /// processed.
    pub async fn submit(
        &self,
        action: Action,
        extra_tags: &[Tag],
        data: &str,
    ) -> Result<MessageId, SubmitError> {
        let mut tags = Vec::with_capacity(extra_tags.len() + 1);
        tags.push(Tag::new("Action", action.as_str()));
        tags.extend_from_slice(extra_tags);
        self.post_item(Some(self.process_id.clone()), tags, data)
            .await
    }

    /// Spawns a new remote process from a module. The returned identifier
    /// names the process for all later submissions.
    pub async fn spawn_process(
        &self,
        module: &str,
        scheduler: &str,
        extra_tags: &[Tag],
    ) -> Result<ProcessId, SubmitError> {
        let mut tags = vec![
            Tag::new("Data-Protocol", "ao"),
            Tag::new("Variant", "ao.TN.1"),
            Tag::new("Type", "Process"),
            Tag::new("Module", module),
            Tag::new("Scheduler", scheduler),
        ];
        tags.extend_from_slice(extra_tags);
        let message_id = self.post_item(None, tags, "").await?;
        Ok(ProcessId(message_id.0))
    }

    async fn post_item(
        &self,
        target: Option<ProcessId>,
        tags: Vec<Tag>,
        data: &str,
    ) -> Result<MessageId, SubmitError> {
        // The credential check happens before any signing or network work so
        // a disconnected wallet is reported as such, not as a network error.
        if self.signer.address().is_none() {
            return Err(SubmitError::CredentialUnavailable);
        }

        let draft = DataItemDraft {
            target,
            tags,
            data_b64: STANDARD.encode(data.as_bytes()),
            anchor: Uuid::new_v4().to_string(),
        };
        let item = self
            .signer
            .sign(&draft)
            .await
            .map_err(SubmitError::Signing)?;

        let response = self
            .http
            .post(self.messenger_unit_url.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(item)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|err| SubmitError::SubmissionFailed(err.into()))?;

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|err| SubmitError::SubmissionFailed(err.into()))?;
        if body.id.trim().is_empty() {
            return Err(SubmitError::SubmissionFailed(anyhow!(
                "messenger unit returned an empty message id"
            )));
        }

        info!(message_id = %body.id, "action message submitted");
        Ok(MessageId(body.id))
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
