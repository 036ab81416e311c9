use thiserror::Error;

/// Failures raised synchronously by message submission. Everything else in
/// this layer (pending results, exhausted polls) is an expected outcome, not
/// an error.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// No signing credential is connected. Checked before any network call
    /// is attempted.
    #[error("wallet credential unavailable; connect a wallet before submitting")]
    CredentialUnavailable,
    #[error("failed to sign action message: {0}")]
    Signing(#[source] anyhow::Error),
    /// Transport-level failure. Surfaced immediately with no retry; the
    /// caller may resubmit as a new operation.
    #[error("message submission failed: {0}")]
    SubmissionFailed(#[source] anyhow::Error),
}

/// Failures inside a single fetch attempt. The polling loop logs these and
/// treats them like a pending result; they never abort the loop.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("state fetch failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed payload from compute unit: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}
