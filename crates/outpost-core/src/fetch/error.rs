//! Fetch failure taxonomy.

use thiserror::Error;

/// Terminal failure for a single fetch job.
///
/// `InvalidArgument` is rejected synchronously at `submit`; the others are
/// delivered to the job's handler via `on_error` and end the job. There is
/// no automatic retry at this layer.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The transfer engine reported a failure (curl error code + text).
    #[error("transfer failed (code {code}): {message}")]
    Transport { code: u32, message: String },
    /// The transfer finished but produced no body.
    #[error("empty response body")]
    Empty,
    /// The job was removed by an explicit cancel call.
    #[error("canceled")]
    Canceled,
    /// Rejected at the submit boundary; no job was created.
    #[error("invalid request: {0}")]
    InvalidArgument(&'static str),
}

impl FetchError {
    /// True for the cancellation variant; handlers that only care about
    /// transport-level failures can use this to skip caller-driven removals.
    pub fn is_canceled(&self) -> bool {
        matches!(self, FetchError::Canceled)
    }
}
