use std::sync::Arc;

use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::models::document::Document;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// The sink's HTTP client could not be created.
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The configured store URL can't be used.
    #[snafu(display("Invalid sink URL {url:?}"))]
    InvalidUrl { url: String, backtrace: Backtrace },

    /// The upsert request did not complete (network failure, timeout).
    #[snafu(display("Upsert of {id} failed: {source}"))]
    Request {
        id: String,
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The store answered with a non-2xx status.
    #[snafu(display("Store rejected {id} (HTTP {status}): {body}"))]
    Rejected {
        id: String,
        status: u16,
        body: String,
        backtrace: Backtrace,
    },
}

impl SinkError {
    /// Whether repeating the upsert may succeed.
    ///
    /// Timeouts, connection failures, 429 and 5xx answers are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            SinkError::Request { source, .. } => source.is_timeout() || source.is_connect(),
            SinkError::Rejected { status, .. } => *status == 429 || *status >= 500,
            SinkError::ClientBuild { .. } | SinkError::InvalidUrl { .. } => false,
        }
    }
}

/// What the store reported for an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpsertOutcome {
    /// No document with this id existed.
    Created,
    /// An existing document was replaced.
    Updated,
    /// Accepted without saying which.
    Acknowledged,
}

/// Index-or-replace by document id.
///
/// Writing the same document twice must leave exactly one stored copy; the
/// id carries the identity, so implementations never generate their own.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn upsert(&self, document: &Document) -> Result<UpsertOutcome, SinkError>;
}

#[async_trait]
impl<T: DocumentSink + ?Sized> DocumentSink for Arc<T> {
    async fn upsert(&self, document: &Document) -> Result<UpsertOutcome, SinkError> {
        (**self).upsert(document).await
    }
}
