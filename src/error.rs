//! Error types for the table engine.

use thiserror::Error;

/// Failure reported by the remote store for a single call.
///
/// These never propagate out of the engine's operations; the mutation layer
/// turns them into local reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("caller does not own base {0}")]
    Unauthorized(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("remote call was dropped before it resolved")]
    Disconnected,
}

/// Malformed encoded cell address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("cell key {0:?} has no delimiter")]
    MissingDelimiter(String),
    #[error("cell key {0:?} has more than two parts")]
    TooManyParts(String),
    #[error("cell key {0:?} has an empty row or column id")]
    EmptyPart(String),
    #[error("cell key {0:?} ends with an escape character")]
    DanglingEscape(String),
}
