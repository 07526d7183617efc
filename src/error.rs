//! Error types shared by the store, the studio and the CLI.

use thiserror::Error;

use crate::trace::SessionId;

/// Errors surfaced by persistence and import/export.
///
/// Capture never produces one of these: misclicks and empty sessions are
/// reported through [`crate::recorder::StrokeOutcome`] and
/// [`crate::store::SaveOutcome`] instead.
#[derive(Error, Debug)]
pub enum AuraError {
    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("session {id} is corrupt: {source}")]
    CorruptSession {
        id: SessionId,
        #[source]
        source: serde_json::Error,
    },

    #[error("import failed: {0}")]
    Import(#[source] serde_json::Error),

    #[error("could not encode session: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AuraError>;
