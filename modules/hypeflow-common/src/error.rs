use thiserror::Error;

#[derive(Error, Debug)]
pub enum HypeflowError {
    /// Network or auth failure talking to the extraction/hype backend.
    /// Callers degrade to an empty result; never aborts a batch.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend replied but the payload could not be parsed as the expected
    /// structured result, even after the permitted retry.
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    /// Store rejected a write because an expected column is absent.
    /// Triggers one fallback retry with a reduced field set.
    #[error("Store schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
