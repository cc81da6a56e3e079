use thiserror::Error;

/// Error surface for the sync engine, mirroring the error-kind taxonomy in
/// the design doc: config errors and fatal connection loss abort the
/// process, query/upsert errors are retried by the caller, validation
/// errors are logged and the offending row is skipped.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transient connection error: {0}")]
    ConnectTransient(#[from] sqlx::Error),

    #[error("fatal connection error: {0}")]
    ConnectFatal(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("sink upsert error: {0}")]
    Upsert(String),

    #[error("row did not match the declared entity contract: {0}")]
    Validation(String),

    #[error("graph analytics error: {0}")]
    Analytics(String),

    #[error("http error calling sink: {0}")]
    Http(#[from] reqwest::Error),
}

impl EtlError {
    /// Config and ConnectFatal abort the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EtlError::Config(_) | EtlError::ConnectFatal(_))
    }

    /// ConnectTransient, Query, Upsert, and Http are retried with backoff
    /// inside the worker before being logged as a chunk failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EtlError::ConnectTransient(_) | EtlError::Query(_) | EtlError::Upsert(_) | EtlError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
