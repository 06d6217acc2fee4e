use thiserror::Error;

use crate::adapters::csv_export::ExportError;
use crate::adapters::email::DeliveryError;
use crate::adapters::token::AuthError;
use crate::adapters::zaptec_client::RetrievalError;
use crate::domain::aggregation::FormatError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("authentication failed: {0}")]
    Auth(#[source] AuthError),
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] RetrievalError),
    #[error("report formatting failed: {0}")]
    Format(#[from] FormatError),
    #[error("report export failed: {0}")]
    Export(#[from] ExportError),
    #[error("report delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("runtime failure: {0}")]
    Runtime(String),
}

impl AppError {
    pub fn logging_init<E: std::fmt::Display>(error: E) -> Self {
        Self::LoggingInit(error.to_string())
    }

    pub fn config<E: std::fmt::Display>(error: E) -> Self {
        Self::Config(error.to_string())
    }

    pub fn runtime<E: std::fmt::Display>(error: E) -> Self {
        Self::Runtime(error.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> Self {
        Self::Auth(error)
    }
}

impl From<RetrievalError> for AppError {
    fn from(error: RetrievalError) -> Self {
        match error {
            RetrievalError::Auth(auth) => Self::Auth(auth),
            other => Self::Retrieval(other),
        }
    }
}
