//! Closed set of error kinds shared by the numeric kernel, adapters, and engine.

use thiserror::Error;

/// Errors surfaced across the adapter/engine boundary.
///
/// The set is intentionally closed: callers on the evaluation path match on
/// these variants to derive a skip classification rather than aborting.
#[derive(Debug, Error)]
pub enum ArbitError {
    #[error("invalid quote: {0}")]
    InvalidQuote(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("fatal error: {0}")]
    Fatal(String),
}

impl ArbitError {
    /// Stable skip-classification string for attempts that never reach order
    /// submission because of an adapter-side error.
    pub fn skip_reason(&self) -> &'static str {
        match self {
            ArbitError::InsufficientBalance(_) => "insufficient_balance",
            _ => "adapter_error",
        }
    }
}

pub type ArbitResult<T> = Result<T, ArbitError>;
