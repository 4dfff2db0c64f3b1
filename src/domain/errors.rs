use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Insufficient stock for {product}. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        product: String,
        available: i32,
        requested: i32,
    },
    /// A stock limit hit while editing the cart; the message is shown as-is.
    #[error("{0}")]
    StockLimit(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Internal error: {0}")]
    Internal(String),
}
