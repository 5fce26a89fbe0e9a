use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("The provider did not respond within the configured deadline")]
    Timeout,
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
    #[error("Unsupported currency code: {0}")]
    UnsupportedCurrency(String),
    #[error("Provider responded in {actual} for a request denominated in {expected}")]
    CurrencyMismatch { expected: String, actual: String },
}

impl GatewayApiError {
    /// Transient errors are worth retrying; everything else is a definitive answer from the provider.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayApiError::Timeout => true,
            GatewayApiError::QueryError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
