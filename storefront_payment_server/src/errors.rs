use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use storefront_payment_engine::{
    spe_api::errors::AuditApiError,
    OrderLifecycleError,
    ReconcileError,
    RefundError,
};
use thiserror::Error;

/// The server error taxonomy. Besides the usual plumbing variants, the four user-visible classes the admin console
/// has to distinguish each get their own variant and a machine-readable `kind` in the JSON body:
/// * `Validation` — "your edit was rejected", never retried;
/// * `Conflict` — "someone else changed this order, refresh and retry";
/// * `Upstream` — "the payment provider is unreachable, this will be retried";
/// * `Integrity` — "this completed but audit logging failed", a compliance risk that is always surfaced.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Integrity(String),
}

impl ServerError {
    fn kind(&self) -> &'static str {
        match self {
            ServerError::Validation(_) => "validation",
            ServerError::Conflict(_) => "conflict",
            ServerError::Upstream(_) => "upstream",
            ServerError::Integrity(_) => "integrity",
            ServerError::AuthenticationError(_) => "auth",
            ServerError::NoRecordFound(_) => "not_found",
            _ => "internal",
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Integrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingIdentity => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormedHeader(_) => StatusCode::BAD_REQUEST,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string(), "kind": self.kind() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No actor identity was supplied with the request.")]
    MissingIdentity,
    #[error("The actor identity headers are not in the correct format. {0}")]
    PoorlyFormedHeader(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl From<OrderLifecycleError> for ServerError {
    fn from(e: OrderLifecycleError) -> Self {
        match e {
            OrderLifecycleError::OrderNotFound(id) => ServerError::NoRecordFound(format!("Order {id} not found")),
            OrderLifecycleError::InvalidTransition { .. } => ServerError::Validation(e.to_string()),
            OrderLifecycleError::VersionConflict { .. } => ServerError::Conflict(e.to_string()),
            OrderLifecycleError::AuditWriteFailed(_) => ServerError::Integrity(e.to_string()),
            OrderLifecycleError::StorageError(s) => ServerError::BackendError(s),
        }
    }
}

impl From<RefundError> for ServerError {
    fn from(e: RefundError) -> Self {
        match e {
            RefundError::OrderNotFound(id) => ServerError::NoRecordFound(format!("Order {id} not found")),
            RefundError::UnknownRefund(id) => ServerError::NoRecordFound(format!("Refund {id} not found")),
            RefundError::InvalidState(_) | RefundError::InvalidAmount { .. } => {
                ServerError::Validation(e.to_string())
            },
            RefundError::DispatchFailed { .. } => ServerError::Upstream(e.to_string()),
            RefundError::Conflict { .. } => ServerError::Conflict(e.to_string()),
            RefundError::Lifecycle(inner) => ServerError::from(inner),
            RefundError::StorageError(s) => ServerError::BackendError(s),
        }
    }
}

impl From<ReconcileError> for ServerError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::UnknownOrder(id) => ServerError::NoRecordFound(format!("Order {id} not found")),
            ReconcileError::AmountMismatch { .. } => ServerError::Validation(e.to_string()),
            ReconcileError::ReconciliationConflict { .. } => ServerError::Conflict(e.to_string()),
            ReconcileError::Unresolved(_) => ServerError::Upstream(e.to_string()),
            ReconcileError::Lifecycle(inner) => ServerError::from(inner),
            ReconcileError::StorageError(s) => ServerError::BackendError(s),
        }
    }
}

impl From<AuditApiError> for ServerError {
    fn from(e: AuditApiError) -> Self {
        match e {
            AuditApiError::WriteFailed(_) => ServerError::Integrity(e.to_string()),
            AuditApiError::StorageError(s) => ServerError::BackendError(s),
        }
    }
}
