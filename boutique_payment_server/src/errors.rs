use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use boutique_payment_engine::PaymentGatewayError;
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
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
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Required field '{field}' is missing or invalid: {message}")]
    ValidationError { field: String, message: String },
    #[error("Invalid payment signature")]
    InvalidSignature,
    #[error("Out of stock. {0}")]
    OutOfStock(String),
    #[error("Conflicting update. {0}")]
    Conflict(String),
    #[error("Could not create remote payment intent. {0}")]
    GatewayError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::OutOfStock(_) => StatusCode::CONFLICT,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl From<PaymentGatewayError> for ServerError {
    fn from(e: PaymentGatewayError) -> Self {
        use PaymentGatewayError::*;
        match e {
            DatabaseError(e) => {
                error!("💻️ Database error bubbled up to a handler: {e}");
                Self::BackendError(e)
            },
            ValidationError { field, message } => Self::ValidationError { field, message },
            OrderIdNotFound(id) => Self::NoRecordFound(format!("Order with id {id}")),
            OrderNotFound(number) => Self::NoRecordFound(format!("Order {number}")),
            ProductNotFound(id) => Self::NoRecordFound(format!("Product with id {id}")),
            UserNotFound(id) => Self::NoRecordFound(format!("User with id {id}")),
            AgentNotFound(id) => Self::NoRecordFound(format!("Agent with id {id}")),
            CouponNotFound(code) => {
                Self::ValidationError { field: "couponCode".into(), message: format!("{code} is not an active coupon") }
            },
            e @ InvalidStatusTransition { .. } => {
                Self::ValidationError { field: "status".into(), message: e.to_string() }
            },
            Conflict { expected, actual } => {
                Self::Conflict(format!("expected version {expected}, found {actual}"))
            },
            e @ OutOfStock { .. } => Self::OutOfStock(e.to_string()),
            IntentNotFound(id) => Self::NoRecordFound(format!("Payment intent {id}")),
            e @ IntentExpired(_) => Self::ValidationError { field: "intentId".into(), message: e.to_string() },
            e @ OrderNumberExhausted => Self::BackendError(e.to_string()),
            e @ MissingOrderDetails => {
                Self::ValidationError { field: "orderDetails".into(), message: e.to_string() }
            },
        }
    }
}
