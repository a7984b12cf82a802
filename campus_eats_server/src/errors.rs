use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use campus_eats_engine::traits::PaymentGatewayError;
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Invalid request. {0}")]
    InvalidInput(String),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("Payment verification failed")]
    PaymentVerificationFailed,
    #[error("The order is in a conflicting state. {0}")]
    Conflict(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The payment provider is unavailable. {0}")]
    ProviderUnavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            // signature mismatches return a deliberately generic 400; detail goes to the log only
            Self::PaymentVerificationFailed => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
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
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl From<PaymentGatewayError> for ServerError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id}")),
            PaymentGatewayError::EmptyCart |
            PaymentGatewayError::UnknownFoodItem(_) |
            PaymentGatewayError::ItemUnavailable(_) |
            PaymentGatewayError::InvalidQuantity(_) => Self::InvalidInput(e.to_string()),
            PaymentGatewayError::Conflict(_) | PaymentGatewayError::RaceLost => Self::Conflict(e.to_string()),
            PaymentGatewayError::VendorNotInOrder |
            PaymentGatewayError::NotYourDelivery |
            PaymentGatewayError::NoVendorForUser => Self::InsufficientPermissions(e.to_string()),
            PaymentGatewayError::OrderMismatch(_) => {
                error!("💻️ Payment/order mismatch: {e}");
                Self::PaymentVerificationFailed
            },
            PaymentGatewayError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}
