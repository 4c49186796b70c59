use crate::models::CardId;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "sign in required".to_owned(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        tracing::debug!(code = %err.code(), "auth request rejected");
        let status = match err {
            AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Provider(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.user_message().to_owned(),
        }
    }
}

impl From<CardError> for AppError {
    fn from(err: CardError) -> Self {
        let status = match err {
            CardError::NotFound(_) => StatusCode::NOT_FOUND,
            CardError::Debounced => StatusCode::TOO_MANY_REQUESTS,
            CardError::Invalid(_) => StatusCode::BAD_REQUEST,
            CardError::NotEditing(_) | CardError::NoDrag => StatusCode::CONFLICT,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: err.to_string(),
            },
            other => Self::internal(other),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

/// Failures reported by the identity provider, keyed by the provider's error codes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthError {
    #[error("auth/user-not-found")]
    UserNotFound,
    #[error("auth/wrong-password")]
    WrongPassword,
    #[error("auth/invalid-email")]
    InvalidEmail,
    #[error("auth/user-disabled")]
    UserDisabled,
    #[error("auth/too-many-requests")]
    TooManyRequests,
    #[error("auth/email-already-in-use")]
    EmailAlreadyInUse,
    #[error("auth/weak-password")]
    WeakPassword,
    #[error("auth/operation-not-allowed")]
    OperationNotAllowed,
    #[error("auth/popup-closed-by-user")]
    PopupClosedByUser,
    #[error("auth/popup-blocked")]
    PopupBlocked,
    #[error("auth provider error: {0}")]
    Provider(String),
}

impl AuthError {
    pub fn code(&self) -> String {
        match self {
            AuthError::Provider(_) => "auth/internal-error".to_owned(),
            other => other.to_string(),
        }
    }

    /// Message suitable for showing next to the sign-in form.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::UserNotFound => "No account found with this email address",
            AuthError::WrongPassword => "Incorrect password",
            AuthError::InvalidEmail => "Invalid email address",
            AuthError::UserDisabled => "This account has been disabled",
            AuthError::TooManyRequests => "Too many failed attempts. Please try again later",
            AuthError::EmailAlreadyInUse => "An account with this email already exists",
            AuthError::WeakPassword => "Password is too weak",
            AuthError::OperationNotAllowed => "Email/password accounts are not enabled",
            AuthError::PopupClosedByUser => "Sign-in was cancelled",
            AuthError::PopupBlocked => "Popup was blocked by browser",
            AuthError::Provider(_) => "Something went wrong. Please try again",
        }
    }
}

/// Document store failures. The tracker logs these and keeps local state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("document store unavailable")]
    Unavailable,
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please add a title to this habit before recording progress.")]
    MissingTitle,
    #[error("invalid deadline {0:?}, expected YYYY-MM-DD")]
    InvalidDeadline(String),
    #[error("Please agree to the Terms of Service and Privacy Policy")]
    TermsNotAccepted,
    #[error("{message}")]
    Field { field: &'static str, message: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CardError {
    #[error("card {0} not found")]
    NotFound(CardId),
    #[error("action repeated too quickly")]
    Debounced,
    #[error("card {0} is not being edited")]
    NotEditing(CardId),
    #[error("no drag in progress")]
    NoDrag,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
