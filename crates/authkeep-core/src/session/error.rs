use thiserror::Error;

use crate::api::ApiError;

/// Failure returned by `SessionStore::sign_in`.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email and password required")]
    MissingCredentials,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Signed out while sign-in was in progress")]
    SignedOut,

    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => AuthError::InvalidCredentials,
            other => AuthError::Api(other),
        }
    }
}

impl AuthError {
    /// Message suitable for showing next to a sign-in form
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Api(ApiError::NetworkError(e)) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            AuthError::Api(ApiError::NetworkError(_)) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            AuthError::Api(ApiError::RateLimited) => {
                "Too many attempts. Please wait and try again.".to_string()
            }
            AuthError::Api(e) => format!("Sign-in failed: {}", e),
            other => other.to_string(),
        }
    }
}
