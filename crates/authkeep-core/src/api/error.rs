use thiserror::Error;

/// Failure talking to the authentication backend.
#[derive(Error, Debug)]
pub enum ApiError {
    /// 403: the backend knows the account but refuses it a session
    #[error("Account not permitted to sign in: {0}")]
    AccessDenied(String),

    /// 401: bearer token expired/invalid, or credentials rejected
    #[error("Unauthorized - token or credentials rejected")]
    Unauthorized,

    /// 404: usually a wrong `api_base_url`
    #[error("Auth endpoint not found (check the API base URL): {0}")]
    NotFound(String),

    #[error("Too many sign-in attempts - please wait before retrying")]
    RateLimited,

    #[error("Auth server error: {0}")]
    ServerError(String),

    #[error("Could not reach auth server: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Unexpected response from auth server: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// True for failures where the request never produced an HTTP response.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::NetworkError(_))
    }
}
