//! API client for the authentication backend.
//!
//! This module provides the `ApiClient` struct for fetching the current user
//! and for exchanging credentials at the sign-in and sign-out endpoints.

use std::time::Duration;

use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;
use crate::models::{SignInCredentials, SignInResponse, User};

use super::{ApiError, AuthBackend};

// ============================================================================
// Constants
// ============================================================================

/// Path of the current-user endpoint
const USER_PATH: &str = "/api/user";

/// Path of the sign-in endpoint
const SIGN_IN_PATH: &str = "/api/signin";

/// Path of the sign-out endpoint
const SIGN_OUT_PATH: &str = "/api/signout";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the authentication backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from the configured base URL and timeout
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch the profile of the user owning `token`
    pub async fn fetch_user(&self, token: &str) -> Result<User, ApiError> {
        let url = self.url(USER_PATH);
        debug!(url = %url, "Fetching current user");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    /// Exchange credentials for a bearer token and the user's profile
    pub async fn sign_in(&self, credentials: &SignInCredentials) -> Result<SignInResponse, ApiError> {
        let url = self.url(SIGN_IN_PATH);
        debug!(url = %url, email = %credentials.email, "Signing in");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(credentials)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    /// Notify the backend that the session has ended.
    /// The response body is not inspected.
    pub async fn sign_out(&self, token: Option<&str>) -> Result<(), ApiError> {
        let url = self.url(SIGN_OUT_PATH);
        debug!(url = %url, has_token = token.is_some(), "Signing out");

        let mut request = self.client.post(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

impl AuthBackend for ApiClient {
    async fn fetch_user(&self, token: &str) -> Result<User, ApiError> {
        ApiClient::fetch_user(self, token).await
    }

    async fn sign_in(&self, credentials: &SignInCredentials) -> Result<SignInResponse, ApiError> {
        ApiClient::sign_in(self, credentials).await
    }

    async fn sign_out(&self, token: Option<&str>) -> Result<(), ApiError> {
        ApiClient::sign_out(self, token).await
    }
}
