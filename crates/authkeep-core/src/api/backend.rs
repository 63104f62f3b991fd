use std::future::Future;

use crate::models::{SignInCredentials, SignInResponse, User};

use super::ApiError;

/// The backend calls a `SessionStore` depends on.
///
/// `ApiClient` is the HTTP implementation. The futures must be `Send`
/// because the store drives them from spawned tokio tasks.
pub trait AuthBackend: Send + Sync + 'static {
    /// Fetch the profile belonging to `token`.
    fn fetch_user(&self, token: &str) -> impl Future<Output = Result<User, ApiError>> + Send;

    /// Exchange credentials for a token and profile.
    fn sign_in(
        &self,
        credentials: &SignInCredentials,
    ) -> impl Future<Output = Result<SignInResponse, ApiError>> + Send;

    /// Tell the backend the session is over. The response body is ignored.
    fn sign_out(&self, token: Option<&str>) -> impl Future<Output = Result<(), ApiError>> + Send;
}
