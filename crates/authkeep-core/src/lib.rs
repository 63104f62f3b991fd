//! authkeep - client-side authentication session management.
//!
//! The crate is organized around [`SessionStore`], which restores a session
//! from a persisted bearer token on startup and exposes sign-in and sign-out
//! backed by three HTTP calls to the backend API.
//!
//! - [`api`]: `ApiClient` for the backend endpoints and the `AuthBackend` seam
//! - [`auth`]: durable token storage (file, OS keychain, memory)
//! - [`config`]: configuration file and environment overrides
//! - [`models`]: user and credential types
//! - [`session`]: the session state machine

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;

pub use api::{ApiClient, ApiError, AuthBackend};
pub use auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use config::{Config, TokenStoreKind};
pub use models::{SignInCredentials, SignInResponse, User};
pub use session::{AuthError, SessionPhase, SessionState, SessionStore};
