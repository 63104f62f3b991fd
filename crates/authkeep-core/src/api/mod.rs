//! REST API client module for the authentication backend.
//!
//! This module provides the `ApiClient` for the three endpoints the session
//! depends on (`GET /api/user`, `POST /api/signin`, `POST /api/signout`) and
//! the `AuthBackend` trait the session store is written against.
//!
//! Authenticated requests carry the persisted token as a bearer credential.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::AuthBackend;
pub use client::ApiClient;
pub use error::ApiError;
