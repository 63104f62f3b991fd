//! Data models exchanged with the backend.
//!
//! - `User`: the authenticated user's profile snapshot
//! - `SignInCredentials`: email/password pair posted to the sign-in endpoint
//! - `SignInResponse`: token and profile returned by a successful sign-in

pub mod user;

pub use user::{SignInCredentials, SignInResponse, User};
