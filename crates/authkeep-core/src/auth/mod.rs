//! Durable storage for the session's bearer token.
//!
//! This module provides:
//! - `TokenStore`: the key-value interface the session store persists through
//! - `FileTokenStore`: JSON file in the cache directory
//! - `KeyringTokenStore`: OS-level credential storage via keyring
//! - `MemoryTokenStore`: in-process storage for ephemeral sessions
//!
//! Every implementation keeps exactly one entry, under [`TOKEN_KEY`].

pub mod credentials;
pub mod file;
pub mod memory;

use anyhow::Result;

pub use credentials::KeyringTokenStore;
pub use file::{FileTokenStore, StoredToken};
pub use memory::MemoryTokenStore;

/// Key under which the bearer token is persisted
pub const TOKEN_KEY: &str = "token";

/// Synchronous key-value storage for the bearer token.
///
/// A token is present iff the client believes a prior sign-in succeeded.
pub trait TokenStore: Send + Sync {
    /// Read the persisted token, if any
    fn get(&self) -> Result<Option<String>>;

    /// Persist `token`, replacing any previous value
    fn set(&self, token: &str) -> Result<()>;

    /// Remove the persisted token. Removing an absent token is not an error.
    fn remove(&self) -> Result<()>;
}

impl<T: TokenStore + ?Sized> TokenStore for Box<T> {
    fn get(&self) -> Result<Option<String>> {
        (**self).get()
    }

    fn set(&self, token: &str) -> Result<()> {
        (**self).set(token)
    }

    fn remove(&self) -> Result<()> {
        (**self).remove()
    }
}
