//! Client-side authentication session.
//!
//! `SessionStore` owns the session state and runs the startup restore. The
//! state moves between three phases:
//!
//! | Phase | loading_user_data | is_authenticated |
//! |---|---|---|
//! | Bootstrapping | true | false |
//! | Unauthenticated | false | false |
//! | Authenticated | false | true |
//!
//! Only the restore attempt leaves `Bootstrapping`; sign-in and sign-out
//! move between the other two any number of times.

pub mod error;
pub mod state;
pub mod store;

pub use error::AuthError;
pub use state::{SessionPhase, SessionState};
pub use store::SessionStore;
