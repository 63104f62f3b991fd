use serde::{Deserialize, Serialize};

use crate::models::User;

/// Snapshot of the session as a rendering layer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    /// True only while the startup restore is pending
    pub loading_user_data: bool,
}

impl SessionState {
    /// Initial state, before the restore attempt resolves
    pub fn bootstrapping() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            loading_user_data: true,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.loading_user_data {
            SessionPhase::Bootstrapping
        } else if self.is_authenticated {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        }
    }

    pub(crate) fn authenticate(&mut self, user: User) {
        self.user = Some(user);
        self.is_authenticated = true;
    }

    pub(crate) fn clear(&mut self) {
        self.user = None;
        self.is_authenticated = false;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::bootstrapping()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Bootstrapping,
    Unauthenticated,
    Authenticated,
}

impl SessionPhase {
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionPhase::Bootstrapping => "Restoring session",
            SessionPhase::Unauthenticated => "Signed out",
            SessionPhase::Authenticated => "Signed in",
        }
    }
}
