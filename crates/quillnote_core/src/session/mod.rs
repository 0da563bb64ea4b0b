//! Auth session context.
//!
//! # Responsibility
//! - Hold the process-wide signed-in identity.
//! - Deliver identity changes (sign-in, refresh, sign-out) to subscribers.
//!
//! # Invariants
//! - A new subscription reads the current identity immediately; there is no
//!   separate "still loading" probe and no gap it could race into.
//! - Dropping a subscription is the whole teardown story for a subscriber.

use crate::model::note::UserId;
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

/// Signed-in identity delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
}

impl UserProfile {
    /// Creates a profile with a generated id.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// Subscription handle. `borrow` reads the current identity; `changed`
/// awaits the next transition.
pub type SessionWatch = watch::Receiver<Option<UserProfile>>;

/// Publisher side of the session lifecycle.
pub struct SessionContext {
    identity: watch::Sender<Option<UserProfile>>,
}

impl SessionContext {
    /// Starts a context with nobody signed in.
    pub fn new() -> Self {
        let (identity, _) = watch::channel(None);
        Self { identity }
    }

    /// Publishes a signed-in identity. Also used for refreshes of the same
    /// identity; subscribers see those as ordinary transitions.
    pub fn sign_in(&self, user: UserProfile) {
        info!(
            "event=session_change module=session status=ok state=signed_in user_id={}",
            user.id
        );
        self.identity.send_replace(Some(user));
    }

    /// Publishes a signed-out state.
    pub fn sign_out(&self) {
        info!("event=session_change module=session status=ok state=signed_out");
        self.identity.send_replace(None);
    }

    /// Current identity without subscribing.
    pub fn current(&self) -> Option<UserProfile> {
        self.identity.borrow().clone()
    }

    /// Subscribes to identity transitions. The receiver's current value is
    /// the authoritative initial state, not a placeholder.
    pub fn subscribe(&self) -> SessionWatch {
        self.identity.subscribe()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
