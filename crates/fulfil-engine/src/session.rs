//! # Session
//!
//! Who is calling. Every engine operation takes a `&Session`; there is no
//! process-wide "current user".

use serde::{Deserialize, Serialize};

use fulfil_core::{Actor, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub actor: Actor,
    /// Caller-chosen key making a retried request safe to repeat.
    pub idempotency_key: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Session {
            actor: Actor::new(user_id, role),
            idempotency_key: None,
        }
    }

    pub fn customer(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Customer)
    }

    pub fn picker(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Picker)
    }

    pub fn driver(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Driver)
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    #[inline]
    pub fn user_id(&self) -> &str {
        &self.actor.user_id
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.actor.role
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.actor.is_admin()
    }

    /// `None` for admins, who bypass ownership guards; the caller's id
    /// otherwise.
    pub(crate) fn owner_guard(&self) -> Option<&str> {
        if self.is_admin() {
            None
        } else {
            Some(self.user_id())
        }
    }
}
