//! The authenticated-session model.
//!
//! A [`Session`] is the merged identity produced by a successful login:
//! account fields joined with the matching role profile. The password hash
//! is structurally absent, so it can never leak through a session value.
//!
//! Handlers take `&Session` explicitly; [`SessionManager`] exists only so
//! the application shell has somewhere to keep the one live session between
//! user actions.

use crate::entities::Role;
use chrono::{DateTime, NaiveDate, Utc};
use clinic_id::RecordId;
use clinic_types::EmailAddress;
use serde::Serialize;

/// Role-specific fields carried by a session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProfileDetails {
    Patient {
        birth_date: NaiveDate,
        health_plan: String,
    },
    Doctor {
        crm: String,
        specialty: String,
    },
}

/// The currently authenticated identity.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub account_id: RecordId,
    /// Id of the matching role-profile record
    pub profile_id: RecordId,
    pub role: Role,
    pub name: String,
    pub email: EmailAddress,
    pub created_at: DateTime<Utc>,
    pub profile: ProfileDetails,
}

/// Holds the single live session for the running application.
///
/// One session at a time; there is no concurrent multi-user access from one
/// process.
#[derive(Debug, Default)]
pub struct SessionManager {
    current: Option<Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a session after a successful login.
    pub fn set(&mut self, session: Session) {
        self.current = Some(session);
    }

    /// Clears the session. Idempotent; logging out twice is fine.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Returns a copy of the current session, if any. Mutating the returned
    /// value does not affect the stored session.
    pub fn current(&self) -> Option<Session> {
        self.current.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }
}
