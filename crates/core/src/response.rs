//! The uniform handler response envelope.
//!
//! Every operation the presentation layer can invoke returns
//! `{success, message?, canceled?, data?}`. No handler lets an error cross
//! this boundary: internal failures are logged with full detail and mapped
//! to a generic user-visible message, never to raw error text.

use crate::{ClinicError, ClinicResult};
use serde::Serialize;

fn is_false(b: &bool) -> bool {
    !*b
}

/// Result envelope consumed by the presentation layer.
#[derive(Debug, Serialize)]
pub struct Response<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub canceled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Response<T> {
    /// A successful response carrying a payload.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            canceled: false,
            data: Some(data),
        }
    }

    /// A successful response with no payload.
    pub fn success() -> Self {
        Self {
            success: true,
            message: None,
            canceled: false,
            data: None,
        }
    }

    /// A failed response with a user-visible message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            canceled: false,
            data: None,
        }
    }

    /// The user dismissed a dialog; not an error.
    pub fn canceled() -> Self {
        Self {
            success: false,
            message: None,
            canceled: true,
            data: None,
        }
    }

    /// Maps a handler result into the envelope, logging internal failures
    /// server-side and translating the error into its user-visible message.
    pub fn from_result(result: ClinicResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => {
                log_internal(&err);
                Self::fail(user_message(&err))
            }
        }
    }
}

/// Logs failures whose detail must stay server-side.
fn log_internal(err: &ClinicError) {
    match err {
        ClinicError::Storage(_) | ClinicError::Io(_) | ClinicError::PasswordHash(_) => {
            tracing::error!("internal failure: {err}");
        }
        ClinicError::Integrity(detail) => {
            tracing::error!("data integrity failure: {detail}");
        }
        _ => {}
    }
}

/// The user-visible message for each error class.
///
/// Validation, not-found, and auth failures carry their own text; internal
/// failures collapse to a generic message so raw error detail never reaches
/// the caller.
pub(crate) fn user_message(err: &ClinicError) -> String {
    match err {
        ClinicError::Validation(msg) => msg.clone(),
        ClinicError::NotFound(msg) => msg.clone(),
        ClinicError::Unauthorized => "unauthorized".to_string(),
        ClinicError::WrongRole => "wrong user type".to_string(),
        ClinicError::WrongPassword => "wrong password".to_string(),
        ClinicError::EmailTaken => "email already in use".to_string(),
        ClinicError::InvalidDate(_) => "invalid date format".to_string(),
        ClinicError::Integrity(_) => "critical error: account data is inconsistent".to_string(),
        ClinicError::Storage(_) | ClinicError::Io(_) | ClinicError::PasswordHash(_) => {
            "internal server error".to_string()
        }
    }
}
