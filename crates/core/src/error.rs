use clinic_store::StoreError;

/// Failure taxonomy for clinic operations.
///
/// Variants are grouped by how they surface to the caller: validation,
/// not-found, authorization, and auth-specific failures carry user-visible
/// meaning; integrity, storage, I/O, and hashing failures are internal and
/// are reported generically, with full detail logged server-side. The
/// mapping to user-visible messages lives in [`crate::response`].
#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    /// Missing or malformed input, detected before any store access
    #[error("invalid input: {0}")]
    Validation(String),

    /// A referenced record is absent; the message is user-visible
    #[error("{0}")]
    NotFound(String),

    /// The session's role or identity does not permit the operation
    #[error("unauthorized")]
    Unauthorized,

    /// Login supplied a role that does not match the stored account
    #[error("wrong user type")]
    WrongRole,

    /// Password verification failed
    #[error("wrong password")]
    WrongPassword,

    /// Registration supplied an email that is already taken
    #[error("email already in use")]
    EmailTaken,

    /// A date string could not be parsed
    #[error("invalid date format: {0}")]
    InvalidDate(String),

    /// An account exists but its linked data is inconsistent
    #[error("data integrity error: {0}")]
    Integrity(String),

    /// The underlying document store failed
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// A filesystem operation outside the store failed
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// Password hashing or verification could not run
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
}

/// Result type for clinic operations.
pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
