//! Record identifiers and sharded-path utilities.
//!
//! Every persisted record in the clinic system carries a `RecordId`: a
//! *canonical* UUID representation of **32 lowercase hexadecimal characters**
//! (no hyphens).
//!
//! Uploaded file bytes are stored under per-patient directories derived from
//! the owning patient's `RecordId`.
//!
//! ## Canonical form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Identifiers supplied from outside the core (CLI arguments, request
//! payloads) must already be canonical; use [`RecordId::parse`] to validate.
//! Non-canonical values (uppercase, hyphenated, wrong length, non-hex) are
//! rejected.
//!
//! ## Sharded directory layout
//! For a canonical id `u`, file bytes live under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! This prevents very large fan-out in a single directory once the patient
//! population grows.

mod record_id;

pub use record_id::RecordId;

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
