//! Clinic management core.
//!
//! The operational layer of the clinic application: account registration and
//! login, the patient roster, appointment scheduling, and medical file
//! uploads, persisted through the journal-backed collections of
//! `clinic-store`. Every public handler returns a [`Response`] envelope; no
//! error type crosses the presentation boundary.

pub mod appointments;
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
mod error;
pub mod files;
pub mod response;
pub mod roster;
pub mod session;

pub use config::{ClinicConfig, DEFAULT_BCRYPT_COST};
pub use db::ClinicDb;
pub use error::{ClinicError, ClinicResult};
pub use response::Response;
pub use session::{Session, SessionManager};
