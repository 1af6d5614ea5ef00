//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into the
//! handlers, rather than read from process-wide environment variables during
//! request handling.

use crate::{ClinicError, ClinicResult};
use std::path::{Path, PathBuf};

/// Directory under the data root holding the collection journal files.
const DATABASES_DIR_NAME: &str = "databases";

/// Directory under the data root holding uploaded file bytes.
const UPLOADS_DIR_NAME: &str = "uploads";

/// Default bcrypt cost factor, fixed at hash-creation time.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Clinic configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct ClinicConfig {
    data_dir: PathBuf,
    bcrypt_cost: u32,
    restrict_doctor_file_access: bool,
}

impl ClinicConfig {
    /// Create a new `ClinicConfig` rooted at `data_dir`.
    ///
    /// The directory itself is created lazily, on first store or upload use.
    pub fn new(data_dir: PathBuf) -> ClinicResult<Self> {
        if data_dir.as_os_str().is_empty() {
            return Err(ClinicError::Validation(
                "data directory cannot be empty".into(),
            ));
        }

        Ok(Self {
            data_dir,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            restrict_doctor_file_access: false,
        })
    }

    /// Overrides the bcrypt cost factor. Applies to newly created hashes
    /// only; verification reads the cost from the stored hash.
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Restricts doctors to listing files of patients they share an
    /// appointment with. The default is the permissive
    /// doctor-sees-all-patients policy.
    pub fn with_restricted_doctor_file_access(mut self, restricted: bool) -> Self {
        self.restrict_doctor_file_access = restricted;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn databases_dir(&self) -> PathBuf {
        self.data_dir.join(DATABASES_DIR_NAME)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join(UPLOADS_DIR_NAME)
    }

    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    pub fn restrict_doctor_file_access(&self) -> bool {
        self.restrict_doctor_file_access
    }
}
