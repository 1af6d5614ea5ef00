//! The five-collection clinic database.
//!
//! Each collection lives in its own journal file under
//! `<data_dir>/databases/`. Opening registers the indexes the handlers rely
//! on: uniqueness of account emails and of the 1:1 account/profile links is
//! enforced here, not by any cross-collection constraint.

use crate::config::ClinicConfig;
use crate::entities::{Account, Appointment, DoctorProfile, FileRecord, PatientProfile};
use crate::ClinicResult;
use clinic_store::Collection;
use std::fs;

/// Unique index on `Account.email`.
pub const IDX_EMAIL: &str = "email";
/// Unique index on each profile collection's `account_id`.
pub const IDX_ACCOUNT: &str = "account_id";
/// Non-unique index on appointment/file `doctor_id`.
pub const IDX_DOCTOR: &str = "doctor_id";
/// Non-unique index on appointment/file `patient_id`.
pub const IDX_PATIENT: &str = "patient_id";
/// Non-unique index on `Appointment.date`.
pub const IDX_DATE: &str = "date";
/// Non-unique index on `FileRecord.upload_date`.
pub const IDX_UPLOAD_DATE: &str = "upload_date";

/// Handle to the opened collections.
pub struct ClinicDb {
    pub accounts: Collection<Account>,
    pub patients: Collection<PatientProfile>,
    pub doctors: Collection<DoctorProfile>,
    pub appointments: Collection<Appointment>,
    pub files: Collection<FileRecord>,
}

impl ClinicDb {
    /// Opens (creating on first use) every collection under the configured
    /// databases directory.
    pub fn open(cfg: &ClinicConfig) -> ClinicResult<Self> {
        let dir = cfg.databases_dir();
        fs::create_dir_all(&dir)?;

        let accounts = Collection::options()
            .unique_index(IDX_EMAIL, |a: &Account| Some(a.email.as_str().to_owned()))
            .open(dir.join("accounts.db"))?;

        let patients = Collection::options()
            .unique_index(IDX_ACCOUNT, |p: &PatientProfile| {
                Some(p.account_id.to_string())
            })
            .open(dir.join("patients.db"))?;

        let doctors = Collection::options()
            .unique_index(IDX_ACCOUNT, |d: &DoctorProfile| {
                Some(d.account_id.to_string())
            })
            .open(dir.join("doctors.db"))?;

        let appointments = Collection::options()
            .index(IDX_DOCTOR, |a: &Appointment| Some(a.doctor_id.to_string()))
            .index(IDX_PATIENT, |a: &Appointment| Some(a.patient_id.to_string()))
            .index(IDX_DATE, |a: &Appointment| Some(a.date.to_string()))
            .open(dir.join("appointments.db"))?;

        let files = Collection::options()
            .index(IDX_PATIENT, |f: &FileRecord| Some(f.patient_id.to_string()))
            .index(IDX_DOCTOR, |f: &FileRecord| Some(f.doctor_id.to_string()))
            .index(IDX_UPLOAD_DATE, |f: &FileRecord| {
                Some(f.upload_date.to_rfc3339())
            })
            .open(dir.join("medical_files.db"))?;

        Ok(Self {
            accounts,
            patients,
            doctors,
            appointments,
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_databases_directory() {
        let temp = TempDir::new().unwrap();
        let cfg = ClinicConfig::new(temp.path().to_path_buf()).unwrap();

        let db = ClinicDb::open(&cfg).unwrap();

        assert!(cfg.databases_dir().is_dir());
        assert!(db.accounts.is_empty());
        assert!(db.patients.is_empty());
        assert!(db.doctors.is_empty());
        assert!(db.appointments.is_empty());
        assert!(db.files.is_empty());
    }

    #[test]
    fn test_collection_files_use_expected_names() {
        let temp = TempDir::new().unwrap();
        let cfg = ClinicConfig::new(temp.path().to_path_buf()).unwrap();

        let db = ClinicDb::open(&cfg).unwrap();

        let names: Vec<PathBuf> = [
            db.accounts.path(),
            db.patients.path(),
            db.doctors.path(),
            db.appointments.path(),
            db.files.path(),
        ]
        .iter()
        .map(|p| p.to_path_buf())
        .collect();

        assert!(names[0].ends_with("accounts.db"));
        assert!(names[1].ends_with("patients.db"));
        assert!(names[2].ends_with("doctors.db"));
        assert!(names[3].ends_with("appointments.db"));
        assert!(names[4].ends_with("medical_files.db"));
    }
}
