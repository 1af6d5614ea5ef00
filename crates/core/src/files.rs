//! Medical file uploads: byte storage, metadata, listing, and deletion.
//!
//! Bytes live under the sharded per-patient uploads directory; metadata
//! lives in the `medical_files` collection. The bytes are copied before the
//! metadata insert, so a failed copy leaves no dangling metadata. Deletion
//! removes metadata first and treats the byte removal as best-effort: a
//! record without bytes is harmless, bytes without a record would be
//! unreachable.

use crate::db::{ClinicDb, IDX_DOCTOR, IDX_PATIENT};
use crate::entities::{FileRecord, Role};
use crate::response::Response;
use crate::session::Session;
use crate::{ClinicConfig, ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use clinic_id::RecordId;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Input for uploading a file on a patient's behalf.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub patient_id: RecordId,
    pub doctor_id: RecordId,
    /// Where the bytes currently are (picker result or CLI argument)
    pub source_path: PathBuf,
    /// Display name; only its final path component is kept
    pub file_name: String,
    pub description: String,
}

/// Listing row. The stored file name and on-disk location are internal and
/// structurally absent here.
#[derive(Debug, Clone, Serialize)]
pub struct FileView {
    pub id: RecordId,
    pub patient_id: RecordId,
    pub doctor_id: RecordId,
    pub doctor_name: Option<String>,
    pub original_file_name: String,
    pub description: String,
    pub media_type: Option<String>,
    pub size_bytes: u64,
    pub upload_date: DateTime<Utc>,
}

/// The external file-picker collaborator. The desktop shell backs this with
/// a native dialog; tests substitute a canned implementation.
pub trait FilePicker {
    /// `None` means the user dismissed the dialog.
    fn pick(&self) -> Option<PathBuf>;
}

/// Runs the picker and wraps dismissal in the canceled envelope.
pub fn pick_upload_source(picker: &dyn FilePicker) -> Response<PathBuf> {
    match picker.pick() {
        Some(path) => Response::ok(path),
        None => Response::canceled(),
    }
}

/// Copies the bytes into the patient's uploads directory and records the
/// metadata. Returns the created record as a [`FileView`].
pub fn upload(db: &mut ClinicDb, cfg: &ClinicConfig, req: &UploadRequest) -> Response<FileView> {
    Response::from_result(try_upload(db, cfg, req))
}

fn try_upload(db: &mut ClinicDb, cfg: &ClinicConfig, req: &UploadRequest) -> ClinicResult<FileView> {
    let original_name = sanitize_file_name(&req.file_name)
        .ok_or_else(|| ClinicError::Validation("incomplete data".into()))?;

    if db.patients.get(&req.patient_id).is_none() {
        return Err(ClinicError::NotFound("patient not found".into()));
    }
    if db.doctors.get(&req.doctor_id).is_none() {
        return Err(ClinicError::NotFound("doctor not found".into()));
    }

    let upload_date = Utc::now();
    let stored_file_name = format!(
        "{}-{}",
        upload_date.format("%Y%m%dT%H%M%S%.3fZ"),
        original_name
    );

    let patient_dir = req.patient_id.sharded_dir(&cfg.uploads_dir());
    fs::create_dir_all(&patient_dir)?;
    let destination = patient_dir.join(&stored_file_name);

    // Bytes first. If this fails nothing was recorded.
    let size_bytes = fs::copy(&req.source_path, &destination)?;
    let media_type = infer::get_from_path(&destination)
        .ok()
        .flatten()
        .map(|kind| kind.mime_type().to_owned());

    let record = FileRecord {
        id: RecordId::new(),
        patient_id: req.patient_id.clone(),
        doctor_id: req.doctor_id.clone(),
        original_file_name: original_name,
        stored_file_name,
        description: req.description.trim().to_owned(),
        media_type,
        size_bytes,
        upload_date,
    };

    match db.files.insert(record) {
        Ok(inserted) => Ok(to_view(db, inserted)),
        Err(insert_err) => {
            if let Err(cleanup_err) = fs::remove_file(&destination) {
                tracing::warn!(
                    "could not remove orphaned upload {}: {}",
                    destination.display(),
                    cleanup_err
                );
            }
            Err(insert_err.into())
        }
    }
}

/// Keeps only the final path component, dropping any directory part a caller
/// smuggled into the display name.
fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = Path::new(raw.trim())
        .file_name()?
        .to_string_lossy()
        .into_owned();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Lists a patient's files, newest upload first.
///
/// Patients see their own files only. Doctors see any patient's files
/// unless `restrict_doctor_file_access` is set, which additionally requires
/// a shared appointment with the patient.
pub fn list_for_patient(
    db: &ClinicDb,
    cfg: &ClinicConfig,
    session: &Session,
    patient_id: &RecordId,
) -> Response<Vec<FileView>> {
    Response::from_result(try_list_for_patient(db, cfg, session, patient_id))
}

fn try_list_for_patient(
    db: &ClinicDb,
    cfg: &ClinicConfig,
    session: &Session,
    patient_id: &RecordId,
) -> ClinicResult<Vec<FileView>> {
    authorize_file_access(db, cfg, session, patient_id)?;

    let mut records = db.files.find_by(IDX_PATIENT, &patient_id.to_string())?;
    records.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));

    Ok(records.into_iter().map(|r| to_view(db, r)).collect())
}

fn to_view(db: &ClinicDb, record: FileRecord) -> FileView {
    let doctor_name = db
        .doctors
        .get(&record.doctor_id)
        .map(|d| d.name.to_string());
    FileView {
        id: record.id,
        patient_id: record.patient_id,
        doctor_id: record.doctor_id,
        doctor_name,
        original_file_name: record.original_file_name,
        description: record.description,
        media_type: record.media_type,
        size_bytes: record.size_bytes,
        upload_date: record.upload_date,
    }
}

fn authorize_file_access(
    db: &ClinicDb,
    cfg: &ClinicConfig,
    session: &Session,
    patient_id: &RecordId,
) -> ClinicResult<()> {
    match session.role {
        Role::Patient => {
            if &session.profile_id != patient_id {
                return Err(ClinicError::Unauthorized);
            }
        }
        Role::Doctor => {
            if cfg.restrict_doctor_file_access() {
                let shares_appointment = db
                    .appointments
                    .find_by(IDX_DOCTOR, &session.profile_id.to_string())?
                    .iter()
                    .any(|a| &a.patient_id == patient_id);
                if !shares_appointment {
                    return Err(ClinicError::Unauthorized);
                }
            }
        }
    }
    Ok(())
}

/// Deletes one file: metadata first, then the bytes best-effort.
pub fn delete_file(db: &mut ClinicDb, cfg: &ClinicConfig, id: &RecordId) -> Response<()> {
    match try_delete_file(db, cfg, id) {
        Ok(()) => Response::success(),
        Err(err) => Response::from_result(Err(err)),
    }
}

fn try_delete_file(db: &mut ClinicDb, cfg: &ClinicConfig, id: &RecordId) -> ClinicResult<()> {
    let record = db
        .files
        .get(id)
        .ok_or_else(|| ClinicError::NotFound("file not found".into()))?;

    db.files.remove(id)?;
    remove_bytes(cfg, &record);
    Ok(())
}

/// Deletes every file belonging to a patient. Returns the number of records
/// removed; zero matches is a success.
pub fn delete_all_for_patient(
    db: &mut ClinicDb,
    cfg: &ClinicConfig,
    patient_id: &RecordId,
) -> Response<usize> {
    Response::from_result(try_delete_all_for_patient(db, cfg, patient_id))
}

fn try_delete_all_for_patient(
    db: &mut ClinicDb,
    cfg: &ClinicConfig,
    patient_id: &RecordId,
) -> ClinicResult<usize> {
    let records = db.files.find_by(IDX_PATIENT, &patient_id.to_string())?;
    for record in &records {
        db.files.remove(&record.id)?;
        remove_bytes(cfg, record);
    }
    Ok(records.len())
}

fn remove_bytes(cfg: &ClinicConfig, record: &FileRecord) {
    let path = record
        .patient_id
        .sharded_dir(&cfg.uploads_dir())
        .join(&record.stored_file_name);
    if let Err(err) = fs::remove_file(&path) {
        tracing::warn!(
            "stored file missing or unremovable at {}: {}",
            path.display(),
            err
        );
    }
}

/// The platform collaborator that hands a file to the OS default viewer.
pub trait ExternalOpener {
    fn open(&self, path: &Path) -> std::io::Result<()>;
}

/// Spawns the platform opener detached.
pub struct SystemOpener;

impl ExternalOpener for SystemOpener {
    #[cfg(target_os = "linux")]
    fn open(&self, path: &Path) -> std::io::Result<()> {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
        Ok(())
    }

    #[cfg(target_os = "macos")]
    fn open(&self, path: &Path) -> std::io::Result<()> {
        std::process::Command::new("open").arg(path).spawn()?;
        Ok(())
    }

    #[cfg(target_os = "windows")]
    fn open(&self, path: &Path) -> std::io::Result<()> {
        std::process::Command::new("cmd")
            .args(["/C", "start", ""])
            .arg(path)
            .spawn()?;
        Ok(())
    }
}

/// Fire-and-forget open of a stored file in the OS default viewer. Failures
/// are logged, never returned; the viewer runs outside this process.
pub fn open_externally(opener: &dyn ExternalOpener, path: &Path) {
    if !path.exists() {
        tracing::error!("cannot open missing file: {}", path.display());
        return;
    }
    if let Err(err) = opener.open(path) {
        tracing::error!("external viewer failed for {}: {}", path.display(), err);
    }
}
