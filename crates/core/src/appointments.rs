//! Appointment scheduling, editing, cancellation, and listing.

use crate::db::{ClinicDb, IDX_PATIENT};
use crate::entities::{Appointment, AppointmentStatus};
use crate::response::Response;
use crate::{ClinicError, ClinicResult};
use chrono::{NaiveDateTime, Utc};
use clinic_id::RecordId;
use serde::Serialize;

/// Wall-clock appointment times are entered without seconds; accepting the
/// seconds form keeps re-submitted listing values parseable.
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";
const DATE_FORMAT_WITH_SECONDS: &str = "%Y-%m-%d %H:%M:%S";

fn parse_appointment_date(raw: &str) -> ClinicResult<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, DATE_FORMAT_WITH_SECONDS))
        .map_err(|_| ClinicError::InvalidDate(raw.to_owned()))
}

/// Input for scheduling a new appointment. Both ids are role-profile ids.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub doctor_id: RecordId,
    pub patient_id: RecordId,
    /// `YYYY-MM-DD HH:MM`, seconds optional
    pub date: String,
    pub reason: String,
    pub urgent: bool,
    pub notes: Option<String>,
}

/// Partial update; absent fields keep their stored value. The doctor and
/// patient references are immutable after creation.
#[derive(Debug, Clone, Default)]
pub struct AppointmentUpdate {
    pub date: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// Listing row: the stored appointment enriched with the doctor's display
/// name. `doctor_name` is `None` when the doctor profile has vanished.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    pub id: RecordId,
    pub doctor_id: RecordId,
    pub doctor_name: Option<String>,
    pub patient_id: RecordId,
    pub date: NaiveDateTime,
    pub reason: String,
    pub status: AppointmentStatus,
    pub notes: String,
    pub urgent: bool,
}

/// Creates an appointment, returning the scheduled record.
pub fn schedule(db: &mut ClinicDb, req: &ScheduleRequest) -> Response<AppointmentView> {
    Response::from_result(try_schedule(db, req))
}

fn try_schedule(db: &mut ClinicDb, req: &ScheduleRequest) -> ClinicResult<AppointmentView> {
    let reason = req.reason.trim();
    if reason.is_empty() {
        return Err(ClinicError::Validation("incomplete data".into()));
    }
    let date = parse_appointment_date(&req.date)?;

    if db.doctors.get(&req.doctor_id).is_none() {
        return Err(ClinicError::NotFound("doctor not found".into()));
    }
    if db.patients.get(&req.patient_id).is_none() {
        return Err(ClinicError::NotFound("patient not found".into()));
    }

    let appointment = Appointment {
        id: RecordId::new(),
        doctor_id: req.doctor_id.clone(),
        patient_id: req.patient_id.clone(),
        date,
        reason: reason.to_owned(),
        status: AppointmentStatus::Scheduled,
        notes: req.notes.as_deref().unwrap_or("").trim().to_owned(),
        urgent: req.urgent,
        created_at: Utc::now(),
    };

    let inserted = db.appointments.insert(appointment)?;
    Ok(to_view(db, inserted))
}

fn to_view(db: &ClinicDb, appointment: Appointment) -> AppointmentView {
    let doctor_name = db
        .doctors
        .get(&appointment.doctor_id)
        .map(|d| d.name.to_string());
    AppointmentView {
        id: appointment.id,
        doctor_id: appointment.doctor_id,
        doctor_name,
        patient_id: appointment.patient_id,
        date: appointment.date,
        reason: appointment.reason,
        status: appointment.status,
        notes: appointment.notes,
        urgent: appointment.urgent,
    }
}

/// Applies a partial update to an existing appointment.
pub fn update(db: &mut ClinicDb, id: &RecordId, changes: &AppointmentUpdate) -> Response<()> {
    match try_update(db, id, changes) {
        Ok(()) => Response::success(),
        Err(err) => Response::from_result(Err(err)),
    }
}

fn try_update(db: &mut ClinicDb, id: &RecordId, changes: &AppointmentUpdate) -> ClinicResult<()> {
    // Parse before mutating so a bad date leaves the record untouched.
    let new_date = changes
        .date
        .as_deref()
        .map(parse_appointment_date)
        .transpose()?;

    if let Some(reason) = changes.reason.as_deref() {
        if reason.trim().is_empty() {
            return Err(ClinicError::Validation("incomplete data".into()));
        }
    }

    let updated = db.appointments.update(id, |appointment| {
        if let Some(date) = new_date {
            appointment.date = date;
        }
        if let Some(reason) = changes.reason.as_deref() {
            appointment.reason = reason.trim().to_owned();
        }
        if let Some(notes) = changes.notes.as_deref() {
            appointment.notes = notes.trim().to_owned();
        }
    })?;

    if !updated {
        return Err(ClinicError::NotFound("appointment not found".into()));
    }
    Ok(())
}

/// Cancels (hard-deletes) an appointment. Cancelling an appointment that is
/// already gone reports success.
pub fn cancel(db: &mut ClinicDb, id: &RecordId) -> Response<()> {
    match db.appointments.remove(id) {
        Ok(_) => Response::success(),
        Err(err) => Response::from_result(Err(err.into())),
    }
}

/// Lists a patient's appointments, soonest first, each row enriched with the
/// doctor's display name.
pub fn list_for_patient(db: &ClinicDb, patient_id: &RecordId) -> Response<Vec<AppointmentView>> {
    Response::from_result(try_list_for_patient(db, patient_id))
}

fn try_list_for_patient(
    db: &ClinicDb,
    patient_id: &RecordId,
) -> ClinicResult<Vec<AppointmentView>> {
    let mut appointments = db
        .appointments
        .find_by(IDX_PATIENT, &patient_id.to_string())?;
    appointments.sort_by(|a, b| a.date.cmp(&b.date));

    Ok(appointments.into_iter().map(|a| to_view(db, a)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{doctor_request, patient_request, setup, signed_in};
    use crate::Session;
    use crate::{ClinicConfig, ClinicDb};
    use tempfile::TempDir;

    fn clinic_with_pair() -> (TempDir, ClinicConfig, ClinicDb, Session, Session) {
        let (tmp, cfg, mut db) = setup();
        let patient = signed_in(&mut db, &cfg, &patient_request("ana@x.com", "secret1"));
        let doctor = signed_in(&mut db, &cfg, &doctor_request("dr@x.com", "secret1"));
        (tmp, cfg, db, patient, doctor)
    }

    fn request_at(doctor: &Session, patient: &Session, date: &str) -> ScheduleRequest {
        ScheduleRequest {
            doctor_id: doctor.profile_id.clone(),
            patient_id: patient.profile_id.clone(),
            date: date.to_string(),
            reason: "checkup".to_string(),
            urgent: false,
            notes: None,
        }
    }

    #[test]
    fn test_schedule_edit_cancel_lifecycle() {
        // Scenario B
        let (_tmp, _cfg, mut db, patient, doctor) = clinic_with_pair();

        let scheduled = schedule(&mut db, &request_at(&doctor, &patient, "2026-09-01 10:00"));
        assert!(scheduled.success);

        // The response carries the scheduled record itself, not just an id.
        let created = scheduled.data.unwrap();
        assert_eq!(created.reason, "checkup");
        assert_eq!(created.status, AppointmentStatus::Scheduled);
        assert_eq!(created.doctor_name.as_deref(), Some("Dr. Lima"));
        assert_eq!(
            created.date,
            NaiveDateTime::parse_from_str("2026-09-01 10:00", DATE_FORMAT).unwrap()
        );
        let id = created.id;

        let listed = list_for_patient(&db, &patient.profile_id).data.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].doctor_name.as_deref(), Some("Dr. Lima"));

        let edited = update(
            &mut db,
            &id,
            &AppointmentUpdate {
                date: Some("2026-09-02 11:30".to_string()),
                reason: None,
                notes: Some("bring exam results".to_string()),
            },
        );
        assert!(edited.success);

        let after_edit = list_for_patient(&db, &patient.profile_id).data.unwrap();
        assert_eq!(
            after_edit[0].date,
            NaiveDateTime::parse_from_str("2026-09-02 11:30", DATE_FORMAT).unwrap()
        );
        assert_eq!(after_edit[0].reason, "checkup");
        assert_eq!(after_edit[0].notes, "bring exam results");

        assert!(cancel(&mut db, &id).success);
        assert!(list_for_patient(&db, &patient.profile_id)
            .data
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_schedule_rejects_invalid_date() {
        let (_tmp, _cfg, mut db, patient, doctor) = clinic_with_pair();

        let response = schedule(&mut db, &request_at(&doctor, &patient, "01/09/2026 10:00"));

        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("invalid date format"));
        assert!(db.appointments.is_empty());
    }

    #[test]
    fn test_schedule_accepts_seconds() {
        let (_tmp, _cfg, mut db, patient, doctor) = clinic_with_pair();

        let response = schedule(&mut db, &request_at(&doctor, &patient, "2026-09-01 10:00:30"));

        assert!(response.success);
    }

    #[test]
    fn test_schedule_requires_existing_profiles() {
        let (_tmp, _cfg, mut db, patient, doctor) = clinic_with_pair();

        let mut missing_doctor = request_at(&doctor, &patient, "2026-09-01 10:00");
        missing_doctor.doctor_id = RecordId::new();
        let response = schedule(&mut db, &missing_doctor);
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("doctor not found"));

        let mut missing_patient = request_at(&doctor, &patient, "2026-09-01 10:00");
        missing_patient.patient_id = RecordId::new();
        let response = schedule(&mut db, &missing_patient);
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("patient not found"));
    }

    #[test]
    fn test_schedule_requires_reason() {
        let (_tmp, _cfg, mut db, patient, doctor) = clinic_with_pair();

        let mut request = request_at(&doctor, &patient, "2026-09-01 10:00");
        request.reason = "   ".to_string();
        let response = schedule(&mut db, &request);

        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("incomplete data"));
    }

    #[test]
    fn test_update_missing_appointment() {
        let (_tmp, _cfg, mut db, _patient, _doctor) = clinic_with_pair();

        let response = update(
            &mut db,
            &RecordId::new(),
            &AppointmentUpdate {
                reason: Some("new reason".to_string()),
                ..Default::default()
            },
        );

        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("appointment not found"));
    }

    #[test]
    fn test_update_with_bad_date_leaves_record_untouched() {
        let (_tmp, _cfg, mut db, patient, doctor) = clinic_with_pair();
        let id = schedule(&mut db, &request_at(&doctor, &patient, "2026-09-01 10:00"))
            .data
            .unwrap()
            .id;

        let response = update(
            &mut db,
            &id,
            &AppointmentUpdate {
                date: Some("not a date".to_string()),
                reason: Some("changed".to_string()),
                ..Default::default()
            },
        );

        assert!(!response.success);
        let stored = db.appointments.get(&id).unwrap();
        assert_eq!(stored.reason, "checkup");
    }

    #[test]
    fn test_cancel_missing_appointment_is_success() {
        // P4
        let (_tmp, _cfg, mut db, _patient, _doctor) = clinic_with_pair();

        let response = cancel(&mut db, &RecordId::new());

        assert!(response.success);
    }

    #[test]
    fn test_listing_is_sorted_by_date_ascending() {
        let (_tmp, _cfg, mut db, patient, doctor) = clinic_with_pair();

        schedule(&mut db, &request_at(&doctor, &patient, "2026-09-03 09:00"));
        schedule(&mut db, &request_at(&doctor, &patient, "2026-09-01 14:00"));
        schedule(&mut db, &request_at(&doctor, &patient, "2026-09-02 08:30"));

        let dates: Vec<NaiveDateTime> = list_for_patient(&db, &patient.profile_id)
            .data
            .unwrap()
            .into_iter()
            .map(|a| a.date)
            .collect();

        assert!(dates.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(dates.len(), 3);
    }

    #[test]
    fn test_vanished_doctor_yields_no_name() {
        let (_tmp, _cfg, mut db, patient, doctor) = clinic_with_pair();
        schedule(&mut db, &request_at(&doctor, &patient, "2026-09-01 10:00"));

        db.doctors.remove(&doctor.profile_id).unwrap();

        let listed = list_for_patient(&db, &patient.profile_id).data.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].doctor_name.is_none());
    }
}
