//! Doctor-facing patient roster.

use crate::db::ClinicDb;
use crate::entities::Role;
use crate::response::Response;
use crate::session::Session;
use crate::{ClinicError, ClinicResult};
use chrono::NaiveDate;
use clinic_id::RecordId;
use serde::Serialize;

/// One roster row. Contains no account or credential fields.
#[derive(Debug, Clone, Serialize)]
pub struct PatientSummary {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    pub birth_date: NaiveDate,
    pub health_plan: String,
}

/// Lists every registered patient, sorted by name. Doctors only.
pub fn list_all_patients(db: &ClinicDb, session: &Session) -> Response<Vec<PatientSummary>> {
    Response::from_result(try_list_all_patients(db, session))
}

fn try_list_all_patients(db: &ClinicDb, session: &Session) -> ClinicResult<Vec<PatientSummary>> {
    if session.role != Role::Doctor {
        return Err(ClinicError::Unauthorized);
    }

    let mut summaries: Vec<PatientSummary> = db
        .patients
        .find(|_| true)
        .into_iter()
        .map(|p| PatientSummary {
            id: p.id,
            name: p.name.to_string(),
            email: p.email.as_str().to_owned(),
            birth_date: p.birth_date,
            health_plan: p.health_plan,
        })
        .collect();

    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(summaries)
}
