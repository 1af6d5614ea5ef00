//! Persisted record schemas.
//!
//! One explicit struct per collection; the store holds loosely-typed JSON
//! lines, so these schemas are the single source of truth for what each
//! collection contains. Relationships between collections are by-id joins
//! maintained by the handlers — the store does not enforce referential
//! integrity after creation time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clinic_id::RecordId;
use clinic_store::Document;
use clinic_types::{EmailAddress, NonEmptyText};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two account roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            other => Err(format!("unknown role: '{}'", other)),
        }
    }
}

/// An authentication record. Accounts are created by registration and never
/// updated in place; the only delete path is registration rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: RecordId,
    pub email: EmailAddress,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Document for Account {
    fn id(&self) -> &RecordId {
        &self.id
    }
}

/// Role-specific record for a patient, linked 1:1 to an [`Account`] by
/// `account_id`. The email is a denormalized copy of the account's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: RecordId,
    pub account_id: RecordId,
    pub name: NonEmptyText,
    pub email: EmailAddress,
    pub birth_date: NaiveDate,
    pub health_plan: String,
}

impl Document for PatientProfile {
    fn id(&self) -> &RecordId {
        &self.id
    }
}

/// Role-specific record for a doctor, linked 1:1 to an [`Account`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: RecordId,
    pub account_id: RecordId,
    pub name: NonEmptyText,
    pub email: EmailAddress,
    /// Medical license identifier
    pub crm: String,
    pub specialty: String,
}

impl Document for DoctorProfile {
    fn id(&self) -> &RecordId {
        &self.id
    }
}

/// Stored appointment state. Cancellation is a hard delete, so no terminal
/// state is ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
}

/// A scheduled appointment.
///
/// `doctor_id` and `patient_id` are always role-profile ids (never account
/// ids); profiles carry the display fields listings need. Only `date`,
/// `reason`, and `notes` are mutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: RecordId,
    pub doctor_id: RecordId,
    pub patient_id: RecordId,
    /// Clinic wall-clock time, no timezone attached
    pub date: NaiveDateTime,
    pub reason: String,
    pub status: AppointmentStatus,
    pub notes: String,
    pub urgent: bool,
    pub created_at: DateTime<Utc>,
}

impl Document for Appointment {
    fn id(&self) -> &RecordId {
        &self.id
    }
}

/// Metadata for an uploaded file. The bytes live under the per-patient
/// uploads directory as `stored_file_name`; that name is internal and is
/// never included in listing results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: RecordId,
    pub patient_id: RecordId,
    pub doctor_id: RecordId,
    pub original_file_name: String,
    pub stored_file_name: String,
    pub description: String,
    /// Best-effort content detection; not authoritative
    pub media_type: Option<String>,
    pub size_bytes: u64,
    pub upload_date: DateTime<Utc>,
}

impl Document for FileRecord {
    fn id(&self) -> &RecordId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Patient).unwrap(), "\"patient\"");
        assert_eq!(serde_json::to_string(&Role::Doctor).unwrap(), "\"doctor\"");

        let role: Role = serde_json::from_str("\"doctor\"").unwrap();
        assert_eq!(role, Role::Doctor);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("patient".parse::<Role>().unwrap(), Role::Patient);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_appointment_status_serde() {
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::Scheduled).unwrap(),
            "\"scheduled\""
        );
    }

    #[test]
    fn test_appointment_round_trip() {
        let appointment = Appointment {
            id: RecordId::new(),
            doctor_id: RecordId::new(),
            patient_id: RecordId::new(),
            date: NaiveDateTime::parse_from_str("2025-03-01 10:00", "%Y-%m-%d %H:%M").unwrap(),
            reason: "checkup".to_string(),
            status: AppointmentStatus::Scheduled,
            notes: String::new(),
            urgent: false,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&appointment).unwrap();
        let back: Appointment = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, appointment.id);
        assert_eq!(back.date, appointment.date);
        assert_eq!(back.status, AppointmentStatus::Scheduled);
    }
}
