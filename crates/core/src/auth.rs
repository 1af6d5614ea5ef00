//! Authentication handlers: login and registration.
//!
//! Registration is a two-collection write (account, then role profile) with
//! no transaction underneath. When the profile insert fails the account
//! insert is compensated by [`compensate_account_insert`]; a failed
//! compensation leaves an orphaned account behind, which is logged and
//! accepted — no downstream uniqueness constraint depends on the orphan
//! being absent.

use crate::db::{ClinicDb, IDX_ACCOUNT, IDX_EMAIL};
use crate::entities::{Account, DoctorProfile, PatientProfile, Role};
use crate::response::Response;
use crate::session::{ProfileDetails, Session};
use crate::{ClinicConfig, ClinicError, ClinicResult};
use chrono::{NaiveDate, Utc};
use clinic_id::RecordId;
use clinic_types::{EmailAddress, NonEmptyText};

/// Login credentials plus the role the user claims to be signing in as.
///
/// The role comparison is a UX check, not a security boundary: an account
/// only ever has one role.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Role-specific registration fields. The account role is derived from the
/// variant, so a role/profile mismatch cannot be expressed.
#[derive(Debug, Clone)]
pub enum ProfileFields {
    Patient {
        /// `YYYY-MM-DD`
        birth_date: String,
        /// May be empty (self-paying patient)
        health_plan: String,
    },
    Doctor {
        crm: String,
        specialty: String,
    },
}

impl ProfileFields {
    pub fn role(&self) -> Role {
        match self {
            ProfileFields::Patient { .. } => Role::Patient,
            ProfileFields::Doctor { .. } => Role::Doctor,
        }
    }
}

/// Registration input.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub profile: ProfileFields,
}

/// Authenticates a user and returns the merged session identity.
pub fn login(db: &ClinicDb, req: &LoginRequest) -> Response<Session> {
    Response::from_result(try_login(db, req))
}

pub(crate) fn try_login(db: &ClinicDb, req: &LoginRequest) -> ClinicResult<Session> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(ClinicError::Validation("incomplete data".into()));
    }

    let account = db
        .accounts
        .find_by(IDX_EMAIL, email)?
        .into_iter()
        .next()
        .ok_or_else(|| ClinicError::NotFound("user not found".into()))?;

    if account.role != req.role {
        return Err(ClinicError::WrongRole);
    }

    if !bcrypt::verify(&req.password, &account.password_hash)? {
        return Err(ClinicError::WrongPassword);
    }

    build_session(db, &account)
}

/// Joins an account with its role profile. A missing profile is a
/// data-integrity failure, never silently tolerated.
fn build_session(db: &ClinicDb, account: &Account) -> ClinicResult<Session> {
    let account_key = account.id.to_string();

    match account.role {
        Role::Patient => {
            let profile = db
                .patients
                .find_by(IDX_ACCOUNT, &account_key)?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    ClinicError::Integrity(format!(
                        "account {} has no patient profile",
                        account.id
                    ))
                })?;
            Ok(Session {
                account_id: account.id.clone(),
                profile_id: profile.id.clone(),
                role: Role::Patient,
                name: profile.name.to_string(),
                email: account.email.clone(),
                created_at: account.created_at,
                profile: ProfileDetails::Patient {
                    birth_date: profile.birth_date,
                    health_plan: profile.health_plan,
                },
            })
        }
        Role::Doctor => {
            let profile = db
                .doctors
                .find_by(IDX_ACCOUNT, &account_key)?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    ClinicError::Integrity(format!("account {} has no doctor profile", account.id))
                })?;
            Ok(Session {
                account_id: account.id.clone(),
                profile_id: profile.id.clone(),
                role: Role::Doctor,
                name: profile.name.to_string(),
                email: account.email.clone(),
                created_at: account.created_at,
                profile: ProfileDetails::Doctor {
                    crm: profile.crm,
                    specialty: profile.specialty,
                },
            })
        }
    }
}

/// Creates an account and its role profile. Returns the new account id.
pub fn register(db: &mut ClinicDb, cfg: &ClinicConfig, req: &RegisterRequest) -> Response<RecordId> {
    Response::from_result(try_register(db, cfg, req))
}

pub(crate) fn try_register(
    db: &mut ClinicDb,
    cfg: &ClinicConfig,
    req: &RegisterRequest,
) -> ClinicResult<RecordId> {
    if req.password.is_empty() {
        return Err(ClinicError::Validation("incomplete data".into()));
    }
    let name = NonEmptyText::new(&req.name)
        .map_err(|_| ClinicError::Validation("incomplete data".into()))?;
    let email = EmailAddress::parse(&req.email)
        .map_err(|_| ClinicError::Validation("invalid email address".into()))?;

    // Validate role fields before touching any collection.
    let validated = ValidatedProfile::parse(&req.profile)?;

    if !db.accounts.find_by(IDX_EMAIL, email.as_str())?.is_empty() {
        return Err(ClinicError::EmailTaken);
    }

    let password_hash = bcrypt::hash(&req.password, cfg.bcrypt_cost())?;
    let account = Account {
        id: RecordId::new(),
        email: email.clone(),
        password_hash,
        role: req.profile.role(),
        created_at: Utc::now(),
    };
    db.accounts.insert(account.clone())?;

    let profile_insert = match validated {
        ValidatedProfile::Patient {
            birth_date,
            health_plan,
        } => db
            .patients
            .insert(PatientProfile {
                id: RecordId::new(),
                account_id: account.id.clone(),
                name,
                email,
                birth_date,
                health_plan,
            })
            .map(|_| ()),
        ValidatedProfile::Doctor { crm, specialty } => db
            .doctors
            .insert(DoctorProfile {
                id: RecordId::new(),
                account_id: account.id.clone(),
                name,
                email,
                crm,
                specialty,
            })
            .map(|_| ()),
    };

    if let Err(profile_err) = profile_insert {
        compensate_account_insert(db, &account.id);
        return Err(profile_err.into());
    }

    Ok(account.id)
}

enum ValidatedProfile {
    Patient {
        birth_date: NaiveDate,
        health_plan: String,
    },
    Doctor {
        crm: String,
        specialty: String,
    },
}

impl ValidatedProfile {
    fn parse(fields: &ProfileFields) -> ClinicResult<Self> {
        match fields {
            ProfileFields::Patient {
                birth_date,
                health_plan,
            } => {
                let birth_date = NaiveDate::parse_from_str(birth_date.trim(), "%Y-%m-%d")
                    .map_err(|_| ClinicError::InvalidDate(birth_date.clone()))?;
                Ok(ValidatedProfile::Patient {
                    birth_date,
                    health_plan: health_plan.trim().to_owned(),
                })
            }
            ProfileFields::Doctor { crm, specialty } => {
                let crm = crm.trim();
                let specialty = specialty.trim();
                if crm.is_empty() || specialty.is_empty() {
                    return Err(ClinicError::Validation("incomplete data".into()));
                }
                Ok(ValidatedProfile::Doctor {
                    crm: crm.to_owned(),
                    specialty: specialty.to_owned(),
                })
            }
        }
    }
}

/// Compensation step for a failed registration: deletes the account inserted
/// before the profile write failed.
///
/// Best-effort. If the compensating delete itself fails the orphaned account
/// is left behind; that is logged here and does not change the error the
/// caller reports.
pub(crate) fn compensate_account_insert(db: &mut ClinicDb, account_id: &RecordId) {
    match db.accounts.remove(account_id) {
        Ok(removed) => {
            tracing::warn!(
                "rolled back account {} after profile insert failure (removed: {})",
                account_id,
                removed
            );
        }
        Err(cleanup_err) => {
            tracing::error!(
                "compensation failed, orphaned account {} left behind: {}",
                account_id,
                cleanup_err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{patient_request, setup, test_config};
    use tempfile::TempDir;

    #[test]
    fn test_register_then_login_round_trip() {
        // Scenario A
        let (_tmp, cfg, mut db) = setup();

        let registered = register(&mut db, &cfg, &patient_request("a@x.com", "secret1"));
        assert!(registered.success);

        let response = login(
            &db,
            &LoginRequest {
                email: "a@x.com".to_string(),
                password: "secret1".to_string(),
                role: Role::Patient,
            },
        );

        assert!(response.success);
        let session = response.data.unwrap();
        assert_eq!(session.email.as_str(), "a@x.com");
        assert_eq!(session.role, Role::Patient);
        match session.profile {
            ProfileDetails::Patient { ref health_plan, .. } => assert_eq!(health_plan, ""),
            _ => panic!("expected patient profile details"),
        }

        // The session value must never carry the password hash.
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("hash"));
    }

    #[test]
    fn test_register_rejects_duplicate_email() {
        // P1
        let (_tmp, cfg, mut db) = setup();

        assert!(register(&mut db, &cfg, &patient_request("a@x.com", "secret1")).success);
        let second = register(&mut db, &cfg, &patient_request("a@x.com", "other"));

        assert!(!second.success);
        assert_eq!(second.message.as_deref(), Some("email already in use"));
        assert_eq!(db.accounts.len(), 1, "no new account may be created");
    }

    #[test]
    fn test_login_unknown_email() {
        let (_tmp, _cfg, db) = setup();

        let response = login(
            &db,
            &LoginRequest {
                email: "ghost@x.com".to_string(),
                password: "whatever".to_string(),
                role: Role::Patient,
            },
        );

        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("user not found"));
    }

    #[test]
    fn test_login_role_mismatch_does_not_reveal_role() {
        // P3
        let (_tmp, cfg, mut db) = setup();
        register(&mut db, &cfg, &patient_request("a@x.com", "secret1"));

        let response = login(
            &db,
            &LoginRequest {
                email: "a@x.com".to_string(),
                password: "secret1".to_string(),
                role: Role::Doctor,
            },
        );

        assert!(!response.success);
        let message = response.message.unwrap();
        assert_eq!(message, "wrong user type");
        assert!(!message.contains("patient"));
    }

    #[test]
    fn test_login_wrong_password() {
        let (_tmp, cfg, mut db) = setup();
        register(&mut db, &cfg, &patient_request("a@x.com", "secret1"));

        let response = login(
            &db,
            &LoginRequest {
                email: "a@x.com".to_string(),
                password: "nope".to_string(),
                role: Role::Patient,
            },
        );

        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("wrong password"));
    }

    #[test]
    fn test_login_missing_profile_is_critical() {
        let (_tmp, cfg, mut db) = setup();

        // Manufacture an account with no matching profile record.
        let account = Account {
            id: RecordId::new(),
            email: EmailAddress::parse("orphan@x.com").unwrap(),
            password_hash: bcrypt::hash("secret1", cfg.bcrypt_cost()).unwrap(),
            role: Role::Patient,
            created_at: Utc::now(),
        };
        db.accounts.insert(account).unwrap();

        let response = login(
            &db,
            &LoginRequest {
                email: "orphan@x.com".to_string(),
                password: "secret1".to_string(),
                role: Role::Patient,
            },
        );

        assert!(!response.success);
        assert!(response.message.unwrap().contains("critical"));
    }

    #[test]
    fn test_register_doctor_and_login() {
        let (_tmp, cfg, mut db) = setup();

        let response = register(
            &mut db,
            &cfg,
            &RegisterRequest {
                email: "dr@x.com".to_string(),
                password: "secret1".to_string(),
                name: "Dr. Lima".to_string(),
                profile: ProfileFields::Doctor {
                    crm: "CRM-12345".to_string(),
                    specialty: "Cardiology".to_string(),
                },
            },
        );
        assert!(response.success);

        let session = login(
            &db,
            &LoginRequest {
                email: "dr@x.com".to_string(),
                password: "secret1".to_string(),
                role: Role::Doctor,
            },
        )
        .data
        .unwrap();

        assert_eq!(session.role, Role::Doctor);
        match session.profile {
            ProfileDetails::Doctor { crm, specialty } => {
                assert_eq!(crm, "CRM-12345");
                assert_eq!(specialty, "Cardiology");
            }
            _ => panic!("expected doctor profile details"),
        }
    }

    #[test]
    fn test_register_validation_failures_touch_no_collection() {
        let (_tmp, cfg, mut db) = setup();

        let mut bad_password = patient_request("a@x.com", "secret1");
        bad_password.password = String::new();
        assert!(!register(&mut db, &cfg, &bad_password).success);

        let mut bad_email = patient_request("not-an-email", "secret1");
        bad_email.email = "not-an-email".to_string();
        assert!(!register(&mut db, &cfg, &bad_email).success);

        let bad_birth_date = RegisterRequest {
            email: "b@x.com".to_string(),
            password: "secret1".to_string(),
            name: "B".to_string(),
            profile: ProfileFields::Patient {
                birth_date: "01/01/1990".to_string(),
                health_plan: String::new(),
            },
        };
        let response = register(&mut db, &cfg, &bad_birth_date);
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("invalid date format"));

        assert!(db.accounts.is_empty());
        assert!(db.patients.is_empty());
    }

    #[test]
    fn test_register_doctor_requires_crm_and_specialty() {
        let (_tmp, cfg, mut db) = setup();

        let response = register(
            &mut db,
            &cfg,
            &RegisterRequest {
                email: "dr@x.com".to_string(),
                password: "secret1".to_string(),
                name: "Dr. Lima".to_string(),
                profile: ProfileFields::Doctor {
                    crm: "  ".to_string(),
                    specialty: "Cardiology".to_string(),
                },
            },
        );

        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("incomplete data"));
    }

    #[test]
    fn test_compensation_frees_email_for_reregistration() {
        // P6: after the compensating delete, registering the same email
        // again must succeed.
        let tmp = TempDir::new().unwrap();
        let cfg = test_config(tmp.path());
        let mut db = ClinicDb::open(&cfg).unwrap();

        // Stand in for "profile insert failed after the account insert": an
        // account exists with no profile, compensation pending.
        let account = Account {
            id: RecordId::new(),
            email: EmailAddress::parse("a@x.com").unwrap(),
            password_hash: bcrypt::hash("secret1", cfg.bcrypt_cost()).unwrap(),
            role: Role::Patient,
            created_at: Utc::now(),
        };
        let account_id = db.accounts.insert(account).unwrap().id;

        // Before compensation the email is taken.
        let blocked = register(&mut db, &cfg, &patient_request("a@x.com", "secret1"));
        assert!(!blocked.success);

        compensate_account_insert(&mut db, &account_id);
        assert!(db.accounts.get(&account_id).is_none());

        let retry = register(&mut db, &cfg, &patient_request("a@x.com", "secret1"));
        assert!(retry.success);
    }

    #[test]
    fn test_compensation_on_missing_account_does_not_panic() {
        let (_tmp, _cfg, mut db) = setup();

        // Zero-match removal is a logged no-op.
        compensate_account_insert(&mut db, &RecordId::new());
    }
}
