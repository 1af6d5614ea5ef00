//! Command-line front end for the clinic core.
//!
//! Every subcommand opens the database under `--data-dir`, runs one handler,
//! and prints the result. Authenticated commands take `--email/--password`
//! and perform a real login first, so the CLI exercises exactly the
//! authorization paths the desktop shell would.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use clinic_core::appointments::{self, AppointmentUpdate, ScheduleRequest};
use clinic_core::auth::{self, LoginRequest, ProfileFields, RegisterRequest};
use clinic_core::entities::Role;
use clinic_core::files::{self, UploadRequest};
use clinic_core::roster;
use clinic_core::{ClinicConfig, ClinicDb, Response, Session};
use clinic_id::RecordId;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic management CLI")]
struct Cli {
    /// Storage root for databases and uploads
    #[arg(long, default_value = "./clinic_data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Credentials {
    /// Account email
    #[arg(long)]
    email: String,
    /// Account password
    #[arg(long)]
    password: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a patient account
    RegisterPatient {
        email: String,
        password: String,
        /// Full name
        name: String,
        /// Date of birth (YYYY-MM-DD)
        birth_date: String,
        /// Health plan (optional)
        #[arg(long, default_value = "")]
        health_plan: String,
    },
    /// Register a doctor account
    RegisterDoctor {
        email: String,
        password: String,
        /// Full name
        name: String,
        /// Medical license identifier
        crm: String,
        specialty: String,
    },
    /// Sign in and print the session
    Login {
        email: String,
        password: String,
        /// patient or doctor
        role: Role,
    },
    /// List every registered patient (doctors only)
    ListPatients {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Schedule an appointment
    Schedule {
        /// Doctor profile id
        doctor_id: RecordId,
        /// Patient profile id
        patient_id: RecordId,
        /// Appointment time (YYYY-MM-DD HH:MM)
        date: String,
        reason: String,
        #[arg(long)]
        urgent: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Edit an appointment's date, reason, or notes
    EditAppointment {
        id: RecordId,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Cancel (delete) an appointment
    CancelAppointment { id: RecordId },
    /// List a patient's appointments, soonest first
    Appointments {
        /// Patient profile id
        patient_id: RecordId,
    },
    /// Upload a file to a patient's record
    Upload {
        #[command(flatten)]
        credentials: Credentials,
        /// Patient profile id
        patient_id: RecordId,
        /// Doctor profile id recorded as the uploader
        doctor_id: RecordId,
        /// File to upload
        source: PathBuf,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List a patient's files, newest first
    Files {
        #[command(flatten)]
        credentials: Credentials,
        /// Patient profile id
        patient_id: RecordId,
    },
    /// Delete one uploaded file
    DeleteFile { id: RecordId },
    /// Delete every file belonging to a patient
    DeleteFiles {
        /// Patient profile id
        patient_id: RecordId,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_core=info".parse()?)
                .add_directive("clinic_store=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let cfg = ClinicConfig::new(cli.data_dir.clone()).context("invalid data directory")?;
    let mut db = ClinicDb::open(&cfg).context("could not open the clinic database")?;

    match cli.command {
        Commands::RegisterPatient {
            email,
            password,
            name,
            birth_date,
            health_plan,
        } => {
            let response = auth::register(
                &mut db,
                &cfg,
                &RegisterRequest {
                    email,
                    password,
                    name,
                    profile: ProfileFields::Patient {
                        birth_date,
                        health_plan,
                    },
                },
            );
            report(&response, |id| println!("Registered patient account: {id}"));
        }
        Commands::RegisterDoctor {
            email,
            password,
            name,
            crm,
            specialty,
        } => {
            let response = auth::register(
                &mut db,
                &cfg,
                &RegisterRequest {
                    email,
                    password,
                    name,
                    profile: ProfileFields::Doctor { crm, specialty },
                },
            );
            report(&response, |id| println!("Registered doctor account: {id}"));
        }
        Commands::Login {
            email,
            password,
            role,
        } => {
            let session = sign_in(&db, &email, &password, role)?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        Commands::ListPatients { credentials } => {
            let session = sign_in(&db, &credentials.email, &credentials.password, Role::Doctor)?;
            let response = roster::list_all_patients(&db, &session);
            report(&response, |patients| {
                if patients.is_empty() {
                    println!("No patients registered.");
                }
                for p in patients {
                    println!(
                        "{}  {}  born {}  plan: {}",
                        p.id,
                        p.name,
                        p.birth_date,
                        if p.health_plan.is_empty() {
                            "none"
                        } else {
                            p.health_plan.as_str()
                        }
                    );
                }
            });
        }
        Commands::Schedule {
            doctor_id,
            patient_id,
            date,
            reason,
            urgent,
            notes,
        } => {
            let response = appointments::schedule(
                &mut db,
                &ScheduleRequest {
                    doctor_id,
                    patient_id,
                    date,
                    reason,
                    urgent,
                    notes,
                },
            );
            report(&response, |a| {
                println!(
                    "Scheduled appointment {} on {} with {}",
                    a.id,
                    a.date.format("%Y-%m-%d %H:%M"),
                    a.doctor_name.as_deref().unwrap_or("(unknown doctor)")
                )
            });
        }
        Commands::EditAppointment {
            id,
            date,
            reason,
            notes,
        } => {
            let response = appointments::update(
                &mut db,
                &id,
                &AppointmentUpdate {
                    date,
                    reason,
                    notes,
                },
            );
            report_done(&response, &format!("Updated appointment {id}"));
        }
        Commands::CancelAppointment { id } => {
            let response = appointments::cancel(&mut db, &id);
            report_done(&response, &format!("Canceled appointment {id}"));
        }
        Commands::Appointments { patient_id } => {
            let response = appointments::list_for_patient(&db, &patient_id);
            report(&response, |rows| {
                if rows.is_empty() {
                    println!("No appointments.");
                }
                for a in rows {
                    println!(
                        "{}  {}  with {}  {}{}",
                        a.id,
                        a.date.format("%Y-%m-%d %H:%M"),
                        a.doctor_name.as_deref().unwrap_or("(unknown doctor)"),
                        a.reason,
                        if a.urgent { "  [urgent]" } else { "" }
                    );
                }
            });
        }
        Commands::Upload {
            credentials,
            patient_id,
            doctor_id,
            source,
            description,
        } => {
            sign_in(&db, &credentials.email, &credentials.password, Role::Doctor)?;
            let file_name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let response = files::upload(
                &mut db,
                &cfg,
                &UploadRequest {
                    patient_id,
                    doctor_id,
                    source_path: source,
                    file_name,
                    description,
                },
            );
            report(&response, |f| {
                println!("Uploaded file {} ({} bytes)", f.id, f.size_bytes)
            });
        }
        Commands::Files {
            credentials,
            patient_id,
        } => {
            let session = sign_in_any_role(&db, &credentials.email, &credentials.password)?;
            let response = files::list_for_patient(&db, &cfg, &session, &patient_id);
            report(&response, |rows| {
                if rows.is_empty() {
                    println!("No files.");
                }
                for f in rows {
                    println!(
                        "{}  {}  {} bytes  {}  uploaded by {}",
                        f.id,
                        f.original_file_name,
                        f.size_bytes,
                        f.media_type.as_deref().unwrap_or("unknown type"),
                        f.doctor_name.as_deref().unwrap_or("(unknown doctor)")
                    );
                }
            });
        }
        Commands::DeleteFile { id } => {
            let response = files::delete_file(&mut db, &cfg, &id);
            report_done(&response, &format!("Deleted file {id}"));
        }
        Commands::DeleteFiles { patient_id } => {
            let response = files::delete_all_for_patient(&mut db, &cfg, &patient_id);
            report(&response, |count| println!("Deleted {count} file(s)"));
        }
    }

    Ok(())
}

/// Logs in with an explicit role; failure aborts the command.
fn sign_in(db: &ClinicDb, email: &str, password: &str, role: Role) -> anyhow::Result<Session> {
    let response = auth::login(
        db,
        &LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            role,
        },
    );
    match response.data {
        Some(session) => Ok(session),
        None => bail!(
            "login failed: {}",
            response.message.unwrap_or_else(|| "unknown error".into())
        ),
    }
}

/// Logs in trying the patient role first, then the doctor role.
fn sign_in_any_role(db: &ClinicDb, email: &str, password: &str) -> anyhow::Result<Session> {
    sign_in(db, email, password, Role::Patient)
        .or_else(|_| sign_in(db, email, password, Role::Doctor))
}

/// Prints a payload-carrying envelope: the payload on success, the message
/// otherwise.
fn report<T>(response: &Response<T>, on_success: impl FnOnce(&T)) {
    if response.success {
        if let Some(data) = &response.data {
            on_success(data);
        }
    } else {
        print_failure(response);
    }
}

/// Prints a payload-less envelope.
fn report_done<T>(response: &Response<T>, message: &str) {
    if response.success {
        println!("{message}");
    } else {
        print_failure(response);
    }
}

fn print_failure<T>(response: &Response<T>) {
    if response.canceled {
        eprintln!("Canceled.");
    } else {
        eprintln!(
            "Error: {}",
            response.message.as_deref().unwrap_or("unknown error")
        );
    }
}
