//! clinic-booking - terminal front-end for the appointment booking wizard
//!
//! Drives [`BookingWizard`] against the in-memory fixture clinic (or a JSON
//! fixture named in `.booking/config.json`).

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use booking_core::calendar::{self, SystemClock, Clock};
use booking_core::config::{self, BookingConfig, LoadedConfig};
use booking_core::services::{DoctorDirectory, DoctorQuery, FixtureClinic, IdentityService};
use booking_core::{BookingWizard, DayPeriod, DoctorId, PatientId, SlotId, WizardError};

mod tables;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "clinic-booking",
    about = "Book doctor appointments from the terminal",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    json_logs: bool,

    /// Project config directory (defaults to ./.booking)
    #[clap(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Clinic fixture JSON, overriding the configured one
    #[clap(long, global = true)]
    fixture: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the doctor directory
    Doctors {
        /// Exact specialty, case-insensitive
        #[clap(long)]
        specialty: Option<String>,

        /// Part of the doctor's name
        #[clap(long)]
        name: Option<String>,

        /// List specialties instead of doctors
        #[clap(long)]
        specialties: bool,
    },

    /// List the dates open for booking
    Dates {
        /// First date to consider (YYYY-MM-DD, defaults to today)
        #[clap(long)]
        from: Option<String>,
    },

    /// Show a doctor's slots for a date
    Slots {
        #[clap(long)]
        doctor: String,

        /// YYYY-MM-DD
        #[clap(long)]
        date: String,
    },

    /// Book an appointment
    Book {
        #[clap(long)]
        doctor: String,

        /// YYYY-MM-DD (defaults to the first open date)
        #[clap(long)]
        date: Option<String>,

        #[clap(long)]
        slot: String,

        /// Reason for the visit
        #[clap(long)]
        reason: Option<String>,

        /// Book on behalf of this patient instead of the signed-in user
        #[clap(long)]
        patient: Option<String>,

        /// Extra submission attempts after a failed booking call
        #[clap(long, default_value_t = 0)]
        retries: u32,
    },
}

/// Initialize tracing with CLI flags; logs always go to stderr
fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let filter = EnvFilter::new(log_level.to_filter_directive());

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(&cli.log_level, cli.json_logs);

    let loaded = load_config(cli.config_dir.clone())?;
    let clinic = open_clinic(&loaded, cli.fixture.as_ref())?;

    match cli.command {
        Command::Doctors {
            specialty,
            name,
            specialties,
        } => doctors_command(&clinic, specialty, name, specialties).await,
        Command::Dates { from } => dates_command(&loaded.config, from.as_deref()),
        Command::Slots { doctor, date } => slots_command(&clinic, &doctor, &date).await,
        Command::Book {
            doctor,
            date,
            slot,
            reason,
            patient,
            retries,
        } => {
            let request = BookArgs {
                doctor,
                date,
                slot,
                reason,
                patient,
                retries,
            };
            book_command(&clinic, &loaded.config, request).await
        }
    }
}

fn load_config(config_dir: Option<PathBuf>) -> Result<LoadedConfig> {
    let project_dir = match config_dir {
        Some(dir) => dir,
        None => config::project_config_dir(
            &std::env::current_dir().context("Failed to resolve current directory")?,
        ),
    };
    let global_dir = config::global_config_dir();
    let loaded = BookingConfig::load_from_directory(Some(&project_dir), global_dir.as_deref());
    debug!(source = ?loaded.source_dir, config = ?loaded.config, "Configuration resolved");
    Ok(loaded)
}

fn open_clinic(loaded: &LoadedConfig, override_path: Option<&PathBuf>) -> Result<FixtureClinic> {
    match override_path.cloned().or_else(|| loaded.clinic_fixture_path()) {
        Some(path) => FixtureClinic::from_path(&path),
        None => {
            debug!("No clinic fixture configured, using built-in demo clinic");
            Ok(FixtureClinic::default())
        }
    }
}

async fn doctors_command(
    clinic: &FixtureClinic,
    specialty: Option<String>,
    name: Option<String>,
    specialties: bool,
) -> Result<()> {
    if specialties {
        for specialty in clinic.specialties().await? {
            println!("{specialty}");
        }
        return Ok(());
    }

    let query = DoctorQuery { specialty, name };
    let doctors = clinic.search(&query).await?;
    if doctors.is_empty() {
        println!("No doctors found matching your criteria");
    } else {
        println!("{}", tables::doctors_table(&doctors));
    }
    Ok(())
}

fn dates_command(config: &BookingConfig, from: Option<&str>) -> Result<()> {
    let start = match from {
        Some(value) => calendar::parse_iso_date(value)?,
        None => SystemClock.today(),
    };
    for date in open_dates(config, start) {
        println!("{}  {}", date, calendar::format_long_date(date));
    }
    Ok(())
}

fn open_dates(config: &BookingConfig, start: NaiveDate) -> Vec<NaiveDate> {
    calendar::upcoming_dates(start, config.horizon_days, config.skip_weekends)
}

async fn slots_command(clinic: &FixtureClinic, doctor: &str, date: &str) -> Result<()> {
    let doctor_id = DoctorId::new(doctor);
    let doctor = clinic
        .find(&doctor_id)
        .await?
        .ok_or_else(|| anyhow!("Doctor '{}' not found", doctor_id))?;
    let date = calendar::parse_iso_date(date)?;

    // Anonymous session: slot browsing does not need a patient
    let mut wizard = BookingWizard::with_doctor(PatientId::new("anonymous"), doctor_id);
    let view = wizard.select_date(date, clinic).await?;

    println!("{} ({}) - {}", doctor.name, doctor.specialty, calendar::format_long_date(date));
    for period in [DayPeriod::Morning, DayPeriod::Afternoon] {
        if let Some(table) = tables::slots_table(view, period) {
            println!("\n{}\n{table}", period.as_str());
        }
    }
    Ok(())
}

struct BookArgs {
    doctor: String,
    date: Option<String>,
    slot: String,
    reason: Option<String>,
    patient: Option<String>,
    retries: u32,
}

async fn resolve_patient(
    clinic: &FixtureClinic,
    config: &BookingConfig,
    explicit: Option<String>,
) -> Result<PatientId> {
    if let Some(patient) = explicit {
        return Ok(PatientId::new(patient));
    }
    if let Some(user) = clinic.current_user().await? {
        debug!(patient = %user.id, "Booking as signed-in user");
        return Ok(user.id);
    }
    config
        .default_patient_id
        .clone()
        .map(PatientId::new)
        .ok_or_else(|| anyhow!("Nobody is signed in; pass --patient"))
}

async fn book_command(clinic: &FixtureClinic, config: &BookingConfig, args: BookArgs) -> Result<()> {
    let patient_id = resolve_patient(clinic, config, args.patient).await?;
    let doctor_id = DoctorId::new(args.doctor);
    let doctor = clinic
        .find(&doctor_id)
        .await?
        .ok_or_else(|| anyhow!("Doctor '{}' not found", doctor_id))?;

    let date = match args.date {
        Some(value) => calendar::parse_iso_date(&value)?,
        None => *open_dates(config, SystemClock.today())
            .first()
            .ok_or_else(|| anyhow!("No dates open for booking"))?,
    };

    let mut wizard = BookingWizard::new(patient_id);
    wizard.select_doctor(doctor_id)?;
    wizard.select_date(date, clinic).await?;
    wizard.select_slot(&SlotId::new(args.slot))?;
    wizard.advance_to_confirmation()?;
    if let Some(reason) = args.reason {
        wizard.set_reason(&reason)?;
    }

    let summary = wizard
        .summary()
        .ok_or_else(|| anyhow!("Selection incomplete"))?;
    println!("{} ({})", doctor.name, doctor.specialty);
    println!("{summary}\n");

    let mut attempts_left = args.retries;
    let confirmation = loop {
        match wizard.submit(clinic).await {
            Ok(confirmation) => break confirmation,
            Err(e @ WizardError::CollaboratorFailure { .. }) if attempts_left > 0 => {
                attempts_left -= 1;
                warn!("{e}; retrying ({attempts_left} attempts left)");
            }
            Err(e) => bail!(e),
        }
    };

    info!(confirmation = %confirmation, "Booking complete");
    println!("Appointment confirmed. Appointment ID: {confirmation}");
    Ok(())
}
