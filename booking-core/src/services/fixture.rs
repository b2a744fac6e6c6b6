//! In-memory clinic implementing every collaborator trait
//!
//! Serves a fixed doctor list and a slot template that applies to every
//! date. Booked slots are remembered and reported unavailable afterwards.
//! Failure injection and call counters make it usable as a test double.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AvailabilityService, BookingService, DoctorDirectory, DoctorQuery, IdentityService};
use crate::model::{
    BookingRequest, ConfirmationId, Doctor, DoctorId, PatientId, Slot, SlotId, User,
};

/// Serializable clinic data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicFixture {
    pub doctors: Vec<Doctor>,
    /// Slot template applied to every date
    pub slots: Vec<Slot>,
    #[serde(default)]
    pub current_user: Option<User>,
}

impl Default for ClinicFixture {
    fn default() -> Self {
        let doctors = vec![
            demo_doctor("1", "Dr. John Smith", "Cardiology", 4.8, "Experienced cardiologist with over 15 years of practice."),
            demo_doctor("2", "Dr. Sarah Johnson", "Dermatology", 4.9, "Specializes in cosmetic dermatology and skin cancer treatments."),
            demo_doctor("3", "Dr. Michael Brown", "Orthopedics", 4.7, "Sports medicine specialist focusing on knee and shoulder injuries."),
            demo_doctor("4", "Dr. Emily Davis", "Neurology", 4.6, "Specializes in headache disorders and multiple sclerosis."),
            demo_doctor("5", "Dr. Robert Wilson", "Pediatrics", 4.9, "Caring pediatrician with a focus on developmental disorders."),
        ];

        let times = [
            ("09:00 AM", true),
            ("09:30 AM", true),
            ("10:00 AM", false),
            ("10:30 AM", true),
            ("11:00 AM", true),
            ("11:30 AM", false),
            ("01:00 PM", true),
            ("01:30 PM", true),
            ("02:00 PM", false),
            ("02:30 PM", true),
            ("03:00 PM", true),
            ("03:30 PM", true),
            ("04:00 PM", false),
            ("04:30 PM", true),
        ];
        let slots = times
            .iter()
            .enumerate()
            .map(|(i, (time, open))| Slot::new((i + 1).to_string(), *time, *open))
            .collect();

        Self {
            doctors,
            slots,
            current_user: Some(User {
                id: PatientId::new("patient-demo"),
                email: Some("patient@example.com".to_string()),
                display_name: Some("Demo Patient".to_string()),
            }),
        }
    }
}

fn demo_doctor(id: &str, name: &str, specialty: &str, rating: f32, about: &str) -> Doctor {
    Doctor {
        id: DoctorId::new(id),
        name: name.to_string(),
        specialty: specialty.to_string(),
        rating,
        about: about.to_string(),
    }
}

type SlotKey = (DoctorId, NaiveDate, SlotId);

pub struct FixtureClinic {
    fixture: ClinicFixture,
    latency: Option<Duration>,
    booked: Mutex<HashMap<SlotKey, (ConfirmationId, BookingRequest)>>,
    fail_fetches: AtomicUsize,
    fail_bookings: AtomicUsize,
    fetch_calls: AtomicUsize,
    booking_calls: AtomicUsize,
}

impl Default for FixtureClinic {
    fn default() -> Self {
        Self::new(ClinicFixture::default())
    }
}

impl FixtureClinic {
    pub fn new(fixture: ClinicFixture) -> Self {
        Self {
            fixture,
            latency: None,
            booked: Mutex::new(HashMap::new()),
            fail_fetches: AtomicUsize::new(0),
            fail_bookings: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            booking_calls: AtomicUsize::new(0),
        }
    }

    /// Load a fixture from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read clinic fixture {}", path.display()))?;
        let fixture: ClinicFixture = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse clinic fixture {}", path.display()))?;
        debug!(
            doctors = fixture.doctors.len(),
            slots = fixture.slots.len(),
            "Loaded clinic fixture from {}",
            path.display()
        );
        Ok(Self::new(fixture))
    }

    /// Delay every collaborator call, like a remote round-trip
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next `count` availability fetches fail
    pub fn fail_next_fetches(&self, count: usize) {
        self.fail_fetches.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` booking calls fail
    pub fn fail_next_bookings(&self, count: usize) {
        self.fail_bookings.store(count, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn booking_calls(&self) -> usize {
        self.booking_calls.load(Ordering::SeqCst)
    }

    pub fn fixture(&self) -> &ClinicFixture {
        &self.fixture
    }

    /// Appointments created so far
    pub async fn appointments(&self) -> Vec<(ConfirmationId, BookingRequest)> {
        let booked = self.booked.lock().await;
        let mut all: Vec<_> = booked.values().cloned().collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn knows_doctor(&self, doctor_id: &DoctorId) -> bool {
        self.fixture.doctors.iter().any(|d| &d.id == doctor_id)
    }
}

/// Decrement `counter` if positive; true when a failure should be injected
fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl IdentityService for FixtureClinic {
    async fn current_user(&self) -> Result<Option<User>> {
        Ok(self.fixture.current_user.clone())
    }
}

#[async_trait]
impl AvailabilityService for FixtureClinic {
    async fn fetch_availability(&self, doctor_id: &DoctorId, date: NaiveDate) -> Result<Vec<Slot>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if take_failure(&self.fail_fetches) {
            bail!("availability source temporarily unavailable");
        }
        if !self.knows_doctor(doctor_id) {
            bail!("unknown doctor '{}'", doctor_id);
        }

        let booked = self.booked.lock().await;
        let slots = self
            .fixture
            .slots
            .iter()
            .map(|slot| {
                let key = (doctor_id.clone(), date, slot.id.clone());
                Slot {
                    is_available: slot.is_available && !booked.contains_key(&key),
                    ..slot.clone()
                }
            })
            .collect();
        Ok(slots)
    }
}

#[async_trait]
impl BookingService for FixtureClinic {
    async fn create_appointment(&self, request: BookingRequest) -> Result<ConfirmationId> {
        self.booking_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if take_failure(&self.fail_bookings) {
            bail!("booking service temporarily unavailable");
        }
        if !self.knows_doctor(&request.doctor_id) {
            bail!("unknown doctor '{}'", request.doctor_id);
        }

        let template = self
            .fixture
            .slots
            .iter()
            .find(|slot| slot.id == request.slot_id)
            .ok_or_else(|| anyhow!("unknown slot '{}'", request.slot_id))?;
        if !template.is_available {
            bail!("slot '{}' is not offered", request.slot_id);
        }

        let key = (
            request.doctor_id.clone(),
            request.date,
            request.slot_id.clone(),
        );
        let mut booked = self.booked.lock().await;
        if booked.contains_key(&key) {
            bail!(
                "slot {} on {} is no longer available",
                request.slot_time,
                request.date
            );
        }

        let confirmation = ConfirmationId::new(format!("APT-{}", Uuid::now_v7().simple()));
        info!(
            confirmation = %confirmation,
            doctor = %request.doctor_id,
            date = %request.date,
            "Appointment created"
        );
        booked.insert(key, (confirmation.clone(), request));
        Ok(confirmation)
    }
}

#[async_trait]
impl DoctorDirectory for FixtureClinic {
    async fn search(&self, query: &DoctorQuery) -> Result<Vec<Doctor>> {
        Ok(query.apply(&self.fixture.doctors))
    }

    async fn find(&self, doctor_id: &DoctorId) -> Result<Option<Doctor>> {
        Ok(self
            .fixture
            .doctors
            .iter()
            .find(|d| &d.id == doctor_id)
            .cloned())
    }

    async fn specialties(&self) -> Result<Vec<String>> {
        let set: BTreeSet<_> = self
            .fixture
            .doctors
            .iter()
            .map(|d| d.specialty.clone())
            .collect();
        Ok(set.into_iter().collect())
    }
}
