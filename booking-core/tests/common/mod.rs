//! Shared helpers for the booking-core integration tests
//!
//! Not every test file uses every helper.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use booking_core::calendar::FixedClock;
use booking_core::services::{AvailabilityService, BookingService};
use booking_core::{BookingRequest, BookingWizard, ConfirmationId, DoctorId, PatientId, Slot};
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

/// "Today" for every test: Friday 2024-03-08
pub fn today() -> NaiveDate {
    date("2024-03-08")
}

pub fn wizard() -> BookingWizard {
    init_test_logging();
    BookingWizard::new(PatientId::new("P1")).with_clock(Arc::new(FixedClock(today())))
}

pub fn deep_linked_wizard(doctor: &str) -> BookingWizard {
    init_test_logging();
    BookingWizard::with_doctor(PatientId::new("P1"), DoctorId::new(doctor))
        .with_clock(Arc::new(FixedClock(today())))
}

/// The two-slot day used throughout the scenarios
pub fn scenario_slots() -> Vec<Slot> {
    vec![Slot::new("S1", "09:00", true), Slot::new("S2", "09:30", false)]
}

/// Availability source answering from a fixed table
#[derive(Default)]
pub struct StaticAvailability {
    by_date: HashMap<NaiveDate, Vec<Slot>>,
}

impl StaticAvailability {
    pub fn with_day(mut self, day: NaiveDate, slots: Vec<Slot>) -> Self {
        self.by_date.insert(day, slots);
        self
    }
}

#[async_trait]
impl AvailabilityService for StaticAvailability {
    async fn fetch_availability(&self, _doctor_id: &DoctorId, date: NaiveDate) -> Result<Vec<Slot>> {
        Ok(self.by_date.get(&date).cloned().unwrap_or_default())
    }
}

/// Booking sink replaying scripted answers and recording every request
#[derive(Default)]
pub struct ScriptedBooking {
    answers: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<BookingRequest>>,
}

impl ScriptedBooking {
    pub fn succeed(self, confirmation: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .push_back(Ok(confirmation.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.answers.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<BookingRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BookingService for ScriptedBooking {
    async fn create_appointment(&self, request: BookingRequest) -> Result<ConfirmationId> {
        self.requests.lock().unwrap().push(request);
        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("no scripted answer left".to_string()));
        answer.map(ConfirmationId::new).map_err(|e| anyhow!(e))
    }
}
