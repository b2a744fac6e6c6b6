//! Collaborator traits - abstraction over the identity provider and data store
//!
//! The wizard never talks to a backend directly. Front-ends supply
//! implementations of these traits:
//! - a hosted identity provider / relational store (outside this crate)
//! - [`FixtureClinic`] (in-memory, deterministic; demos and tests)

pub mod directory;
pub mod fixture;

pub use directory::DoctorQuery;
pub use fixture::{ClinicFixture, FixtureClinic};

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::model::{BookingRequest, ConfirmationId, Doctor, DoctorId, Slot, User};

/// Resolves who is booking
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// The signed-in user, if any
    async fn current_user(&self) -> Result<Option<User>>;
}

/// Supplies per-date slot availability for a doctor
#[async_trait]
pub trait AvailabilityService: Send + Sync {
    /// Slots for `doctor_id` on `date`, in display order
    ///
    /// Errors are treated as transient; the caller may retry by
    /// re-selecting the date.
    async fn fetch_availability(&self, doctor_id: &DoctorId, date: NaiveDate) -> Result<Vec<Slot>>;
}

/// Persists appointments
#[async_trait]
pub trait BookingService: Send + Sync {
    /// Create an appointment, returning its confirmation id
    async fn create_appointment(&self, request: BookingRequest) -> Result<ConfirmationId>;
}

/// Doctor search for the first wizard step
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn search(&self, query: &DoctorQuery) -> Result<Vec<Doctor>>;

    async fn find(&self, doctor_id: &DoctorId) -> Result<Option<Doctor>>;

    /// Distinct specialties, sorted
    async fn specialties(&self) -> Result<Vec<String>>;
}
