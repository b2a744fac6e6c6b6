//! Clinic booking core
//!
//! Backend-agnostic state machine for the patient appointment flow
//! (doctor -> date and slot -> confirmation -> booked), the collaborator
//! traits it drives, and the configuration shared by front-ends.

pub mod calendar;
pub mod config;
pub mod error;
pub mod model;
pub mod services;
pub mod wizard;

pub use config::{BookingConfig, LoadedConfig};
pub use error::{ConfigError, WizardError};
pub use model::{
    AvailabilityView, BookingRequest, BookingSelection, BookingSummary, ConfirmationId,
    DayPeriod, Doctor, DoctorId, PatientId, SelectedSlot, Slot, SlotId, User,
};
pub use wizard::{
    AvailabilityTicket, BookingWizard, FetchOutcome, Step, SubmitOutcome, SubmitTicket,
    WizardState,
};
