//! Booking wizard state machine
//!
//! ```text
//! SelectingDoctor --select_doctor--> SelectingSlot --advance--> ConfirmingDetails
//!        ^                               |   ^                       |      |
//!        +------------go_back------------+   +--------go_back--------+      | submit
//!                                                                           v
//!                                              Failed <--error-- (pending) --ok--> Booked
//! ```
//!
//! The two suspension points (availability fetch and booking call) are split
//! into a synchronous half that issues a ticket and a completion half that
//! applies the result. Tickets carry the session epoch and request generation,
//! so results that arrive after the caller moved on are dropped rather than
//! applied. [`BookingWizard::select_date`] and [`BookingWizard::submit`] wrap
//! both halves for callers that do not interleave events.

use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::calendar::{Clock, SystemClock};
use crate::error::WizardError;
use crate::model::{
    AvailabilityView, BookingRequest, BookingSelection, BookingSummary, ConfirmationId, DoctorId,
    PatientId, SelectedSlot, Slot, SlotId,
};
use crate::services::{AvailabilityService, BookingService};

/// Position in the booking flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardState {
    SelectingDoctor,
    SelectingSlot,
    ConfirmingDetails,
    /// A submission failed; selection kept for retry
    Failed,
    Booked,
}

impl WizardState {
    pub fn name(&self) -> &'static str {
        match self {
            WizardState::SelectingDoctor => "SelectingDoctor",
            WizardState::SelectingSlot => "SelectingSlot",
            WizardState::ConfirmingDetails => "ConfirmingDetails",
            WizardState::Failed => "Failed",
            WizardState::Booked => "Booked",
        }
    }

    /// Visible step shown to the user
    pub fn step(&self) -> Step {
        match self {
            WizardState::SelectingDoctor => Step::One,
            WizardState::SelectingSlot => Step::Two,
            WizardState::ConfirmingDetails | WizardState::Failed => Step::Three,
            WizardState::Booked => Step::Confirmed,
        }
    }

    pub fn can_go_back(&self) -> bool {
        matches!(
            self,
            WizardState::SelectingSlot | WizardState::ConfirmingDetails | WizardState::Failed
        )
    }

    pub fn can_submit(&self) -> bool {
        matches!(self, WizardState::ConfirmingDetails | WizardState::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WizardState::Booked)
    }
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress indicator position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    One,
    Two,
    Three,
    Confirmed,
}

impl Step {
    pub fn number(&self) -> Option<u8> {
        match self {
            Step::One => Some(1),
            Step::Two => Some(2),
            Step::Three => Some(3),
            Step::Confirmed => None,
        }
    }
}

/// Handle for an outstanding availability fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityTicket {
    epoch: u64,
    generation: u64,
    doctor_id: DoctorId,
    date: NaiveDate,
}

impl AvailabilityTicket {
    pub fn doctor_id(&self) -> &DoctorId {
        &self.doctor_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Handle for an outstanding booking call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTicket {
    epoch: u64,
    request: BookingRequest,
}

impl SubmitTicket {
    pub fn request(&self) -> &BookingRequest {
        &self.request
    }
}

/// Result of handing a fetch response back to the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// The response no longer matches the current date or session
    Stale,
}

/// Result of handing a booking response back to the wizard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Booked(ConfirmationId),
    /// The session was reset while the call was in flight
    Stale,
}

/// One patient's booking session
pub struct BookingWizard {
    patient_id: PatientId,
    deep_link: Option<DoctorId>,
    clock: Arc<dyn Clock>,
    state: WizardState,
    selection: BookingSelection,
    availability: Option<AvailabilityView>,
    confirmation: Option<ConfirmationId>,
    /// Bumped by reset; invalidates every outstanding ticket
    epoch: u64,
    /// Bumped by every date request; only the latest fetch may land
    fetch_generation: u64,
    pending_fetch: bool,
    pending_submit: bool,
}

impl fmt::Debug for BookingWizard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookingWizard")
            .field("patient_id", &self.patient_id)
            .field("deep_link", &self.deep_link)
            .field("state", &self.state)
            .field("selection", &self.selection)
            .field("pending_fetch", &self.pending_fetch)
            .field("pending_submit", &self.pending_submit)
            .finish_non_exhaustive()
    }
}

impl BookingWizard {
    /// Start at doctor search
    pub fn new(patient_id: PatientId) -> Self {
        Self::build(patient_id, None)
    }

    /// Start with a doctor already chosen, skipping doctor search
    pub fn with_doctor(patient_id: PatientId, doctor_id: DoctorId) -> Self {
        Self::build(patient_id, Some(doctor_id))
    }

    /// Replace the clock used for past-date checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn build(patient_id: PatientId, deep_link: Option<DoctorId>) -> Self {
        let state = Self::initial_state(&deep_link);
        debug!(patient = %patient_id, deep_link = ?deep_link, "Booking wizard started in {}", state);
        Self {
            patient_id,
            selection: BookingSelection::for_doctor(deep_link.clone()),
            deep_link,
            clock: Arc::new(SystemClock),
            state,
            availability: None,
            confirmation: None,
            epoch: 0,
            fetch_generation: 0,
            pending_fetch: false,
            pending_submit: false,
        }
    }

    fn initial_state(deep_link: &Option<DoctorId>) -> WizardState {
        if deep_link.is_some() {
            WizardState::SelectingSlot
        } else {
            WizardState::SelectingDoctor
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn step(&self) -> Step {
        self.state.step()
    }

    pub fn selection(&self) -> &BookingSelection {
        &self.selection
    }

    pub fn patient_id(&self) -> &PatientId {
        &self.patient_id
    }

    pub fn deep_linked_doctor(&self) -> Option<&DoctorId> {
        self.deep_link.as_ref()
    }

    /// Availability for the current date, once it has arrived
    pub fn availability(&self) -> Option<&AvailabilityView> {
        self.availability.as_ref()
    }

    pub fn confirmation_id(&self) -> Option<&ConfirmationId> {
        self.confirmation.as_ref()
    }

    pub fn is_fetching(&self) -> bool {
        self.pending_fetch
    }

    pub fn is_submitting(&self) -> bool {
        self.pending_submit
    }

    /// Summary for the confirmation step; `None` until the selection is complete
    pub fn summary(&self) -> Option<BookingSummary> {
        let selection = &self.selection;
        let slot = selection.slot.as_ref()?;
        let reason = Some(selection.reason.clone()).filter(|r| !r.is_empty());
        Some(BookingSummary {
            doctor_id: selection.doctor_id.clone()?,
            date: selection.date?,
            slot_time: slot.time.clone(),
            reason,
        })
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Choose a doctor and move to slot selection
    pub fn select_doctor(&mut self, doctor_id: DoctorId) -> Result<(), WizardError> {
        self.expect_state("select_doctor", &[WizardState::SelectingDoctor])?;

        self.selection = BookingSelection::for_doctor(Some(doctor_id));
        self.invalidate_availability();
        self.transition(WizardState::SelectingSlot);
        Ok(())
    }

    /// Choose a date and issue the availability request for it
    ///
    /// Clears any selected slot. The returned ticket must be handed back to
    /// [`Self::apply_availability`] together with the collaborator's answer.
    pub fn request_date(&mut self, date: NaiveDate) -> Result<AvailabilityTicket, WizardError> {
        self.expect_state("select_date", &[WizardState::SelectingSlot])?;

        let today = self.clock.today();
        if date < today {
            return Err(WizardError::InvalidSelection(format!(
                "{date} is in the past (today is {today})"
            )));
        }
        let doctor_id = self
            .selection
            .doctor_id
            .clone()
            .ok_or_else(|| WizardError::IncompleteSelection {
                missing: vec!["doctor"],
            })?;

        self.selection.date = Some(date);
        self.selection.slot = None;
        self.invalidate_availability();
        self.pending_fetch = true;

        debug!(doctor = %doctor_id, %date, generation = self.fetch_generation, "Requesting availability");
        Ok(AvailabilityTicket {
            epoch: self.epoch,
            generation: self.fetch_generation,
            doctor_id,
            date,
        })
    }

    /// Apply the answer to an availability request
    ///
    /// Answers for a date that is no longer current, or from before a reset,
    /// are dropped and reported as [`FetchOutcome::Stale`]. A failed fetch
    /// leaves the view empty; re-selecting the date retries.
    pub fn apply_availability(
        &mut self,
        ticket: AvailabilityTicket,
        result: anyhow::Result<Vec<Slot>>,
    ) -> Result<FetchOutcome, WizardError> {
        if !self.is_current_fetch(&ticket) {
            debug!(date = %ticket.date, generation = ticket.generation, "Dropping stale availability response");
            return Ok(FetchOutcome::Stale);
        }

        self.pending_fetch = false;
        match result {
            Ok(slots) => {
                debug!(date = %ticket.date, slots = slots.len(), "Availability applied");
                self.availability = Some(AvailabilityView::new(ticket.doctor_id, ticket.date, slots));
                Ok(FetchOutcome::Applied)
            }
            Err(e) => {
                self.availability = None;
                Err(WizardError::collaborator("fetch_availability", e))
            }
        }
    }

    /// Choose a date and load its availability in one step
    pub async fn select_date(
        &mut self,
        date: NaiveDate,
        source: &dyn AvailabilityService,
    ) -> Result<&AvailabilityView, WizardError> {
        let ticket = self.request_date(date)?;
        let result = source.fetch_availability(ticket.doctor_id(), ticket.date()).await;
        self.apply_availability(ticket, result)?;
        self.availability
            .as_ref()
            .ok_or_else(|| WizardError::InvalidSelection(format!("no availability loaded for {date}")))
    }

    /// Choose an available slot from the latest availability
    ///
    /// Does not change state; call [`Self::advance_to_confirmation`] to move on.
    pub fn select_slot(&mut self, slot_id: &SlotId) -> Result<(), WizardError> {
        self.expect_state("select_slot", &[WizardState::SelectingSlot])?;

        let view = self
            .availability
            .as_ref()
            .filter(|view| Some(view.date) == self.selection.date)
            .ok_or_else(|| {
                WizardError::InvalidSelection("no availability loaded for the selected date".to_string())
            })?;
        let slot = view.find(slot_id).ok_or_else(|| {
            WizardError::InvalidSelection(format!("slot '{slot_id}' does not exist on {}", view.date))
        })?;
        if !slot.is_available {
            return Err(WizardError::InvalidSelection(format!(
                "slot '{slot_id}' ({}) is not available",
                slot.display_time
            )));
        }

        debug!(slot = %slot_id, time = %slot.display_time, "Slot selected");
        self.selection.slot = Some(SelectedSlot {
            id: slot.id.clone(),
            time: slot.display_time.clone(),
        });
        Ok(())
    }

    /// Move from slot selection to the confirmation step
    pub fn advance_to_confirmation(&mut self) -> Result<(), WizardError> {
        self.expect_state("advance_to_confirmation", &[WizardState::SelectingSlot])?;

        let missing = self.selection.missing_fields();
        if !missing.is_empty() {
            return Err(WizardError::IncompleteSelection { missing });
        }
        self.transition(WizardState::ConfirmingDetails);
        Ok(())
    }

    /// Set the free-text reason for the visit
    pub fn set_reason(&mut self, text: &str) -> Result<(), WizardError> {
        self.ensure_not_submitting()?;
        self.expect_state(
            "set_reason",
            &[WizardState::ConfirmingDetails, WizardState::Failed],
        )?;
        self.selection.reason = text.trim().to_string();
        Ok(())
    }

    /// Step back one screen
    ///
    /// From slot selection this discards the doctor and everything after it.
    /// From confirmation the selection is kept as is.
    pub fn go_back(&mut self) -> Result<(), WizardError> {
        self.ensure_not_submitting()?;
        match self.state {
            WizardState::SelectingSlot => {
                self.selection = BookingSelection::default();
                self.invalidate_availability();
                self.transition(WizardState::SelectingDoctor);
                Ok(())
            }
            WizardState::ConfirmingDetails | WizardState::Failed => {
                self.transition(WizardState::SelectingSlot);
                Ok(())
            }
            state => Err(WizardError::InvalidTransition {
                operation: "go_back",
                state,
            }),
        }
    }

    /// Freeze the selection into a booking request
    ///
    /// Only one submission may be outstanding at a time.
    pub fn begin_submit(&mut self) -> Result<SubmitTicket, WizardError> {
        self.ensure_not_submitting()?;
        self.expect_state(
            "submit",
            &[WizardState::ConfirmingDetails, WizardState::Failed],
        )?;

        let request = self.booking_request()?;
        self.pending_submit = true;
        debug!(doctor = %request.doctor_id, date = %request.date, slot = %request.slot_id, "Submitting booking");
        Ok(SubmitTicket {
            epoch: self.epoch,
            request,
        })
    }

    /// Apply the booking sink's answer
    ///
    /// Success moves to `Booked`; failure moves to `Failed` and keeps the
    /// selection so the caller can retry.
    pub fn complete_submit(
        &mut self,
        ticket: SubmitTicket,
        result: anyhow::Result<ConfirmationId>,
    ) -> Result<SubmitOutcome, WizardError> {
        if ticket.epoch != self.epoch || !self.pending_submit {
            debug!("Dropping booking response from an abandoned session");
            return Ok(SubmitOutcome::Stale);
        }

        self.pending_submit = false;
        match result {
            Ok(confirmation) => {
                info!(confirmation = %confirmation, patient = %self.patient_id, "Appointment booked");
                self.confirmation = Some(confirmation.clone());
                self.transition(WizardState::Booked);
                Ok(SubmitOutcome::Booked(confirmation))
            }
            Err(e) => {
                self.transition(WizardState::Failed);
                Err(WizardError::collaborator("create_appointment", e))
            }
        }
    }

    /// Submit and wait for the booking sink in one step
    pub async fn submit(&mut self, sink: &dyn BookingService) -> Result<ConfirmationId, WizardError> {
        let ticket = self.begin_submit()?;
        let result = sink.create_appointment(ticket.request().clone()).await;
        match self.complete_submit(ticket, result)? {
            SubmitOutcome::Booked(confirmation) => Ok(confirmation),
            SubmitOutcome::Stale => Err(WizardError::InvalidTransition {
                operation: "submit",
                state: self.state,
            }),
        }
    }

    /// Discard everything and start over
    ///
    /// Outstanding fetches and submissions are abandoned; their responses
    /// will be dropped when they arrive.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.selection = BookingSelection::for_doctor(self.deep_link.clone());
        self.invalidate_availability();
        self.pending_submit = false;
        self.confirmation = None;
        let state = Self::initial_state(&self.deep_link);
        self.transition(state);
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn transition(&mut self, next: WizardState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Wizard transition");
        }
        self.state = next;
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[WizardState],
    ) -> Result<(), WizardError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(WizardError::InvalidTransition {
                operation,
                state: self.state,
            })
        }
    }

    fn ensure_not_submitting(&self) -> Result<(), WizardError> {
        if self.pending_submit {
            Err(WizardError::OperationInProgress)
        } else {
            Ok(())
        }
    }

    fn invalidate_availability(&mut self) {
        self.availability = None;
        self.fetch_generation += 1;
        self.pending_fetch = false;
    }

    fn is_current_fetch(&self, ticket: &AvailabilityTicket) -> bool {
        ticket.epoch == self.epoch
            && ticket.generation == self.fetch_generation
            && self.state == WizardState::SelectingSlot
            && self.selection.date == Some(ticket.date)
            && self.selection.doctor_id.as_ref() == Some(&ticket.doctor_id)
    }

    fn booking_request(&self) -> Result<BookingRequest, WizardError> {
        let selection = &self.selection;
        match (&selection.doctor_id, selection.date, &selection.slot) {
            (Some(doctor_id), Some(date), Some(slot)) => Ok(BookingRequest {
                doctor_id: doctor_id.clone(),
                slot_id: slot.id.clone(),
                date,
                slot_time: slot.time.clone(),
                reason: selection.reason.clone(),
                patient_id: self.patient_id.clone(),
            }),
            _ => Err(WizardError::IncompleteSelection {
                missing: selection.missing_fields(),
            }),
        }
    }
}
