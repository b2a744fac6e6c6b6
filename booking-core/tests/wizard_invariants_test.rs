//! Invariants of the wizard: slot invalidation, back-navigation, stale
//! responses and overlapping submissions

mod common;

use anyhow::anyhow;
use booking_core::services::FixtureClinic;
use booking_core::{
    ConfirmationId, DoctorId, FetchOutcome, Slot, SlotId, SubmitOutcome, WizardError, WizardState,
};
use common::{date, scenario_slots, wizard, StaticAvailability};
use pretty_assertions::assert_eq;

/// Walk to slot selection with S1 picked on `day`
fn wizard_with_slot(day: &str) -> booking_core::BookingWizard {
    let mut wizard = wizard();
    wizard.select_doctor(DoctorId::new("D1")).unwrap();
    let ticket = wizard.request_date(date(day)).unwrap();
    wizard.apply_availability(ticket, Ok(scenario_slots())).unwrap();
    wizard.select_slot(&SlotId::new("S1")).unwrap();
    wizard
}

#[test]
fn test_new_date_clears_slot() {
    let mut wizard = wizard_with_slot("2024-03-10");

    let ticket = wizard.request_date(date("2024-03-11")).unwrap();
    assert_eq!(wizard.selection().slot, None);

    let err = wizard.advance_to_confirmation().unwrap_err();
    match err {
        WizardError::IncompleteSelection { missing } => assert_eq!(missing, vec!["slot"]),
        other => panic!("Expected IncompleteSelection, got {other:?}"),
    }

    wizard.apply_availability(ticket, Ok(scenario_slots())).unwrap();
    wizard.select_slot(&SlotId::new("S1")).unwrap();
    wizard.advance_to_confirmation().unwrap();
    assert_eq!(wizard.state(), WizardState::ConfirmingDetails);
}

#[test]
fn test_rejected_slot_keeps_prior_selection() {
    let mut wizard = wizard_with_slot("2024-03-10");

    for bad in ["S2", "S404"] {
        let err = wizard.select_slot(&SlotId::new(bad)).unwrap_err();
        assert!(matches!(err, WizardError::InvalidSelection(_)), "{bad}");
        assert_eq!(wizard.selection().slot_id(), Some(&SlotId::new("S1")));
    }
}

#[tokio::test]
async fn test_back_to_doctor_clears_downstream_fields() {
    let mut wizard = wizard_with_slot("2024-03-10");
    wizard.advance_to_confirmation().unwrap();
    wizard.set_reason("rash").unwrap();

    // confirmation -> slots keeps everything
    wizard.go_back().unwrap();
    assert_eq!(wizard.state(), WizardState::SelectingSlot);
    assert_eq!(wizard.selection().slot_id(), Some(&SlotId::new("S1")));
    assert_eq!(wizard.selection().reason, "rash");

    // slots -> doctor clears everything
    wizard.go_back().unwrap();
    assert_eq!(wizard.state(), WizardState::SelectingDoctor);
    let selection = wizard.selection();
    assert_eq!(selection.doctor_id, None);
    assert_eq!(selection.date, None);
    assert_eq!(selection.slot, None);
    assert_eq!(selection.reason, "");
    assert!(wizard.availability().is_none());

    // picking a new doctor starts from a clean slate
    wizard.select_doctor(DoctorId::new("D2")).unwrap();
    let source = StaticAvailability::default().with_day(date("2024-03-12"), scenario_slots());
    wizard.select_date(date("2024-03-12"), &source).await.unwrap();
    assert_eq!(
        wizard.availability().map(|v| v.doctor_id.as_str()),
        Some("D2")
    );
}

#[test]
fn test_stale_fetch_is_dropped() {
    let mut wizard = wizard();
    wizard.select_doctor(DoctorId::new("D1")).unwrap();

    let first = wizard.request_date(date("2024-03-10")).unwrap();
    let second = wizard.request_date(date("2024-03-11")).unwrap();

    // second answer lands first
    let outcome = wizard
        .apply_availability(second, Ok(vec![Slot::new("B1", "10:00", true)]))
        .unwrap();
    assert_eq!(outcome, FetchOutcome::Applied);

    let outcome = wizard
        .apply_availability(first, Ok(vec![Slot::new("A1", "09:00", true)]))
        .unwrap();
    assert_eq!(outcome, FetchOutcome::Stale);

    let view = wizard.availability().unwrap();
    assert_eq!(view.date, date("2024-03-11"));
    assert_eq!(view.slots[0].id.as_str(), "B1");
    assert!(wizard.select_slot(&SlotId::new("A1")).is_err());
}

#[test]
fn test_stale_failure_is_not_reported() {
    let mut wizard = wizard();
    wizard.select_doctor(DoctorId::new("D1")).unwrap();

    let first = wizard.request_date(date("2024-03-10")).unwrap();
    let second = wizard.request_date(date("2024-03-11")).unwrap();
    wizard.apply_availability(second, Ok(scenario_slots())).unwrap();

    let outcome = wizard
        .apply_availability(first, Err(anyhow!("timeout")))
        .unwrap();
    assert_eq!(outcome, FetchOutcome::Stale);
    assert!(wizard.availability().is_some());
}

#[test]
fn test_fetch_after_reset_is_ignored() {
    let mut wizard = wizard();
    wizard.select_doctor(DoctorId::new("D1")).unwrap();
    let ticket = wizard.request_date(date("2024-03-10")).unwrap();

    wizard.reset();
    wizard.select_doctor(DoctorId::new("D1")).unwrap();

    let outcome = wizard.apply_availability(ticket, Ok(scenario_slots())).unwrap();
    assert_eq!(outcome, FetchOutcome::Stale);
    assert!(wizard.availability().is_none());
    assert_eq!(wizard.selection().date, None);
}

#[test]
fn test_second_submit_while_pending_is_rejected() {
    let mut wizard = wizard_with_slot("2024-03-10");
    wizard.advance_to_confirmation().unwrap();

    let ticket = wizard.begin_submit().unwrap();
    assert!(wizard.is_submitting());

    assert!(matches!(
        wizard.begin_submit(),
        Err(WizardError::OperationInProgress)
    ));
    assert!(matches!(
        wizard.go_back(),
        Err(WizardError::OperationInProgress)
    ));
    assert!(matches!(
        wizard.set_reason("late edit"),
        Err(WizardError::OperationInProgress)
    ));

    let outcome = wizard
        .complete_submit(ticket, Ok(ConfirmationId::new("CONF9")))
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::Booked(ConfirmationId::new("CONF9")));
    assert_eq!(wizard.state(), WizardState::Booked);
}

#[test]
fn test_submit_response_after_reset_is_ignored() {
    let mut wizard = wizard_with_slot("2024-03-10");
    wizard.advance_to_confirmation().unwrap();
    let ticket = wizard.begin_submit().unwrap();

    wizard.reset();
    let outcome = wizard
        .complete_submit(ticket, Ok(ConfirmationId::new("CONF-LATE")))
        .unwrap();

    assert_eq!(outcome, SubmitOutcome::Stale);
    assert_eq!(wizard.state(), WizardState::SelectingDoctor);
    assert!(wizard.confirmation_id().is_none());
}

#[test]
fn test_commands_outside_their_state_fail() {
    let mut wizard = wizard();

    assert!(matches!(
        wizard.request_date(date("2024-03-10")),
        Err(WizardError::InvalidTransition { operation: "select_date", .. })
    ));
    assert!(matches!(
        wizard.select_slot(&SlotId::new("S1")),
        Err(WizardError::InvalidTransition { operation: "select_slot", .. })
    ));
    assert!(matches!(
        wizard.advance_to_confirmation(),
        Err(WizardError::InvalidTransition { .. })
    ));
    assert!(matches!(
        wizard.begin_submit(),
        Err(WizardError::InvalidTransition { operation: "submit", .. })
    ));
    assert_eq!(wizard.state(), WizardState::SelectingDoctor);
}

#[test]
fn test_advance_without_date_reports_missing_fields() {
    let mut wizard = wizard();
    wizard.select_doctor(DoctorId::new("D1")).unwrap();

    match wizard.advance_to_confirmation().unwrap_err() {
        WizardError::IncompleteSelection { missing } => {
            assert_eq!(missing, vec!["date", "slot"])
        }
        other => panic!("Expected IncompleteSelection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_fetch_recovers_by_reselecting_date() {
    let clinic = FixtureClinic::default();
    clinic.fail_next_fetches(1);

    let mut wizard = wizard();
    wizard.select_doctor(DoctorId::new("1")).unwrap();

    let err = wizard.select_date(date("2024-03-11"), &clinic).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(wizard.state(), WizardState::SelectingSlot);
    assert!(wizard.availability().is_none());

    let view = wizard.select_date(date("2024-03-11"), &clinic).await.unwrap();
    assert_eq!(view.slots.len(), 14);
    assert_eq!(clinic.fetch_calls(), 2);
}

#[tokio::test]
async fn test_slot_taken_by_someone_else_fails_at_submit() {
    let clinic = FixtureClinic::default();
    let day = date("2024-03-11");

    let mut first = wizard();
    let mut second = wizard();
    for wizard in [&mut first, &mut second] {
        wizard.select_doctor(DoctorId::new("1")).unwrap();
        wizard.select_date(day, &clinic).await.unwrap();
        wizard.select_slot(&SlotId::new("1")).unwrap();
        wizard.advance_to_confirmation().unwrap();
    }

    first.submit(&clinic).await.unwrap();
    let err = second.submit(&clinic).await.unwrap_err();

    assert!(err.to_string().contains("no longer available"));
    assert_eq!(second.state(), WizardState::Failed);

    // back to the slot list, which now shows the slot as taken
    second.go_back().unwrap();
    second.select_date(day, &clinic).await.unwrap();
    assert!(second.select_slot(&SlotId::new("1")).is_err());
    second.select_slot(&SlotId::new("2")).unwrap();
    second.advance_to_confirmation().unwrap();
    second.submit(&clinic).await.unwrap();

    assert_eq!(clinic.appointments().await.len(), 2);
}
