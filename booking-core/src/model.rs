//! Domain types shared by the wizard and its collaborators

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::calendar;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

opaque_id!(
    /// Identifier of a doctor in the directory
    DoctorId
);
opaque_id!(
    /// Identifier of a bookable slot, unique within one doctor and date
    SlotId
);
opaque_id!(
    /// Identifier of the acting patient
    PatientId
);
opaque_id!(
    /// Identifier returned by the booking sink for a created appointment
    ConfirmationId
);

/// A doctor as listed by the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: DoctorId,
    pub name: String,
    pub specialty: String,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub about: String,
}

/// The signed-in user as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: PatientId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// One bookable time for a doctor on a date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub display_time: String,
    pub is_available: bool,
}

impl Slot {
    pub fn new(id: impl Into<SlotId>, display_time: impl Into<String>, is_available: bool) -> Self {
        Self {
            id: id.into(),
            display_time: display_time.into(),
            is_available,
        }
    }

    /// Part of the day this slot falls in
    pub fn period(&self) -> DayPeriod {
        DayPeriod::of(&self.display_time)
    }
}

/// Morning/afternoon grouping used when listing slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayPeriod {
    Morning,
    Afternoon,
}

impl DayPeriod {
    /// Classify a display time such as `"09:30 AM"`, `"01:00 PM"` or `"14:30"`.
    ///
    /// Times that cannot be read fall into the afternoon group.
    pub fn of(display_time: &str) -> Self {
        let upper = display_time.trim().to_ascii_uppercase();
        if upper.ends_with("AM") {
            return DayPeriod::Morning;
        }
        if upper.ends_with("PM") {
            return DayPeriod::Afternoon;
        }

        let hour = upper
            .split(':')
            .next()
            .and_then(|h| h.trim().parse::<u32>().ok());
        match hour {
            Some(h) if h < 12 => DayPeriod::Morning,
            _ => DayPeriod::Afternoon,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayPeriod::Morning => "Morning",
            DayPeriod::Afternoon => "Afternoon",
        }
    }
}

/// Availability of one doctor on one date, in the order the source returned it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityView {
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

impl AvailabilityView {
    pub fn new(doctor_id: DoctorId, date: NaiveDate, slots: Vec<Slot>) -> Self {
        Self {
            doctor_id,
            date,
            slots,
        }
    }

    pub fn find(&self, slot_id: &SlotId) -> Option<&Slot> {
        self.slots.iter().find(|slot| &slot.id == slot_id)
    }

    pub fn available(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| slot.is_available)
    }

    /// Slots for one part of the day, source order preserved
    pub fn in_period(&self, period: DayPeriod) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(move |slot| slot.period() == period)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// The slot currently chosen; id and display time always travel together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSlot {
    pub id: SlotId,
    pub time: String,
}

/// Selection accumulated across the wizard steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSelection {
    pub doctor_id: Option<DoctorId>,
    pub date: Option<NaiveDate>,
    pub slot: Option<SelectedSlot>,
    pub reason: String,
}

impl BookingSelection {
    pub(crate) fn for_doctor(doctor_id: Option<DoctorId>) -> Self {
        Self {
            doctor_id,
            ..Default::default()
        }
    }

    pub fn slot_id(&self) -> Option<&SlotId> {
        self.slot.as_ref().map(|slot| &slot.id)
    }

    pub fn slot_time(&self) -> Option<&str> {
        self.slot.as_ref().map(|slot| slot.time.as_str())
    }

    /// Names of the fields still needed before confirmation
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.doctor_id.is_none() {
            missing.push("doctor");
        }
        if self.date.is_none() {
            missing.push("date");
        }
        if self.slot.is_none() {
            missing.push("slot");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// Payload handed to the booking sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub doctor_id: DoctorId,
    pub slot_id: SlotId,
    pub date: NaiveDate,
    pub slot_time: String,
    pub reason: String,
    pub patient_id: PatientId,
}

/// Read-only view of a complete selection for the confirmation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingSummary {
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    pub slot_time: String,
    pub reason: Option<String>,
}

impl BookingSummary {
    pub fn reason_or_default(&self) -> &str {
        self.reason.as_deref().unwrap_or("Not specified")
    }

    pub fn long_date(&self) -> String {
        calendar::format_long_date(self.date)
    }
}

impl fmt::Display for BookingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Doctor: {}", self.doctor_id)?;
        writeln!(f, "Date:   {}", self.long_date())?;
        writeln!(f, "Time:   {}", self.slot_time)?;
        write!(f, "Reason: {}", self.reason_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn view() -> AvailabilityView {
        AvailabilityView::new(
            DoctorId::new("D1"),
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            vec![
                Slot::new("S1", "09:00 AM", true),
                Slot::new("S2", "11:30 AM", false),
                Slot::new("S3", "01:00 PM", true),
                Slot::new("S4", "16:30", true),
            ],
        )
    }

    #[test]
    fn test_day_period_classification() {
        assert_eq!(DayPeriod::of("09:00 AM"), DayPeriod::Morning);
        assert_eq!(DayPeriod::of("12:30 pm"), DayPeriod::Afternoon);
        assert_eq!(DayPeriod::of("08:45"), DayPeriod::Morning);
        assert_eq!(DayPeriod::of("13:00"), DayPeriod::Afternoon);
        assert_eq!(DayPeriod::of("whenever"), DayPeriod::Afternoon);
    }

    #[test]
    fn test_view_grouping_keeps_source_order() {
        let view = view();
        let morning: Vec<_> = view
            .in_period(DayPeriod::Morning)
            .map(|s| s.id.as_str())
            .collect();
        let afternoon: Vec<_> = view
            .in_period(DayPeriod::Afternoon)
            .map(|s| s.id.as_str())
            .collect();

        assert_eq!(morning, vec!["S1", "S2"]);
        assert_eq!(afternoon, vec!["S3", "S4"]);
        assert_eq!(view.available().count(), 3);
    }

    #[test]
    fn test_missing_fields_in_order() {
        let mut selection = BookingSelection::default();
        assert_eq!(selection.missing_fields(), vec!["doctor", "date", "slot"]);

        selection.doctor_id = Some(DoctorId::new("D1"));
        selection.date = NaiveDate::from_ymd_opt(2024, 3, 10);
        assert_eq!(selection.missing_fields(), vec!["slot"]);
        assert!(!selection.is_complete());
    }

    #[test]
    fn test_summary_defaults_reason() {
        let summary = BookingSummary {
            doctor_id: DoctorId::new("D1"),
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            slot_time: "09:00 AM".to_string(),
            reason: None,
        };

        assert_eq!(summary.reason_or_default(), "Not specified");
        assert!(summary.to_string().contains("Sunday, March 10, 2024"));
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&DoctorId::new("D9")).unwrap();
        assert_eq!(json, "\"D9\"");
    }
}
