use booking_core::{AvailabilityView, DayPeriod, Doctor};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Tabled)]
struct DoctorRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Specialty")]
    specialty: String,
    #[tabled(rename = "Rating")]
    rating: String,
}

#[derive(Tabled)]
struct SlotRow {
    #[tabled(rename = "Slot")]
    id: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Status")]
    status: &'static str,
}

fn render<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string()
}

pub fn doctors_table(doctors: &[Doctor]) -> String {
    let rows: Vec<DoctorRow> = doctors
        .iter()
        .map(|d| DoctorRow {
            id: d.id.to_string(),
            name: d.name.clone(),
            specialty: d.specialty.clone(),
            rating: format!("{:.1}", d.rating),
        })
        .collect();
    render(&rows)
}

/// Slots for one part of the day; `None` when that period is empty
pub fn slots_table(view: &AvailabilityView, period: DayPeriod) -> Option<String> {
    let rows: Vec<SlotRow> = view
        .in_period(period)
        .map(|slot| SlotRow {
            id: slot.id.to_string(),
            time: slot.display_time.clone(),
            status: if slot.is_available { "available" } else { "taken" },
        })
        .collect();
    if rows.is_empty() {
        None
    } else {
        Some(render(&rows))
    }
}
