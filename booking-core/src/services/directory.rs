use serde::{Deserialize, Serialize};

use crate::model::Doctor;

/// Filters for the doctor search step
///
/// Specialty matches exactly (ignoring case); name matches as a
/// case-insensitive substring. Empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorQuery {
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl DoctorQuery {
    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn matches(&self, doctor: &Doctor) -> bool {
        let specialty_ok = match non_empty(&self.specialty) {
            Some(specialty) => doctor.specialty.eq_ignore_ascii_case(specialty),
            None => true,
        };
        let name_ok = match non_empty(&self.name) {
            Some(name) => doctor
                .name
                .to_lowercase()
                .contains(&name.to_lowercase()),
            None => true,
        };
        specialty_ok && name_ok
    }

    pub fn apply<'a>(&self, doctors: impl IntoIterator<Item = &'a Doctor>) -> Vec<Doctor> {
        doctors
            .into_iter()
            .filter(|doctor| self.matches(doctor))
            .cloned()
            .collect()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
