//! Verified doctor search ranked by proximity.

use crate::identity::display_name;
use crate::validation::normalize_pin;
use crate::PortalResult;
use physihome_store::{Store, UserId, UserRecord, VerificationStatus};
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct DoctorQuery {
    pub pin: Option<String>,
    pub city: Option<String>,
    pub specialization: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DoctorEntry {
    pub id: UserId,
    pub display_name: String,
    pub specialization: Option<String>,
    pub city: Option<String>,
    /// Absolute difference between the query PIN and the doctor's PIN, when both are known.
    pub pin_distance: Option<u64>,
}

#[derive(Clone)]
pub struct DoctorDirectory {
    store: Arc<dyn Store>,
}

impl DoctorDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Verified doctors: same city first, then nearest PIN, then by name.
    pub async fn search(&self, query: &DoctorQuery) -> PortalResult<Vec<DoctorEntry>> {
        let city = non_blank(query.city.as_deref()).map(str::to_lowercase);
        let pin = query.pin.as_deref().and_then(pin_value);
        let specialization = non_blank(query.specialization.as_deref()).map(str::to_lowercase);

        let mut ranked: Vec<(bool, DoctorEntry)> = self
            .store
            .list_doctors()
            .await?
            .into_iter()
            .filter(|d| d.doctor_verification_status == Some(VerificationStatus::Verified))
            .filter(|d| match &specialization {
                Some(wanted) => d
                    .specialization
                    .as_deref()
                    .is_some_and(|s| s.to_lowercase().contains(wanted.as_str())),
                None => true,
            })
            .map(|d| {
                let same_city = match (&city, d.city.as_deref()) {
                    (Some(wanted), Some(theirs)) => theirs.trim().to_lowercase() == *wanted,
                    _ => false,
                };
                (same_city, entry(d, pin))
            })
            .collect();

        ranked.sort_by(|(a_city, a), (b_city, b)| {
            b_city
                .cmp(a_city)
                .then_with(|| compare_distance(a.pin_distance, b.pin_distance))
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        Ok(ranked.into_iter().map(|(_, entry)| entry).collect())
    }
}

fn entry(doctor: UserRecord, query_pin: Option<u64>) -> DoctorEntry {
    let doctor_pin = doctor.preferred_pin.as_deref().and_then(pin_value);
    let pin_distance = match (query_pin, doctor_pin) {
        (Some(q), Some(d)) => Some(q.abs_diff(d)),
        _ => None,
    };
    DoctorEntry {
        id: doctor.id,
        display_name: display_name(&doctor),
        specialization: doctor.specialization,
        city: doctor.city,
        pin_distance,
    }
}

/// Known distances sort ascending; unknown ones last.
fn compare_distance(a: Option<u64>, b: Option<u64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn pin_value(raw: &str) -> Option<u64> {
    normalize_pin(raw)?.parse().ok()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
