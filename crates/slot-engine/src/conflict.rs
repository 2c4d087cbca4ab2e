//! Detect overlapping availability windows for a provider.
//!
//! Two windows conflict when they share an applicable date and their local
//! time ranges intersect: `a.start < b.end && a.end > b.start`. Ranges are
//! half-open, so a window ending at 10:00 does not conflict with one starting
//! at 10:00. Windows of different providers never conflict.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{AvailabilityWindow, WindowDefinition};

/// Anything that occupies a provider's time: a stored window or a candidate.
pub trait Occupancy {
    /// Stored id, if the occupant has been persisted.
    fn window_id(&self) -> Option<Uuid>;
    fn provider_id(&self) -> Uuid;
    fn definition(&self) -> &WindowDefinition;
}

impl Occupancy for AvailabilityWindow {
    fn window_id(&self) -> Option<Uuid> {
        Some(self.id)
    }

    fn provider_id(&self) -> Uuid {
        self.provider_id
    }

    fn definition(&self) -> &WindowDefinition {
        &self.definition
    }
}

/// A proposed window checked before it is stored.
///
/// Set `window_id` when re-checking an edit so the window is not compared
/// against its own stored version.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub window_id: Option<Uuid>,
    pub provider_id: Uuid,
    pub definition: &'a WindowDefinition,
}

impl Occupancy for Candidate<'_> {
    fn window_id(&self) -> Option<Uuid> {
        self.window_id
    }

    fn provider_id(&self) -> Uuid {
        self.provider_id
    }

    fn definition(&self) -> &WindowDefinition {
        self.definition
    }
}

/// One overlap between an existing window and the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConflict {
    pub existing_window: Option<Uuid>,
    pub date: NaiveDate,
    pub overlap_minutes: i64,
}

/// Local-time overlap in minutes, or `None` if the ranges do not intersect.
fn time_overlap(a: &WindowDefinition, b: &WindowDefinition) -> Option<i64> {
    if a.start_time < b.end_time && a.end_time > b.start_time {
        let start = a.start_time.max(b.start_time);
        let end = a.end_time.min(b.end_time);
        Some((end - start).num_minutes())
    } else {
        None
    }
}

/// Lazily yield every conflict, ordered by existing window then date.
pub fn conflicts<'a, E, C>(
    existing: &'a [E],
    candidate: &'a C,
) -> impl Iterator<Item = WindowConflict> + 'a
where
    E: Occupancy,
    C: Occupancy,
{
    let def = candidate.definition();
    let dates = def.applicable_dates().unwrap_or_default();

    existing
        .iter()
        .filter(move |other| other.provider_id() == candidate.provider_id())
        .filter(move |other| {
            other.window_id().is_none() || other.window_id() != candidate.window_id()
        })
        .flat_map(move |other| {
            let overlap = time_overlap(other.definition(), def);
            let shared: Vec<NaiveDate> = match overlap {
                Some(_) => dates
                    .iter()
                    .copied()
                    .filter(|d| other.definition().applies_on(*d))
                    .collect(),
                None => Vec::new(),
            };
            shared.into_iter().map(move |date| WindowConflict {
                existing_window: other.window_id(),
                date,
                overlap_minutes: overlap.unwrap_or_default(),
            })
        })
}

/// Find all conflicts between `existing` windows and `candidate`.
pub fn find_conflicts<E: Occupancy, C: Occupancy>(
    existing: &[E],
    candidate: &C,
) -> Vec<WindowConflict> {
    conflicts(existing, candidate).collect()
}

/// Whether `candidate` overlaps any of `existing`.
pub fn has_conflict<E: Occupancy, C: Occupancy>(existing: &[E], candidate: &C) -> bool {
    conflicts(existing, candidate).next().is_some()
}
