//! Open-slot search across providers.
//!
//! Takes windows (with their slots) from any number of providers, keeps the
//! slots that match the search criteria, and groups them per provider. Each
//! match carries the window's location, pricing, and special requirements so
//! a caller can present it without another lookup.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    AppointmentSlot, AppointmentType, AvailabilityWindow, Location, LocationType, Pricing,
    ScheduledWindow, SlotStatus, WindowStatus,
};
use crate::normalize::parse_timezone;

/// Criteria for an open-slot search. Dates are local to each window's timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSearch {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub appointment_type: Option<AppointmentType>,
    #[serde(default)]
    pub insurance_accepted: Option<bool>,
    /// Windows without a base fee never match when this is set.
    #[serde(default)]
    pub max_fee: Option<Decimal>,
    #[serde(default)]
    pub location_type: Option<LocationType>,
    /// IANA name the window's timezone must equal.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default = "available_only_default")]
    pub available_only: bool,
}

fn available_only_default() -> bool {
    true
}

impl SlotSearch {
    pub fn between(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            appointment_type: None,
            insurance_accepted: None,
            max_fee: None,
            location_type: None,
            timezone: None,
            available_only: true,
        }
    }

    fn accepts_window(&self, window: &AvailabilityWindow) -> bool {
        let def = &window.definition;
        let pricing = def.pricing.as_ref();

        if self.available_only && window.status != WindowStatus::Available {
            return false;
        }
        if self.appointment_type.is_some_and(|t| t != def.appointment_type) {
            return false;
        }
        if let Some(wanted) = self.insurance_accepted {
            let accepted = pricing.and_then(|p| p.insurance_accepted).unwrap_or(false);
            if accepted != wanted {
                return false;
            }
        }
        if let Some(max) = self.max_fee {
            match pricing.and_then(|p| p.base_fee) {
                Some(fee) if fee <= max => {}
                _ => return false,
            }
        }
        if self.timezone.as_deref().is_some_and(|tz| tz != def.timezone) {
            return false;
        }
        if let Some(kind) = self.location_type {
            if def.location.as_ref().map(|l| l.kind) != Some(kind) {
                return false;
            }
        }
        true
    }
}

/// A slot that satisfied a search, with the window details that describe it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotMatch {
    /// Local date of the slot in its window's timezone.
    pub date: NaiveDate,
    pub slot: AppointmentSlot,
    pub location: Option<Location>,
    pub pricing: Option<Pricing>,
    pub special_requirements: Vec<String>,
}

/// All matching slots of one provider, ordered by start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMatches {
    pub provider_id: Uuid,
    pub slots: Vec<SlotMatch>,
}

/// Filter and group slots; providers come back ordered by their earliest match.
pub fn search_slots(windows: &[ScheduledWindow], search: &SlotSearch) -> Vec<ProviderMatches> {
    let mut by_provider: BTreeMap<Uuid, Vec<SlotMatch>> = BTreeMap::new();

    for scheduled in windows {
        let window = &scheduled.window;
        if !search.accepts_window(window) {
            continue;
        }
        let Ok(tz) = parse_timezone(&window.definition.timezone) else {
            continue;
        };

        for slot in &scheduled.slots {
            if search.available_only && slot.status != SlotStatus::Available {
                continue;
            }
            let date = slot.start.with_timezone(&tz).date_naive();
            if date < search.start_date || date > search.end_date {
                continue;
            }
            by_provider
                .entry(window.provider_id)
                .or_default()
                .push(SlotMatch {
                    date,
                    slot: slot.clone(),
                    location: window.definition.location.clone(),
                    pricing: window.definition.pricing.clone(),
                    special_requirements: window.definition.special_requirements.clone(),
                });
        }
    }

    let mut results: Vec<ProviderMatches> = by_provider
        .into_iter()
        .map(|(provider_id, mut slots)| {
            slots.sort_by_key(|m| (m.slot.start, m.slot.end));
            ProviderMatches { provider_id, slots }
        })
        .collect();
    results.sort_by_key(|p| (p.slots.first().map(|m| m.slot.start), p.provider_id));
    results
}
