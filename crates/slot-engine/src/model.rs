//! Availability windows, appointment slots, and the closed vocabularies they use.
//!
//! Transport payloads carry these enums as lowercase strings; anything outside
//! the known set is rejected with `InvalidWindowDefinition` instead of being
//! defaulted.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SchedulingError};
use crate::expander::{expand, Expansion, RecurrencePattern};
use crate::normalize::parse_timezone;

/// Shortest bookable slot, in minutes.
pub const MIN_SLOT_DURATION: u32 = 5;
pub const DEFAULT_SLOT_DURATION: u32 = 30;
pub const MAX_NOTES_LEN: usize = 500;
pub const DEFAULT_CURRENCY: &str = "USD";

fn token(s: &str) -> String {
    s.trim().to_lowercase().replace('-', "_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    #[default]
    Available,
    Booked,
    Cancelled,
    Blocked,
    Maintenance,
}

impl FromStr for WindowStatus {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self> {
        match token(s).as_str() {
            "available" => Ok(WindowStatus::Available),
            "booked" => Ok(WindowStatus::Booked),
            "cancelled" => Ok(WindowStatus::Cancelled),
            "blocked" => Ok(WindowStatus::Blocked),
            "maintenance" => Ok(WindowStatus::Maintenance),
            other => Err(SchedulingError::invalid(format!("unknown window status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    #[default]
    Available,
    Booked,
    Cancelled,
    Blocked,
}

impl FromStr for SlotStatus {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self> {
        match token(s).as_str() {
            "available" => Ok(SlotStatus::Available),
            "booked" => Ok(SlotStatus::Booked),
            "cancelled" => Ok(SlotStatus::Cancelled),
            "blocked" => Ok(SlotStatus::Blocked),
            other => Err(SchedulingError::invalid(format!("unknown slot status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    #[default]
    Consultation,
    FollowUp,
    Emergency,
    Telemedicine,
}

impl AppointmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentType::Consultation => "consultation",
            AppointmentType::FollowUp => "follow_up",
            AppointmentType::Emergency => "emergency",
            AppointmentType::Telemedicine => "telemedicine",
        }
    }
}

impl FromStr for AppointmentType {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self> {
        match token(s).as_str() {
            "consultation" => Ok(AppointmentType::Consultation),
            "follow_up" => Ok(AppointmentType::FollowUp),
            "emergency" => Ok(AppointmentType::Emergency),
            "telemedicine" => Ok(AppointmentType::Telemedicine),
            other => Err(SchedulingError::invalid(format!(
                "unknown appointment type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Clinic,
    Hospital,
    Telemedicine,
    HomeVisit,
}

impl FromStr for LocationType {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self> {
        match token(s).as_str() {
            "clinic" => Ok(LocationType::Clinic),
            "hospital" => Ok(LocationType::Hospital),
            "telemedicine" => Ok(LocationType::Telemedicine),
            "home_visit" => Ok(LocationType::HomeVisit),
            other => Err(SchedulingError::invalid(format!("unknown location type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: LocationType,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub room_number: Option<String>,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub base_fee: Option<Decimal>,
    #[serde(default)]
    pub insurance_accepted: Option<bool>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            base_fee: None,
            insurance_accepted: None,
            currency: default_currency(),
        }
    }
}

fn default_slot_duration() -> u32 {
    DEFAULT_SLOT_DURATION
}

fn default_max_appointments() -> u32 {
    1
}

/// Everything a provider declares about a window. Updates replace it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowDefinition {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// IANA timezone the local times are expressed in.
    pub timezone: String,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_pattern: Option<RecurrencePattern>,
    #[serde(default)]
    pub recurrence_end_date: Option<NaiveDate>,
    /// Occurrences cancelled out of a recurring series.
    #[serde(default)]
    pub excluded_dates: Vec<NaiveDate>,
    /// Minutes per slot.
    #[serde(default = "default_slot_duration")]
    pub slot_duration: u32,
    /// Minutes between consecutive slots.
    #[serde(default)]
    pub break_duration: u32,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    #[serde(default = "default_max_appointments")]
    pub max_appointments_per_slot: u32,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub special_requirements: Vec<String>,
}

impl WindowDefinition {
    /// A single-date window with default slot settings.
    pub fn new(
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        timezone: &str,
    ) -> Self {
        Self {
            date,
            start_time,
            end_time,
            timezone: timezone.to_string(),
            is_recurring: false,
            recurrence_pattern: None,
            recurrence_end_date: None,
            excluded_dates: Vec::new(),
            slot_duration: DEFAULT_SLOT_DURATION,
            break_duration: 0,
            appointment_type: AppointmentType::default(),
            max_appointments_per_slot: 1,
            location: None,
            pricing: None,
            notes: None,
            special_requirements: Vec::new(),
        }
    }

    pub fn recurring(mut self, pattern: RecurrencePattern, until: NaiveDate) -> Self {
        self.is_recurring = true;
        self.recurrence_pattern = Some(pattern);
        self.recurrence_end_date = Some(until);
        self
    }

    pub fn with_slots(mut self, slot_duration: u32, break_duration: u32) -> Self {
        self.slot_duration = slot_duration;
        self.break_duration = break_duration;
        self
    }

    pub fn with_appointment_type(mut self, appointment_type: AppointmentType) -> Self {
        self.appointment_type = appointment_type;
        self
    }

    /// Check the window invariants.
    ///
    /// # Errors
    /// - `InvalidTimezone` if the zone name does not resolve.
    /// - `InvalidRecurrenceRange` if the recurrence end precedes `date`.
    /// - `InvalidWindowDefinition` for every other violated invariant.
    pub fn validate(&self) -> Result<()> {
        if self.start_time >= self.end_time {
            return Err(SchedulingError::invalid(format!(
                "start time {} must be before end time {}",
                self.start_time, self.end_time
            )));
        }
        if self.slot_duration < MIN_SLOT_DURATION {
            return Err(SchedulingError::invalid(format!(
                "slot duration must be at least {} minutes, got {}",
                MIN_SLOT_DURATION, self.slot_duration
            )));
        }
        if self.max_appointments_per_slot == 0 {
            return Err(SchedulingError::invalid(
                "max appointments per slot must be at least 1",
            ));
        }
        if self.notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
            return Err(SchedulingError::invalid(format!(
                "notes must be at most {} characters",
                MAX_NOTES_LEN
            )));
        }
        parse_timezone(&self.timezone)?;

        if self.is_recurring {
            let (Some(_), Some(until)) = (self.recurrence_pattern, self.recurrence_end_date) else {
                return Err(SchedulingError::invalid(
                    "recurring windows need both a recurrence pattern and an end date",
                ));
            };
            if until < self.date {
                return Err(SchedulingError::InvalidRecurrenceRange {
                    start: self.date,
                    end: until,
                });
            }
        }
        Ok(())
    }

    /// The recurrence rule in force, if the window repeats.
    pub fn recurrence(&self) -> Option<(RecurrencePattern, NaiveDate)> {
        if !self.is_recurring {
            return None;
        }
        self.recurrence_pattern.zip(self.recurrence_end_date)
    }

    /// First and last date the window can apply to.
    pub fn effective_range(&self) -> (NaiveDate, NaiveDate) {
        match self.recurrence() {
            Some((_, until)) => (self.date, until),
            None => (self.date, self.date),
        }
    }

    /// The unfiltered recurrence expansion (exclusions not applied).
    pub fn expansion(&self) -> Result<Expansion> {
        let (start, end) = self.effective_range();
        expand(start, self.recurrence().map(|(pattern, _)| pattern), end)
    }

    /// Whether the window generates slots on `date`.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.expansion().is_ok_and(|e| e.contains(date)) && !self.excluded_dates.contains(&date)
    }

    /// Ordered dates the window generates slots on.
    pub fn applicable_dates(&self) -> Result<Vec<NaiveDate>> {
        Ok(self
            .expansion()?
            .iter()
            .filter(|d| !self.excluded_dates.contains(d))
            .collect())
    }
}

/// A stored availability window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub provider_id: Uuid,
    /// Shared by every window of one recurring series; `None` for one-off windows.
    #[serde(default)]
    pub series_id: Option<Uuid>,
    #[serde(flatten)]
    pub definition: WindowDefinition,
    #[serde(default)]
    pub status: WindowStatus,
    /// Owned by the booking workflow; the engine only initializes it.
    #[serde(default)]
    pub current_appointments: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityWindow {
    pub fn new(provider_id: Uuid, definition: WindowDefinition) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            id,
            provider_id,
            series_id: definition.recurrence().map(|_| id),
            definition,
            status: WindowStatus::Available,
            current_appointments: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One bookable unit of time generated from a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentSlot {
    pub id: Uuid,
    /// Short, human-shareable reference, unique across all slots.
    pub booking_reference: String,
    pub window_id: Uuid,
    pub provider_id: Uuid,
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: SlotStatus,
    pub appointment_type: AppointmentType,
}

/// A window together with its current slot set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledWindow {
    pub window: AvailabilityWindow,
    pub slots: Vec<AppointmentSlot>,
}
