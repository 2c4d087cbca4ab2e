//! # slot-engine
//!
//! Turns provider availability windows into bookable appointment slots.
//!
//! A window declares a local date, a time range, a timezone, and optionally a
//! daily, weekly, or monthly recurrence. The engine expands the recurrence,
//! cuts every applicable date into fixed-length slots, stores slot bounds as
//! UTC instants, and refuses windows that overlap another window of the same
//! provider.
//!
//! ## Modules
//!
//! - [`normalize`] — local date + time + IANA zone → UTC instant
//! - [`dst`] — policy for slot starts inside a DST gap
//! - [`expander`] — start date + pattern + end date → ordered dates
//! - [`slots`] — one date of a window → ordered, non-overlapping slots
//! - [`reference`] — booking reference generation
//! - [`conflict`] — overlap detection between windows of one provider
//! - [`lifecycle`] — create/update/delete/get/list over a store
//! - [`search`] — open-slot search across providers
//! - [`store`] — storage trait and the in-memory store
//! - [`model`] — windows, slots, and their enums
//! - [`config`] — engine settings
//! - [`error`] — error types

pub mod config;
pub mod conflict;
pub mod dst;
pub mod error;
pub mod expander;
pub mod lifecycle;
pub mod model;
pub mod normalize;
pub mod reference;
pub mod search;
pub mod slots;
pub mod store;

pub use config::{EngineConfig, SeriesDeletePolicy};
pub use conflict::{find_conflicts, has_conflict, Candidate, WindowConflict};
pub use dst::DstPolicy;
pub use error::{SchedulingError, StoreError};
pub use expander::{expand, Expansion, RecurrencePattern};
pub use lifecycle::{AvailabilityManager, ListFilter};
pub use model::{
    AppointmentSlot, AppointmentType, AvailabilityWindow, Location, LocationType, Pricing,
    ScheduledWindow, SlotStatus, WindowDefinition, WindowStatus,
};
pub use normalize::normalize;
pub use search::{search_slots, ProviderMatches, SlotMatch, SlotSearch};
pub use slots::{generate, SlotTime};
pub use store::{AvailabilityStore, MemoryStore, Removal, WindowQuery};
