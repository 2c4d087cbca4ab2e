//! Error types for slot-engine operations.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// Failures reported by a storage backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A slot with this booking reference is already stored.
    #[error("Duplicate booking reference: {0}")]
    DuplicateBookingReference(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid recurrence range: end {end} is before start {start}")]
    InvalidRecurrenceRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid window definition: {0}")]
    InvalidWindowDefinition(String),

    /// The candidate overlaps `existing_window` on `date`.
    #[error("Overlapping availability exists on {date} (window {existing_window})")]
    OverlappingAvailability {
        date: NaiveDate,
        existing_window: Uuid,
    },

    #[error("Availability window not found: {0}")]
    WindowNotFound(Uuid),

    #[error("Appointment slot not found: {0}")]
    SlotNotFound(Uuid),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl SchedulingError {
    /// HTTP status a presentation layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            SchedulingError::WindowNotFound(_) | SchedulingError::SlotNotFound(_) => 404,
            SchedulingError::OverlappingAvailability { .. } => 409,
            SchedulingError::InvalidTimezone(_)
            | SchedulingError::InvalidRecurrenceRange { .. }
            | SchedulingError::InvalidWindowDefinition(_) => 422,
            SchedulingError::Storage(_) => 500,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SchedulingError::InvalidWindowDefinition(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SchedulingError>;
