//! Slot generation -- cuts one day's availability window into fixed-length slots.
//!
//! Slots are laid out on the local wall clock: each slot lasts `slot_duration`
//! minutes and the next one starts `break_duration` minutes after it ends.
//! Generation stops before the first slot that would end after the window's
//! end time. Every slot start is then converted to UTC, and the slot end is the
//! UTC start plus the slot duration.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dst::DstPolicy;
use crate::error::{Result, SchedulingError};
use crate::model::{AppointmentSlot, AvailabilityWindow, SlotStatus};
use crate::normalize::{parse_timezone, resolve_local};
use crate::reference::BookingReferences;

/// A generated slot as a pair of UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotTime {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Lazy iterator over local `(start, end)` slot bounds for one date.
#[derive(Debug, Clone)]
pub struct LocalSlots {
    cursor: NaiveDateTime,
    limit: NaiveDateTime,
    slot: Duration,
    step: Duration,
}

impl Iterator for LocalSlots {
    type Item = (NaiveDateTime, NaiveDateTime);

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.cursor + self.slot;
        if end > self.limit {
            return None;
        }
        let start = self.cursor;
        self.cursor += self.step;
        Some((start, end))
    }
}

/// Local slot bounds for `date`, before any timezone conversion.
///
/// Arithmetic runs on full datetimes, so slots never wrap past midnight.
///
/// # Errors
/// Returns `SchedulingError::InvalidWindowDefinition` if `slot_duration` is zero.
pub fn local_slots(
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    slot_duration: u32,
    break_duration: u32,
) -> Result<LocalSlots> {
    if slot_duration == 0 {
        return Err(SchedulingError::invalid("slot duration must be positive"));
    }
    Ok(LocalSlots {
        cursor: date.and_time(start_time),
        limit: date.and_time(end_time),
        slot: Duration::minutes(i64::from(slot_duration)),
        step: Duration::minutes(i64::from(slot_duration) + i64::from(break_duration)),
    })
}

/// Generate the slots for one date of a window, shifting DST-gap starts forward.
///
/// A window shorter than one slot yields an empty list, not an error.
///
/// # Errors
/// - `InvalidTimezone` if `timezone` does not resolve.
/// - `InvalidWindowDefinition` if `slot_duration` is zero.
pub fn generate(
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    slot_duration: u32,
    break_duration: u32,
    timezone: &str,
) -> Result<Vec<SlotTime>> {
    generate_with_policy(
        date,
        start_time,
        end_time,
        slot_duration,
        break_duration,
        timezone,
        DstPolicy::default(),
    )
}

/// Like [`generate`], with an explicit policy for starts inside a DST gap.
///
/// A slot whose shifted start would land inside the previous slot is dropped,
/// so the output never overlaps.
pub fn generate_with_policy(
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    slot_duration: u32,
    break_duration: u32,
    timezone: &str,
    policy: DstPolicy,
) -> Result<Vec<SlotTime>> {
    let tz = parse_timezone(timezone)?;
    let length = Duration::minutes(i64::from(slot_duration));

    let mut slots: Vec<SlotTime> = Vec::new();
    let locals = local_slots(date, start_time, end_time, slot_duration, break_duration)?;
    for (local_start, _) in locals {
        let Some(start) = resolve_local(&tz, local_start, policy) else {
            continue;
        };
        if slots.last().is_some_and(|prev| start < prev.end) {
            continue;
        }
        slots.push(SlotTime {
            start,
            end: start + length,
        });
    }
    Ok(slots)
}

/// Generate slot times for every applicable date of `window`, in order.
///
/// # Errors
/// Returns `InvalidWindowDefinition` when the total exceeds `max_slots`, plus
/// any error from [`generate_with_policy`] or the recurrence expansion.
pub fn window_slot_times(
    window: &AvailabilityWindow,
    policy: DstPolicy,
    max_slots: usize,
) -> Result<Vec<SlotTime>> {
    let def = &window.definition;
    let mut times = Vec::new();
    for date in def.applicable_dates()? {
        times.extend(generate_with_policy(
            date,
            def.start_time,
            def.end_time,
            def.slot_duration,
            def.break_duration,
            &def.timezone,
            policy,
        )?);
        if times.len() > max_slots {
            return Err(SchedulingError::invalid(format!(
                "window would generate more than {} slots",
                max_slots
            )));
        }
    }
    Ok(times)
}

/// Turn slot times into fresh, available slots owned by `window`.
pub fn materialize(
    window: &AvailabilityWindow,
    times: &[SlotTime],
    references: &mut BookingReferences,
) -> Vec<AppointmentSlot> {
    times
        .iter()
        .map(|t| AppointmentSlot {
            id: Uuid::new_v4(),
            booking_reference: references.next_reference(),
            window_id: window.id,
            provider_id: window.provider_id,
            patient_id: None,
            start: t.start,
            end: t.end,
            status: SlotStatus::Available,
            appointment_type: window.definition.appointment_type,
        })
        .collect()
}
