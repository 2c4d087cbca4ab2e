//! Tests for window definitions, their validation, and their wire format.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde_json::json;
use slot_engine::model::{MAX_NOTES_LEN, MIN_SLOT_DURATION};
use slot_engine::{
    AppointmentType, AvailabilityWindow, LocationType, RecurrencePattern, SchedulingError,
    WindowDefinition, WindowStatus,
};
use uuid::Uuid;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn base() -> WindowDefinition {
    WindowDefinition::new(d(2024, 6, 10), t(9, 0), t(10, 0), "America/New_York")
}

#[test]
fn minimal_payload_takes_defaults() {
    let def: WindowDefinition = serde_json::from_value(json!({
        "date": "2024-06-10",
        "start_time": "09:00:00",
        "end_time": "10:00:00",
        "timezone": "America/New_York"
    }))
    .unwrap();

    assert_eq!(def, base());
    assert_eq!(def.slot_duration, 30);
    assert_eq!(def.break_duration, 0);
    assert_eq!(def.max_appointments_per_slot, 1);
    assert_eq!(def.appointment_type, AppointmentType::Consultation);
    assert!(def.validate().is_ok());
}

#[test]
fn full_payload_round_trips_nested_fields() {
    let def: WindowDefinition = serde_json::from_value(json!({
        "date": "2024-06-01",
        "start_time": "09:00:00",
        "end_time": "12:00:00",
        "timezone": "Europe/London",
        "is_recurring": true,
        "recurrence_pattern": "weekly",
        "recurrence_end_date": "2024-08-31",
        "slot_duration": 20,
        "break_duration": 5,
        "appointment_type": "follow_up",
        "location": { "type": "home_visit", "address": "1 Main St" },
        "pricing": { "base_fee": "150.00", "insurance_accepted": true },
        "special_requirements": ["wheelchair access"]
    }))
    .unwrap();

    assert_eq!(
        def.recurrence(),
        Some((RecurrencePattern::Weekly, d(2024, 8, 31)))
    );
    assert_eq!(def.appointment_type, AppointmentType::FollowUp);
    let location = def.location.as_ref().unwrap();
    assert_eq!(location.kind, LocationType::HomeVisit);
    assert_eq!(location.room_number, None);
    let pricing = def.pricing.as_ref().unwrap();
    assert_eq!(pricing.base_fee, Some(Decimal::new(15000, 2)));
    assert_eq!(pricing.currency, "USD");
    assert!(def.validate().is_ok());

    let back: WindowDefinition =
        serde_json::from_value(serde_json::to_value(&def).unwrap()).unwrap();
    assert_eq!(back, def);
}

#[test]
fn unknown_enum_values_are_rejected_not_defaulted() {
    let payload = json!({
        "date": "2024-06-10",
        "start_time": "09:00:00",
        "end_time": "10:00:00",
        "timezone": "UTC",
        "appointment_type": "surgery"
    });
    assert!(serde_json::from_value::<WindowDefinition>(payload).is_err());

    assert!(matches!(
        "surgery".parse::<AppointmentType>(),
        Err(SchedulingError::InvalidWindowDefinition(_))
    ));
    assert!("fortnightly".parse::<RecurrencePattern>().is_err());
    assert!("on_hold".parse::<WindowStatus>().is_err());
}

#[test]
fn enum_parsing_accepts_case_and_hyphen_variants() {
    assert_eq!("follow-up".parse::<AppointmentType>().unwrap(), AppointmentType::FollowUp);
    assert_eq!("HOME_VISIT".parse::<LocationType>().unwrap(), LocationType::HomeVisit);
    assert_eq!(" Maintenance ".parse::<WindowStatus>().unwrap(), WindowStatus::Maintenance);
    assert_eq!("MONTHLY".parse::<RecurrencePattern>().unwrap(), RecurrencePattern::Monthly);
}

#[test]
fn validation_rules() {
    let equal_times = WindowDefinition {
        end_time: t(9, 0),
        ..base()
    };
    assert!(matches!(
        equal_times.validate(),
        Err(SchedulingError::InvalidWindowDefinition(_))
    ));

    assert!(base().with_slots(MIN_SLOT_DURATION, 0).validate().is_ok());
    assert!(base().with_slots(MIN_SLOT_DURATION - 1, 0).validate().is_err());

    let no_capacity = WindowDefinition {
        max_appointments_per_slot: 0,
        ..base()
    };
    assert!(no_capacity.validate().is_err());

    let long_notes = WindowDefinition {
        notes: Some("x".repeat(MAX_NOTES_LEN + 1)),
        ..base()
    };
    assert!(long_notes.validate().is_err());
    let max_notes = WindowDefinition {
        notes: Some("é".repeat(MAX_NOTES_LEN)),
        ..base()
    };
    assert!(max_notes.validate().is_ok());

    let bad_zone = WindowDefinition {
        timezone: "Mars/Olympus_Mons".to_string(),
        ..base()
    };
    assert!(matches!(
        bad_zone.validate(),
        Err(SchedulingError::InvalidTimezone(_))
    ));
}

#[test]
fn pattern_without_recurring_flag_is_a_single_date() {
    let def = WindowDefinition {
        recurrence_pattern: Some(RecurrencePattern::Daily),
        recurrence_end_date: Some(d(2024, 6, 20)),
        ..base()
    };
    assert!(def.validate().is_ok());
    assert_eq!(def.recurrence(), None);
    assert_eq!(def.applicable_dates().unwrap(), vec![d(2024, 6, 10)]);
}

#[test]
fn applicable_dates_skip_exclusions() {
    let mut def = base().recurring(RecurrencePattern::Daily, d(2024, 6, 14));
    def.excluded_dates = vec![d(2024, 6, 12)];

    assert_eq!(
        def.applicable_dates().unwrap(),
        vec![d(2024, 6, 10), d(2024, 6, 11), d(2024, 6, 13), d(2024, 6, 14)]
    );
    assert!(def.applies_on(d(2024, 6, 11)));
    assert!(!def.applies_on(d(2024, 6, 12)));
    assert!(!def.applies_on(d(2024, 6, 15)));
    assert_eq!(def.effective_range(), (d(2024, 6, 10), d(2024, 6, 14)));
}

#[test]
fn new_window_is_available_and_empty() {
    let provider = Uuid::new_v4();
    let single = AvailabilityWindow::new(provider, base());
    assert_eq!(single.status, WindowStatus::Available);
    assert_eq!(single.current_appointments, 0);
    assert_eq!(single.series_id, None);

    let series = AvailabilityWindow::new(
        provider,
        base().recurring(RecurrencePattern::Monthly, d(2024, 12, 10)),
    );
    assert_eq!(series.series_id, Some(series.id));
}

#[test]
fn stored_window_serializes_flat() {
    let window = AvailabilityWindow::new(Uuid::new_v4(), base());
    let value = serde_json::to_value(&window).unwrap();
    assert_eq!(value["timezone"], "America/New_York");
    assert_eq!(value["status"], "available");
    assert_eq!(value["appointment_type"], "consultation");

    let back: AvailabilityWindow = serde_json::from_value(value).unwrap();
    assert_eq!(back, window);
}
