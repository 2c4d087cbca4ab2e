//! Tests for open-slot search.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use slot_engine::{
    search_slots, AppointmentType, AvailabilityManager, EngineConfig, ListFilter, Location,
    LocationType, MemoryStore, Pricing, RecurrencePattern, ScheduledWindow, SlotSearch, SlotStatus,
    WindowDefinition, WindowStatus,
};
use uuid::Uuid;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn priced(def: WindowDefinition, fee: i64, insurance: bool) -> WindowDefinition {
    WindowDefinition {
        pricing: Some(Pricing {
            base_fee: Some(Decimal::new(fee, 0)),
            insurance_accepted: Some(insurance),
            ..Pricing::default()
        }),
        ..def
    }
}

fn located(def: WindowDefinition, kind: LocationType) -> WindowDefinition {
    WindowDefinition {
        location: Some(Location {
            kind,
            address: None,
            room_number: Some("4B".to_string()),
        }),
        ..def
    }
}

struct Fixture {
    manager: AvailabilityManager<MemoryStore>,
    clinic: Uuid,
    remote: Uuid,
}

/// `clinic`: a priced, insured clinic window on 06-10 and an emergency window on 06-11.
/// `remote`: a cheaper telemedicine series on 06-10 and 06-17, Tokyo time.
async fn fixture() -> Fixture {
    let manager = AvailabilityManager::new(Arc::new(MemoryStore::new()), EngineConfig::default());
    let clinic = Uuid::new_v4();
    let remote = Uuid::new_v4();

    let clinic_def = located(
        priced(
            WindowDefinition::new(d(2024, 6, 10), t(9, 0), t(10, 0), "America/New_York"),
            200,
            true,
        ),
        LocationType::Clinic,
    );
    manager.create(clinic, clinic_def).await.unwrap();
    manager
        .create(
            clinic,
            WindowDefinition::new(d(2024, 6, 11), t(9, 0), t(9, 30), "America/New_York")
                .with_appointment_type(AppointmentType::Emergency),
        )
        .await
        .unwrap();

    let remote_def = located(
        priced(
            WindowDefinition::new(d(2024, 6, 10), t(8, 0), t(9, 0), "Asia/Tokyo")
                .recurring(RecurrencePattern::Weekly, d(2024, 6, 17))
                .with_appointment_type(AppointmentType::Telemedicine),
            80,
            false,
        ),
        LocationType::Telemedicine,
    );
    manager.create(remote, remote_def).await.unwrap();

    Fixture {
        manager,
        clinic,
        remote,
    }
}

#[tokio::test]
async fn unfiltered_search_groups_by_provider_in_time_order() {
    let f = fixture().await;
    let results = f
        .manager
        .search(&SlotSearch::between(d(2024, 6, 1), d(2024, 6, 30)))
        .await
        .unwrap();

    // Tokyo 08:00 on 06-10 is 23:00Z on 06-09, earlier than anything in New York.
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].provider_id, f.remote);
    assert_eq!(results[0].slots.len(), 4);
    assert_eq!(results[1].provider_id, f.clinic);
    assert_eq!(results[1].slots.len(), 3);

    for provider in &results {
        assert!(provider
            .slots
            .windows(2)
            .all(|p| p[0].slot.start <= p[1].slot.start));
    }
}

#[tokio::test]
async fn matches_use_the_window_local_date() {
    let f = fixture().await;
    let results = f
        .manager
        .search(&SlotSearch::between(d(2024, 6, 10), d(2024, 6, 10)))
        .await
        .unwrap();

    let remote = results.iter().find(|p| p.provider_id == f.remote).unwrap();
    assert_eq!(remote.slots.len(), 2);
    assert!(remote.slots.iter().all(|m| m.date == d(2024, 6, 10)));
    assert_eq!(
        remote.slots[0].location.as_ref().map(|l| l.kind),
        Some(LocationType::Telemedicine)
    );

    let clinic = results.iter().find(|p| p.provider_id == f.clinic).unwrap();
    assert_eq!(clinic.slots.len(), 2);
}

#[tokio::test]
async fn criteria_narrow_the_results() {
    let f = fixture().await;
    let june = SlotSearch::between(d(2024, 6, 1), d(2024, 6, 30));

    let telemedicine = SlotSearch {
        appointment_type: Some(AppointmentType::Telemedicine),
        ..june.clone()
    };
    let results = f.manager.search(&telemedicine).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].provider_id, f.remote);

    let insured = SlotSearch {
        insurance_accepted: Some(true),
        ..june.clone()
    };
    let results = f.manager.search(&insured).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].provider_id, f.clinic);
    assert_eq!(results[0].slots.len(), 2);

    // The unpriced emergency window never satisfies a fee ceiling.
    let cheap = SlotSearch {
        max_fee: Some(Decimal::new(100, 0)),
        ..june.clone()
    };
    let results = f.manager.search(&cheap).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].provider_id, f.remote);

    let ceiling = SlotSearch {
        max_fee: Some(Decimal::new(200, 0)),
        ..june.clone()
    };
    let total: usize = f
        .manager
        .search(&ceiling)
        .await
        .unwrap()
        .iter()
        .map(|p| p.slots.len())
        .sum();
    assert_eq!(total, 4 + 2);

    let home_visits = SlotSearch {
        location_type: Some(LocationType::HomeVisit),
        ..june
    };
    assert!(f.manager.search(&home_visits).await.unwrap().is_empty());
}

#[tokio::test]
async fn timezone_criterion_keeps_matching_windows_only() {
    let f = fixture().await;
    let june = SlotSearch::between(d(2024, 6, 1), d(2024, 6, 30));

    let tokyo = SlotSearch {
        timezone: Some("Asia/Tokyo".to_string()),
        ..june.clone()
    };
    let results = f.manager.search(&tokyo).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].provider_id, f.remote);
    assert_eq!(results[0].slots.len(), 4);

    let windows = f
        .manager
        .list(f.clinic, &ListFilter::between(d(2024, 6, 1), d(2024, 6, 30)))
        .await
        .unwrap();
    let new_york = SlotSearch {
        timezone: Some("America/New_York".to_string()),
        ..june.clone()
    };
    assert_eq!(search_slots(&windows, &new_york)[0].slots.len(), 3);

    let london = SlotSearch {
        timezone: Some("Europe/London".to_string()),
        ..june
    };
    assert!(search_slots(&windows, &london).is_empty());
    assert!(f.manager.search(&london).await.unwrap().is_empty());
}

#[tokio::test]
async fn range_outside_all_windows_is_empty() {
    let f = fixture().await;
    let results = f
        .manager
        .search(&SlotSearch::between(d(2024, 7, 1), d(2024, 7, 31)))
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn unavailable_slots_and_windows_are_hidden_unless_asked() {
    let f = fixture().await;
    let mut windows: Vec<ScheduledWindow> = f
        .manager
        .list(f.clinic, &ListFilter::between(d(2024, 6, 1), d(2024, 6, 30)))
        .await
        .unwrap();
    windows[0].slots[0].status = SlotStatus::Booked;
    windows[1].window.status = WindowStatus::Blocked;

    let june = SlotSearch::between(d(2024, 6, 1), d(2024, 6, 30));
    let open = search_slots(&windows, &june);
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].slots.len(), 1);

    let everything = SlotSearch {
        available_only: false,
        ..june
    };
    let all = search_slots(&windows, &everything);
    assert_eq!(all[0].slots.len(), 3);
}
