//! Property-based tests for recurrence expansion using proptest.
//!
//! Daily, weekly, and (for days 1-28) monthly expansion is also checked against
//! the `rrule` crate's RFC 5545 expansion as an independent oracle.

use chrono::{Datelike, Duration, Months, NaiveDate};
use proptest::prelude::*;
use rrule::RRuleSet;
use slot_engine::{expand, RecurrencePattern};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_pattern() -> impl Strategy<Value = RecurrencePattern> {
    prop_oneof![
        Just(RecurrencePattern::Daily),
        Just(RecurrencePattern::Weekly),
        Just(RecurrencePattern::Monthly),
    ]
}

/// Any real calendar date in 2023-2026.
fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..(4 * 365)).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + Duration::days(offset)
    })
}

/// Dates whose day-of-month exists in every month.
fn arb_plain_date() -> impl Strategy<Value = NaiveDate> {
    (2023i32..=2026, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn arb_span_days() -> impl Strategy<Value = i64> {
    0i64..=400
}

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    }
}

fn step_from(pattern: RecurrencePattern, date: NaiveDate) -> NaiveDate {
    match pattern {
        RecurrencePattern::Daily => date + Duration::days(1),
        RecurrencePattern::Weekly => date + Duration::days(7),
        RecurrencePattern::Monthly => date + Months::new(1),
    }
}

fn rrule_dates(freq: &str, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let text = format!(
        "DTSTART;TZID=UTC:{}T000000\nRRULE:FREQ={};UNTIL={}T000000Z",
        start.format("%Y%m%d"),
        freq,
        end.format("%Y%m%d"),
    );
    let set: RRuleSet = text.parse().expect("oracle rule must parse");
    set.all(500).dates.iter().map(|dt| dt.date_naive()).collect()
}

// ---------------------------------------------------------------------------
// Property 1: every date lies in [start, end], and the first is start
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn dates_stay_within_bounds(
        pattern in arb_pattern(),
        start in arb_date(),
        span in arb_span_days(),
    ) {
        let end = start + Duration::days(span);
        let dates: Vec<NaiveDate> = expand(start, Some(pattern), end).unwrap().iter().collect();

        prop_assert_eq!(dates.first().copied(), Some(start));
        for date in &dates {
            prop_assert!(*date >= start && *date <= end, "{} outside [{}, {}]", date, start, end);
        }
        // The next step after the last date would pass the end.
        if let Some(last) = dates.last() {
            let anchored_next = pattern.nth_from(start, dates.len() as u32);
            prop_assert!(anchored_next.is_none_or(|n| n > end), "stopped early at {}", last);
        }
    }
}

// ---------------------------------------------------------------------------
// Property 2: consecutive dates differ by exactly one step
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn consecutive_dates_differ_by_one_step(
        pattern in arb_pattern(),
        start in arb_plain_date(),
        span in arb_span_days(),
    ) {
        let end = start + Duration::days(span);
        let dates: Vec<NaiveDate> = expand(start, Some(pattern), end).unwrap().iter().collect();
        for pair in dates.windows(2) {
            prop_assert_eq!(pair[1], step_from(pattern, pair[0]));
        }
    }
}

// ---------------------------------------------------------------------------
// Property 3: monthly series keep the start's day, clamped to month length
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn monthly_keeps_day_of_month_or_clamps(start in arb_date(), span in arb_span_days()) {
        let end = start + Duration::days(span);
        for date in expand(start, Some(RecurrencePattern::Monthly), end).unwrap().iter() {
            if date.day() != start.day() {
                prop_assert!(date.day() < start.day());
                // Clamped dates are the last day of their month.
                prop_assert_eq!((date + Duration::days(1)).day(), 1);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Property 4: no pattern means exactly one date
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn no_pattern_is_single_date(start in arb_date(), span in arb_span_days()) {
        let end = start + Duration::days(span);
        let dates: Vec<NaiveDate> = expand(start, None, end).unwrap().iter().collect();
        prop_assert_eq!(dates, vec![start]);
    }
}

// ---------------------------------------------------------------------------
// Property 5: agreement with RFC 5545 expansion
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

    #[test]
    fn matches_rrule_oracle(
        pattern in arb_pattern(),
        start in arb_plain_date(),
        span in arb_span_days(),
    ) {
        let end = start + Duration::days(span);
        let ours: Vec<NaiveDate> = expand(start, Some(pattern), end).unwrap().iter().collect();
        let oracle = rrule_dates(&pattern.as_str().to_uppercase(), start, end);
        prop_assert_eq!(ours, oracle);
    }
}
