//! Engine configuration, loaded from `SLOT_ENGINE_*` environment variables.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dst::DstPolicy;

/// How "delete the whole recurring series" picks the windows to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesDeletePolicy {
    /// Every window of the provider dated within `[date, recurrence_end_date]`.
    /// Independent windows in that range are removed too.
    #[default]
    DateRange,
    /// Only windows carrying the same `series_id`.
    SeriesId,
}

impl FromStr for SeriesDeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "date_range" => Ok(SeriesDeletePolicy::DateRange),
            "series_id" => Ok(SeriesDeletePolicy::SeriesId),
            other => Err(format!("unknown series delete policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub dst_policy: DstPolicy,
    pub series_delete: SeriesDeletePolicy,
    /// Reject edits that would overlap another window of the same provider.
    pub recheck_conflicts_on_update: bool,
    pub max_slots_per_window: usize,
    pub booking_reference_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dst_policy: DstPolicy::default(),
            series_delete: SeriesDeletePolicy::default(),
            recheck_conflicts_on_update: true,
            max_slots_per_window: 10_000,
            booking_reference_length: 10,
        }
    }
}

impl EngineConfig {
    /// Read the configuration from the environment (and a `.env` file if present).
    ///
    /// Unset variables keep their defaults; unparseable ones are logged and ignored.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();
        Self {
            dst_policy: env_or("SLOT_ENGINE_DST_POLICY", defaults.dst_policy),
            series_delete: env_or("SLOT_ENGINE_SERIES_DELETE", defaults.series_delete),
            recheck_conflicts_on_update: env_or(
                "SLOT_ENGINE_RECHECK_ON_UPDATE",
                defaults.recheck_conflicts_on_update,
            ),
            max_slots_per_window: env_or(
                "SLOT_ENGINE_MAX_SLOTS_PER_WINDOW",
                defaults.max_slots_per_window,
            ),
            booking_reference_length: env_or(
                "SLOT_ENGINE_BOOKING_REF_LEN",
                defaults.booking_reference_length,
            ),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("{} has invalid value '{}' ({}), using default", key, raw, e);
            default
        }),
        Err(_) => default,
    }
}
