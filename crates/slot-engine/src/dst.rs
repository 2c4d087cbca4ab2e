//! DST transition policies for slot start times.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Policy for slot start times that fall inside a DST gap.
///
/// Ambiguous local times (the repeated hour when clocks fall back) always
/// resolve to the earlier instant; the policy only governs times that do not
/// exist on the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Shift forward by the length of the gap (02:30 becomes 03:30 on a
    /// one-hour spring-forward day).
    #[default]
    ShiftForward,
    /// Drop slots whose local start does not exist.
    Skip,
}

impl DstPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DstPolicy::ShiftForward => "shift_forward",
            DstPolicy::Skip => "skip",
        }
    }
}

impl FromStr for DstPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "shift_forward" => Ok(DstPolicy::ShiftForward),
            "skip" => Ok(DstPolicy::Skip),
            other => Err(format!("unknown DST policy '{}'", other)),
        }
    }
}
