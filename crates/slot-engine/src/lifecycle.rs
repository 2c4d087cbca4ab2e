//! Availability lifecycle: create, update, delete, and read windows while
//! keeping each window's slots equal to the expansion of its current definition.
//!
//! Mutations for one provider are serialized through a per-provider async
//! mutex, so two concurrent creates cannot both pass the conflict check
//! against the same snapshot. Different providers never wait on each other.
//! Slot sets are generated in full before anything is written, then swapped in
//! with a single atomic store call.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{EngineConfig, SeriesDeletePolicy};
use crate::conflict::{conflicts, Candidate};
use crate::error::{Result, SchedulingError, StoreError};
use crate::model::{
    AppointmentSlot, AppointmentType, AvailabilityWindow, ScheduledWindow, WindowDefinition,
    WindowStatus,
};
use crate::reference::BookingReferences;
use crate::search::{search_slots, ProviderMatches, SlotSearch};
use crate::slots::{materialize, window_slot_times};
use crate::store::{AvailabilityStore, Removal, WindowQuery};

/// Attempts at persisting a slot set before a booking-reference collision is
/// reported to the caller.
const REFERENCE_ATTEMPTS: usize = 3;

/// Filters for [`AvailabilityManager::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: Option<WindowStatus>,
    pub appointment_type: Option<AppointmentType>,
    pub timezone: Option<String>,
}

impl ListFilter {
    pub fn between(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            status: None,
            appointment_type: None,
            timezone: None,
        }
    }
}

/// One async mutex per provider with a pending or running mutation. Entries
/// are evicted when the last holder releases them.
#[derive(Debug, Default)]
struct ProviderLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl ProviderLocks {
    async fn acquire(&self, provider_id: Uuid) -> ProviderGuard<'_> {
        // The clone happens under the shard lock, so eviction never races it.
        let lock = self.locks.entry(provider_id).or_default().clone();
        ProviderGuard {
            locks: self,
            provider_id,
            guard: Some(lock.lock_owned().await),
        }
    }
}

struct ProviderGuard<'a> {
    locks: &'a ProviderLocks,
    provider_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ProviderGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .locks
            .remove_if(&self.provider_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct AvailabilityManager<S> {
    store: Arc<S>,
    config: EngineConfig,
    locks: ProviderLocks,
}

impl<S: AvailabilityStore> AvailabilityManager<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            locks: ProviderLocks::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create a window for `provider_id` and generate its slots.
    ///
    /// # Errors
    /// - Validation errors from [`WindowDefinition::validate`].
    /// - `OverlappingAvailability` if the window overlaps one of the provider's windows.
    pub async fn create(
        &self,
        provider_id: Uuid,
        definition: WindowDefinition,
    ) -> Result<ScheduledWindow> {
        debug!(%provider_id, date = %definition.date, "creating availability window");
        definition.validate()?;

        let _guard = self.locks.acquire(provider_id).await;
        let candidate = Candidate {
            window_id: None,
            provider_id,
            definition: &definition,
        };
        self.ensure_no_conflict(&candidate).await?;

        let window = AvailabilityWindow::new(provider_id, definition);
        let scheduled = self.persist(window).await?;
        info!(
            %provider_id,
            window_id = %scheduled.window.id,
            slots = scheduled.slots.len(),
            "availability window created"
        );
        Ok(scheduled)
    }

    /// Replace every mutable field of a window and regenerate its slots.
    ///
    /// # Errors
    /// - `WindowNotFound` if the window is missing or owned by another provider,
    ///   reported before the definition is validated.
    /// - Validation errors from [`WindowDefinition::validate`].
    /// - `OverlappingAvailability` when re-checking is enabled and the edit overlaps.
    pub async fn update(
        &self,
        provider_id: Uuid,
        window_id: Uuid,
        definition: WindowDefinition,
    ) -> Result<ScheduledWindow> {
        debug!(%provider_id, %window_id, "updating availability window");

        let _guard = self.locks.acquire(provider_id).await;
        let mut window = self.find_owned(provider_id, window_id).await?;
        definition.validate()?;

        if self.config.recheck_conflicts_on_update {
            let candidate = Candidate {
                window_id: Some(window_id),
                provider_id,
                definition: &definition,
            };
            self.ensure_no_conflict(&candidate).await?;
        }

        window.series_id = definition
            .recurrence()
            .map(|_| window.series_id.unwrap_or(window.id));
        window.definition = definition;

        let scheduled = self.persist(window).await?;
        info!(
            %provider_id,
            %window_id,
            slots = scheduled.slots.len(),
            "availability window updated"
        );
        Ok(scheduled)
    }

    /// Delete a window, or its whole recurring series, with all slots.
    ///
    /// `reason` is recorded in the log for auditing and has no other effect.
    ///
    /// # Errors
    /// Returns `WindowNotFound` if the window is missing or owned by another provider.
    pub async fn delete(
        &self,
        provider_id: Uuid,
        window_id: Uuid,
        delete_recurring: bool,
        reason: Option<&str>,
    ) -> Result<Removal> {
        debug!(%provider_id, %window_id, delete_recurring, "deleting availability window");

        let _guard = self.locks.acquire(provider_id).await;
        let window = self.find_owned(provider_id, window_id).await?;

        let ids = match window.definition.recurrence() {
            Some((_, until)) if delete_recurring => self.series_members(&window, until).await?,
            _ => vec![window.id],
        };

        let removal = self.store.delete_windows_cascade(&ids).await?;
        info!(
            %provider_id,
            %window_id,
            windows = removal.windows,
            slots = removal.slots,
            reason = reason.unwrap_or(""),
            "availability removed"
        );
        Ok(removal)
    }

    /// Cancel a single occurrence of a recurring window, keeping the rest.
    ///
    /// # Errors
    /// - `WindowNotFound` if the window is missing or owned by another provider.
    /// - `InvalidWindowDefinition` if the window does not apply on `date`.
    pub async fn cancel_occurrence(
        &self,
        provider_id: Uuid,
        window_id: Uuid,
        date: NaiveDate,
        reason: Option<&str>,
    ) -> Result<ScheduledWindow> {
        debug!(%provider_id, %window_id, %date, "cancelling occurrence");

        let _guard = self.locks.acquire(provider_id).await;
        let mut window = self.find_owned(provider_id, window_id).await?;
        if !window.definition.applies_on(date) {
            return Err(SchedulingError::invalid(format!(
                "window {} has no occurrence on {}",
                window_id, date
            )));
        }

        let excluded = &mut window.definition.excluded_dates;
        excluded.push(date);
        excluded.sort_unstable();
        excluded.dedup();

        let scheduled = self.persist(window).await?;
        info!(
            %provider_id,
            %window_id,
            %date,
            slots = scheduled.slots.len(),
            reason = reason.unwrap_or(""),
            "occurrence cancelled"
        );
        Ok(scheduled)
    }

    /// A window with its current slots.
    ///
    /// # Errors
    /// Returns `WindowNotFound` if the window is missing or owned by another provider.
    pub async fn get(&self, provider_id: Uuid, window_id: Uuid) -> Result<ScheduledWindow> {
        let window = self.find_owned(provider_id, window_id).await?;
        let slots = self.store.find_slots(window.id).await?;
        Ok(ScheduledWindow { window, slots })
    }

    /// The provider's windows dated within the filter's range, each with its slots.
    pub async fn list(
        &self,
        provider_id: Uuid,
        filter: &ListFilter,
    ) -> Result<Vec<ScheduledWindow>> {
        let query = WindowQuery {
            provider_id: Some(provider_id),
            from: filter.start_date,
            to: filter.end_date,
            status: filter.status,
            appointment_type: filter.appointment_type,
            timezone: filter.timezone.clone(),
        };
        let windows = self.store.list_windows(&query).await?;
        self.with_slots(windows).await
    }

    /// # Errors
    /// Returns `SlotNotFound` if no slot has this id.
    pub async fn slot(&self, slot_id: Uuid) -> Result<AppointmentSlot> {
        self.store
            .find_slot(slot_id)
            .await?
            .ok_or(SchedulingError::SlotNotFound(slot_id))
    }

    /// The provider's slots starting in `[from, to)`.
    pub async fn slots_between(
        &self,
        provider_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AppointmentSlot>> {
        Ok(self.store.provider_slots(provider_id, from, to).await?)
    }

    /// Open slots across all providers matching `search`.
    pub async fn search(&self, search: &SlotSearch) -> Result<Vec<ProviderMatches>> {
        let query = WindowQuery {
            provider_id: None,
            from: NaiveDate::MIN,
            to: search.end_date,
            status: None,
            appointment_type: search.appointment_type,
            timezone: search.timezone.clone(),
        };
        let windows = self.store.list_windows(&query).await?;
        let scheduled = self.with_slots(windows).await?;
        Ok(search_slots(&scheduled, search))
    }

    async fn find_owned(&self, provider_id: Uuid, window_id: Uuid) -> Result<AvailabilityWindow> {
        match self.store.find_window(window_id).await? {
            Some(window) if window.provider_id == provider_id => Ok(window),
            _ => {
                warn!(%provider_id, %window_id, "availability window not found");
                Err(SchedulingError::WindowNotFound(window_id))
            }
        }
    }

    async fn with_slots(&self, windows: Vec<AvailabilityWindow>) -> Result<Vec<ScheduledWindow>> {
        let mut scheduled = Vec::with_capacity(windows.len());
        for window in windows {
            let slots = self.store.find_slots(window.id).await?;
            scheduled.push(ScheduledWindow { window, slots });
        }
        Ok(scheduled)
    }

    async fn ensure_no_conflict(&self, candidate: &Candidate<'_>) -> Result<()> {
        // Recurring windows dated before the candidate can still reach into its range.
        let (_, last) = candidate.definition.effective_range();
        let existing = self
            .store
            .list_windows(&WindowQuery::between(candidate.provider_id, NaiveDate::MIN, last))
            .await?;

        let first = conflicts(&existing, candidate).next();
        match first {
            Some(conflict) => {
                warn!(
                    provider_id = %candidate.provider_id,
                    date = %conflict.date,
                    overlap_minutes = conflict.overlap_minutes,
                    "overlapping availability rejected"
                );
                Err(SchedulingError::OverlappingAvailability {
                    date: conflict.date,
                    existing_window: conflict.existing_window.unwrap_or_default(),
                })
            }
            None => Ok(()),
        }
    }

    async fn series_members(
        &self,
        window: &AvailabilityWindow,
        until: NaiveDate,
    ) -> Result<Vec<Uuid>> {
        let ids = match self.config.series_delete {
            SeriesDeletePolicy::DateRange => self
                .store
                .list_windows(&WindowQuery::between(
                    window.provider_id,
                    window.definition.date,
                    until,
                ))
                .await?
                .into_iter()
                .map(|w| w.id)
                .collect(),
            SeriesDeletePolicy::SeriesId => match window.series_id {
                Some(series) => self
                    .store
                    .list_windows(&WindowQuery::all_for(window.provider_id))
                    .await?
                    .into_iter()
                    .filter(|w| w.series_id == Some(series))
                    .map(|w| w.id)
                    .collect(),
                None => vec![window.id],
            },
        };
        Ok(ids)
    }

    /// Generate the window's slot set and store it with the window in one step.
    async fn persist(&self, window: AvailabilityWindow) -> Result<ScheduledWindow> {
        let times = window_slot_times(
            &window,
            self.config.dst_policy,
            self.config.max_slots_per_window,
        )?;

        let mut attempt = 1;
        loop {
            let mut references = BookingReferences::new(self.config.booking_reference_length);
            let slots = materialize(&window, &times, &mut references);
            match self.store.save_window_with_slots(window.clone(), slots.clone()).await {
                Ok(saved) => return Ok(ScheduledWindow { window: saved, slots }),
                Err(StoreError::DuplicateBookingReference(reference))
                    if attempt < REFERENCE_ATTEMPTS =>
                {
                    warn!(
                        window_id = %window.id,
                        %reference,
                        attempt,
                        "booking reference collision, regenerating"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
