//! Storage collaborator for windows and their slots.
//!
//! The lifecycle manager only needs the operations on [`AvailabilityStore`].
//! The two compound operations, [`AvailabilityStore::save_window_with_slots`]
//! and [`AvailabilityStore::delete_windows_cascade`], must be atomic: a reader
//! sees either the old slot set or the new one, never a mix or an orphan.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{AppointmentSlot, AppointmentType, AvailabilityWindow, WindowStatus};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Selects windows by date range plus optional equality filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowQuery {
    /// `None` matches every provider.
    pub provider_id: Option<Uuid>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub status: Option<WindowStatus>,
    pub appointment_type: Option<AppointmentType>,
    pub timezone: Option<String>,
}

impl WindowQuery {
    /// Windows of `provider_id` whose date lies in `[from, to]`.
    pub fn between(provider_id: Uuid, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            provider_id: Some(provider_id),
            from,
            to,
            status: None,
            appointment_type: None,
            timezone: None,
        }
    }

    /// Every window of `provider_id`, regardless of date.
    pub fn all_for(provider_id: Uuid) -> Self {
        Self::between(provider_id, NaiveDate::MIN, NaiveDate::MAX)
    }

    pub fn matches(&self, window: &AvailabilityWindow) -> bool {
        let def = &window.definition;
        self.provider_id.is_none_or(|p| p == window.provider_id)
            && def.date >= self.from
            && def.date <= self.to
            && self.status.is_none_or(|s| s == window.status)
            && self.appointment_type.is_none_or(|t| t == def.appointment_type)
            && self.timezone.as_deref().is_none_or(|tz| tz == def.timezone)
    }
}

/// Counts of what a cascading delete removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removal {
    pub windows: usize,
    pub slots: usize,
}

#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn insert_window(&self, window: AvailabilityWindow) -> StoreResult<AvailabilityWindow>;

    async fn find_window(&self, id: Uuid) -> StoreResult<Option<AvailabilityWindow>>;

    /// Matching windows ordered by date, then start time.
    async fn list_windows(&self, query: &WindowQuery) -> StoreResult<Vec<AvailabilityWindow>>;

    /// Delete a window and every slot it owns.
    async fn delete_window(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_slots(&self, slots: Vec<AppointmentSlot>) -> StoreResult<()>;

    async fn find_slot(&self, id: Uuid) -> StoreResult<Option<AppointmentSlot>>;

    /// Slots owned by `window_id`, ordered by start.
    async fn find_slots(&self, window_id: Uuid) -> StoreResult<Vec<AppointmentSlot>>;

    /// A provider's slots starting in `[from, to)`, ordered by start.
    async fn provider_slots(
        &self,
        provider_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<AppointmentSlot>>;

    async fn delete_slots(&self, window_id: Uuid) -> StoreResult<usize>;

    /// Insert or overwrite `window` and replace its entire slot set, atomically.
    ///
    /// Stamps `created_at` (kept on overwrite) and `updated_at`.
    async fn save_window_with_slots(
        &self,
        window: AvailabilityWindow,
        slots: Vec<AppointmentSlot>,
    ) -> StoreResult<AvailabilityWindow>;

    /// Delete the given windows and all their slots, atomically.
    async fn delete_windows_cascade(&self, ids: &[Uuid]) -> StoreResult<Removal>;
}

#[derive(Debug, Default)]
struct Tables {
    windows: HashMap<Uuid, AvailabilityWindow>,
    slots: HashMap<Uuid, AppointmentSlot>,
    slots_by_window: HashMap<Uuid, Vec<Uuid>>,
    references: HashSet<String>,
}

impl Tables {
    /// Reject references already taken by slots outside `replacing`.
    fn check_references(
        &self,
        slots: &[AppointmentSlot],
        replacing: Option<Uuid>,
    ) -> StoreResult<()> {
        let released: HashSet<&str> = replacing
            .and_then(|w| self.slots_by_window.get(&w))
            .into_iter()
            .flatten()
            .filter_map(|id| self.slots.get(id))
            .map(|s| s.booking_reference.as_str())
            .collect();

        let mut batch = HashSet::new();
        for slot in slots {
            let reference = slot.booking_reference.as_str();
            let taken = self.references.contains(reference) && !released.contains(reference);
            if taken || !batch.insert(reference) {
                return Err(StoreError::DuplicateBookingReference(reference.to_string()));
            }
        }
        Ok(())
    }

    fn add_slots(&mut self, slots: Vec<AppointmentSlot>) {
        for slot in slots {
            self.references.insert(slot.booking_reference.clone());
            self.slots_by_window
                .entry(slot.window_id)
                .or_default()
                .push(slot.id);
            self.slots.insert(slot.id, slot);
        }
    }

    fn remove_slots(&mut self, window_id: Uuid) -> usize {
        let ids = self.slots_by_window.remove(&window_id).unwrap_or_default();
        for id in &ids {
            if let Some(slot) = self.slots.remove(id) {
                self.references.remove(&slot.booking_reference);
            }
        }
        ids.len()
    }

    fn stamp(&self, mut window: AvailabilityWindow) -> AvailabilityWindow {
        let now = Utc::now();
        window.created_at = self
            .windows
            .get(&window.id)
            .map(|w| w.created_at)
            .unwrap_or(now);
        window.updated_at = now;
        window
    }

    fn sorted_slots<'a>(
        &self,
        slots: impl Iterator<Item = &'a AppointmentSlot>,
    ) -> Vec<AppointmentSlot> {
        let mut out: Vec<AppointmentSlot> = slots.cloned().collect();
        out.sort_by_key(|s| (s.start, s.end));
        out
    }
}

/// In-process store backed by hash maps behind a single `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilityStore for MemoryStore {
    async fn insert_window(&self, window: AvailabilityWindow) -> StoreResult<AvailabilityWindow> {
        let mut tables = self.tables.write().await;
        if tables.windows.contains_key(&window.id) {
            return Err(StoreError::Backend(format!("window {} already exists", window.id)));
        }
        let window = tables.stamp(window);
        tables.windows.insert(window.id, window.clone());
        Ok(window)
    }

    async fn find_window(&self, id: Uuid) -> StoreResult<Option<AvailabilityWindow>> {
        Ok(self.tables.read().await.windows.get(&id).cloned())
    }

    async fn list_windows(&self, query: &WindowQuery) -> StoreResult<Vec<AvailabilityWindow>> {
        let tables = self.tables.read().await;
        let mut windows: Vec<AvailabilityWindow> = tables
            .windows
            .values()
            .filter(|w| query.matches(w))
            .cloned()
            .collect();
        windows.sort_by_key(|w| (w.definition.date, w.definition.start_time, w.id));
        Ok(windows)
    }

    async fn delete_window(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        tables.remove_slots(id);
        Ok(tables.windows.remove(&id).is_some())
    }

    async fn insert_slots(&self, slots: Vec<AppointmentSlot>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(orphan) = slots.iter().find(|s| !tables.windows.contains_key(&s.window_id)) {
            return Err(StoreError::Backend(format!(
                "slot {} references unknown window {}",
                orphan.id, orphan.window_id
            )));
        }
        tables.check_references(&slots, None)?;
        tables.add_slots(slots);
        Ok(())
    }

    async fn find_slot(&self, id: Uuid) -> StoreResult<Option<AppointmentSlot>> {
        Ok(self.tables.read().await.slots.get(&id).cloned())
    }

    async fn find_slots(&self, window_id: Uuid) -> StoreResult<Vec<AppointmentSlot>> {
        let tables = self.tables.read().await;
        let owned = tables
            .slots_by_window
            .get(&window_id)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.slots.get(id));
        Ok(tables.sorted_slots(owned))
    }

    async fn provider_slots(
        &self,
        provider_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<AppointmentSlot>> {
        let tables = self.tables.read().await;
        let matching = tables
            .slots
            .values()
            .filter(|s| s.provider_id == provider_id && s.start >= from && s.start < to);
        Ok(tables.sorted_slots(matching))
    }

    async fn delete_slots(&self, window_id: Uuid) -> StoreResult<usize> {
        Ok(self.tables.write().await.remove_slots(window_id))
    }

    async fn save_window_with_slots(
        &self,
        window: AvailabilityWindow,
        slots: Vec<AppointmentSlot>,
    ) -> StoreResult<AvailabilityWindow> {
        let mut tables = self.tables.write().await;
        if let Some(stray) = slots.iter().find(|s| s.window_id != window.id) {
            return Err(StoreError::Backend(format!(
                "slot {} belongs to window {}, not {}",
                stray.id, stray.window_id, window.id
            )));
        }
        tables.check_references(&slots, Some(window.id))?;

        let window = tables.stamp(window);
        tables.remove_slots(window.id);
        tables.add_slots(slots);
        tables.windows.insert(window.id, window.clone());
        Ok(window)
    }

    async fn delete_windows_cascade(&self, ids: &[Uuid]) -> StoreResult<Removal> {
        let mut tables = self.tables.write().await;
        let mut removal = Removal::default();
        for id in ids {
            if tables.windows.remove(id).is_some() {
                removal.windows += 1;
            }
            removal.slots += tables.remove_slots(*id);
        }
        Ok(removal)
    }
}
