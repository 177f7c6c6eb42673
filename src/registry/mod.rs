use serde::de::DeserializeOwned;
use thiserror::Error;
use time::Date;

use crate::due::add_months;
use crate::model::{
    coerce_cost, coerce_interval, new_filter_id, Filter, FilterDraft, HistoryEntry,
};
use crate::search::{FilterSearch, HistoryRange};
use crate::storage::{keys, StorageHandle};

pub mod seed;

pub const DEFAULT_FILTER_NAME: &str = "Unnamed filter";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("filter {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// In-memory filters and replacement history, written back to the store
/// after every mutation.
pub struct Registry {
    storage: StorageHandle,
    filters: Vec<Filter>,
    history: Vec<HistoryEntry>,
}

impl Registry {
    /// Reads both collections. A missing filters key falls back to the demo
    /// set (when `seed_demo_data`); unreadable data is logged and replaced
    /// in memory only, so the stored bytes survive until the next save.
    pub fn load(storage: StorageHandle, seed_demo_data: bool) -> anyhow::Result<Self> {
        let seed = || {
            if seed_demo_data {
                seed::demo_filters()
            } else {
                Vec::new()
            }
        };

        let (mut filters, seeded) = match read_collection::<Filter>(&storage, keys::FILTERS)? {
            Stored::Absent => (seed(), seed_demo_data),
            Stored::Corrupt => (seed(), false),
            Stored::Present(filters) => (filters, false),
        };
        let mut history = match read_collection::<HistoryEntry>(&storage, keys::HISTORY)? {
            Stored::Present(history) => history,
            Stored::Absent | Stored::Corrupt => Vec::new(),
        };

        for filter in &mut filters {
            normalize(filter);
        }
        sort_newest_first(&mut history);

        let registry = Self {
            storage,
            filters,
            history,
        };
        if seeded {
            registry.save_filters()?;
            tracing::info!(count = registry.filters.len(), "seeded demo filters");
        }
        tracing::debug!(
            filters = registry.filters.len(),
            history = registry.history.len(),
            "registry loaded"
        );
        Ok(registry)
    }

    pub fn storage(&self) -> &StorageHandle {
        &self.storage
    }

    /// Every stored filter, removed ones included.
    pub fn all(&self) -> &[Filter] {
        &self.filters
    }

    pub fn active(&self) -> impl Iterator<Item = &Filter> + Clone {
        self.filters.iter().filter(|filter| filter.is_active)
    }

    pub fn search(&self, term: &str) -> FilterSearch<'_> {
        FilterSearch::new(&self.filters, term)
    }

    pub fn get(&self, id: &str) -> Option<&Filter> {
        self.filters
            .iter()
            .find(|filter| filter.id == id && filter.is_active)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn history_in_range(
        &self,
        range: HistoryRange,
        today: Date,
    ) -> impl Iterator<Item = &HistoryEntry> + Clone {
        self.history
            .iter()
            .filter(move |entry| range.contains(entry.date, today))
    }

    /// Current name of the filter a history entry points at, falling back to
    /// the snapshot taken when the entry was written.
    pub fn lookup_name<'a>(&'a self, entry: &'a HistoryEntry) -> &'a str {
        self.filters
            .iter()
            .find(|filter| filter.id == entry.filter_id)
            .map(|filter| filter.name.as_str())
            .unwrap_or(entry.filter_name.as_str())
    }

    pub fn create(&mut self, draft: FilterDraft, today: Date) -> RegistryResult<Filter> {
        let install_date = draft.install_date.unwrap_or(today);
        let replacement_interval = coerce_interval(draft.replacement_interval);
        let mut filter = Filter {
            id: new_filter_id(),
            name: clean_name(draft.name),
            location: draft.location.unwrap_or_default().trim().to_string(),
            stage: draft.stage.unwrap_or_default().trim().to_string(),
            filter_type: draft.filter_type.unwrap_or_default().trim().to_string(),
            brand: draft.brand.unwrap_or_default().trim().to_string(),
            model: draft.model.unwrap_or_default().trim().to_string(),
            install_date,
            replacement_interval,
            next_due_date: add_months(install_date, replacement_interval),
            cost: coerce_cost(draft.cost),
            notes: draft.notes.unwrap_or_default().trim().to_string(),
            is_active: true,
            notification_settings: draft.notification_settings.unwrap_or_default(),
        };
        normalize(&mut filter);
        let mut next = self.filters.clone();
        next.push(filter.clone());
        self.commit(Some(next), None)?;
        tracing::info!(id = %filter.id, name = %filter.name, "filter created");
        Ok(filter)
    }

    pub fn update(&mut self, id: &str, draft: FilterDraft) -> RegistryResult<Filter> {
        let index = self.active_index(id)?;
        let mut filter = self.filters[index].clone();
        if let Some(name) = draft.name {
            filter.name = clean_name(Some(name));
        }
        if let Some(location) = draft.location {
            filter.location = location.trim().to_string();
        }
        if let Some(stage) = draft.stage {
            filter.stage = stage.trim().to_string();
        }
        if let Some(kind) = draft.filter_type {
            filter.filter_type = kind.trim().to_string();
        }
        if let Some(brand) = draft.brand {
            filter.brand = brand.trim().to_string();
        }
        if let Some(model) = draft.model {
            filter.model = model.trim().to_string();
        }
        if let Some(notes) = draft.notes {
            filter.notes = notes.trim().to_string();
        }
        if let Some(install_date) = draft.install_date {
            filter.install_date = install_date;
        }
        if draft.replacement_interval.is_some() {
            filter.replacement_interval = coerce_interval(draft.replacement_interval);
        }
        if draft.cost.is_some() {
            filter.cost = coerce_cost(draft.cost);
        }
        if let Some(settings) = draft.notification_settings {
            filter.notification_settings = settings;
        }
        normalize(&mut filter);
        let mut next = self.filters.clone();
        next[index] = filter.clone();
        self.commit(Some(next), None)?;
        tracing::info!(id = %filter.id, "filter updated");
        Ok(filter)
    }

    /// Records a replacement on `today` and returns the new due date.
    pub fn mark_replaced(&mut self, id: &str, today: Date) -> RegistryResult<Date> {
        let index = self.active_index(id)?;
        let mut filter = self.filters[index].clone();
        filter.install_date = today;
        normalize(&mut filter);
        let next_due = filter.next_due_date;
        let mut history = self.history.clone();
        history.insert(0, HistoryEntry::replacement(&filter, today));
        let mut filters = self.filters.clone();
        filters[index] = filter;
        self.commit(Some(filters), Some(history))?;
        tracing::info!(id, next_due = %next_due, "filter replaced");
        Ok(next_due)
    }

    /// Soft delete: the record stays so history keeps resolving its name.
    pub fn remove(&mut self, id: &str) -> RegistryResult<Filter> {
        let index = self.active_index(id)?;
        let mut next = self.filters.clone();
        next[index].is_active = false;
        let removed = next[index].clone();
        self.commit(Some(next), None)?;
        tracing::info!(id, "filter removed");
        Ok(removed)
    }

    pub fn clear_history(&mut self) -> RegistryResult<usize> {
        let cleared = self.history.len();
        self.commit(None, Some(Vec::new()))?;
        tracing::info!(cleared, "history cleared");
        Ok(cleared)
    }

    /// Swaps in imported collections. `None` leaves that collection as is.
    /// `extra` key-value pairs are written in the same transaction.
    pub fn replace_all(
        &mut self,
        filters: Option<Vec<Filter>>,
        history: Option<Vec<HistoryEntry>>,
        extra: &[(&str, String)],
    ) -> RegistryResult<()> {
        let mut next_filters = filters.unwrap_or_else(|| self.filters.clone());
        let mut next_history = history.unwrap_or_else(|| self.history.clone());
        for filter in &mut next_filters {
            normalize(filter);
        }
        sort_newest_first(&mut next_history);
        let mut entries = vec![
            (keys::FILTERS, encode(&next_filters)?),
            (keys::HISTORY, encode(&next_history)?),
        ];
        entries.extend(extra.iter().cloned());
        self.storage.put_many(&entries)?;
        self.filters = next_filters;
        self.history = next_history;
        Ok(())
    }

    /// Re-reads the store; used after another process wrote to it.
    pub fn reload(&mut self, seed_demo_data: bool) -> anyhow::Result<()> {
        let fresh = Self::load(self.storage.clone(), seed_demo_data)?;
        self.filters = fresh.filters;
        self.history = fresh.history;
        Ok(())
    }

    fn active_index(&self, id: &str) -> RegistryResult<usize> {
        self.filters
            .iter()
            .position(|filter| filter.id == id && filter.is_active)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    fn save_filters(&self) -> anyhow::Result<()> {
        self.storage.put_json(keys::FILTERS, &self.filters)
    }

    /// Writes the new collections and only then swaps them in, so a failed
    /// write leaves memory matching the store.
    fn commit(
        &mut self,
        filters: Option<Vec<Filter>>,
        history: Option<Vec<HistoryEntry>>,
    ) -> anyhow::Result<()> {
        match (&filters, &history) {
            (Some(filters), Some(history)) => self.storage.put_many(&[
                (keys::FILTERS, encode(filters)?),
                (keys::HISTORY, encode(history)?),
            ])?,
            (Some(filters), None) => self.storage.put_json(keys::FILTERS, filters)?,
            (None, Some(history)) => self.storage.put_json(keys::HISTORY, history)?,
            (None, None) => {}
        }
        if let Some(filters) = filters {
            self.filters = filters;
        }
        if let Some(history) = history {
            self.history = history;
        }
        Ok(())
    }
}

enum Stored<T> {
    Absent,
    Corrupt,
    Present(Vec<T>),
}

fn read_collection<T: DeserializeOwned>(
    storage: &StorageHandle,
    key: &str,
) -> anyhow::Result<Stored<T>> {
    let Some(raw) = storage.get_raw(key)? else {
        return Ok(Stored::Absent);
    };
    match serde_json::from_str::<Vec<T>>(&raw) {
        Ok(items) => Ok(Stored::Present(items)),
        Err(err) => {
            tracing::warn!(key, error = %err, "stored data is unreadable, using defaults");
            Ok(Stored::Corrupt)
        }
    }
}

fn encode<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    use anyhow::Context;
    serde_json::to_string(value).context("encoding registry data")
}

fn clean_name(raw: Option<String>) -> String {
    match raw.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_FILTER_NAME.to_string(),
    }
}

/// Restores the due-date invariant and coerces out-of-range numbers.
fn normalize(filter: &mut Filter) {
    if filter.replacement_interval == 0 {
        filter.replacement_interval = coerce_interval(None);
    }
    filter.cost = coerce_cost(Some(filter.cost));
    filter.next_due_date = add_months(filter.install_date, filter.replacement_interval);
}

fn sort_newest_first(history: &mut [HistoryEntry]) {
    history.sort_by(|a, b| b.date.cmp(&a.date));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{filter, init_storage};
    use assert_matches::assert_matches;
    use time::macros::date;

    fn draft(name: &str, install: Date, months: i64) -> FilterDraft {
        FilterDraft {
            name: Some(name.to_string()),
            location: Some("Kitchen".to_string()),
            filter_type: Some("Carbon".to_string()),
            install_date: Some(install),
            replacement_interval: Some(months),
            cost: Some(50.0),
            ..FilterDraft::default()
        }
    }

    fn empty_registry() -> anyhow::Result<(tempfile::TempDir, Registry)> {
        let (temp, storage) = init_storage()?;
        let registry = Registry::load(storage, false)?;
        Ok((temp, registry))
    }

    #[test]
    fn first_load_seeds_and_persists_demo_filters() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let registry = Registry::load(storage.clone(), true)?;
        assert_eq!(registry.active().count(), 7);
        assert!(registry.history().is_empty());
        assert!(storage.get_raw(keys::FILTERS)?.is_some());
        Ok(())
    }

    #[test]
    fn stored_empty_list_stays_empty() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.put_raw(keys::FILTERS, "[]")?;
        let registry = Registry::load(storage, true)?;
        assert_eq!(registry.all().len(), 0);
        Ok(())
    }

    #[test]
    fn corrupt_filters_fall_back_to_seed_without_overwriting() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.put_raw(keys::FILTERS, "{not json")?;
        storage.put_raw(keys::HISTORY, "also broken")?;
        let registry = Registry::load(storage.clone(), true)?;
        assert_eq!(registry.all().len(), 7);
        assert!(registry.history().is_empty());
        assert_eq!(storage.get_raw(keys::FILTERS)?.as_deref(), Some("{not json"));
        Ok(())
    }

    #[test]
    fn create_computes_due_date_and_persists() -> anyhow::Result<()> {
        let (_temp, mut registry) = empty_registry()?;
        let created = registry.create(draft("Kitchen Carbon", date!(2024 - 01 - 01), 6), date!(2024 - 02 - 01))?;
        assert_eq!(created.next_due_date, date!(2024 - 07 - 01));
        assert!(created.is_active);

        let reloaded = Registry::load(registry.storage().clone(), false)?;
        assert_eq!(reloaded.get(&created.id), Some(&created));
        Ok(())
    }

    #[test]
    fn create_coerces_blank_and_invalid_fields() -> anyhow::Result<()> {
        let (_temp, mut registry) = empty_registry()?;
        let today = date!(2024 - 03 - 10);
        let created = registry.create(
            FilterDraft {
                name: Some("   ".to_string()),
                replacement_interval: Some(-3),
                cost: Some(f64::NAN),
                ..FilterDraft::default()
            },
            today,
        )?;
        assert_eq!(created.name, DEFAULT_FILTER_NAME);
        assert_eq!(created.replacement_interval, 6);
        assert_eq!(created.cost, 0.0);
        assert_eq!(created.install_date, today);
        assert_eq!(created.next_due_date, date!(2024 - 09 - 10));
        Ok(())
    }

    #[test]
    fn update_recomputes_due_date() -> anyhow::Result<()> {
        let (_temp, mut registry) = empty_registry()?;
        let created = registry.create(draft("A", date!(2024 - 01 - 01), 6), date!(2024 - 01 - 01))?;
        let updated = registry.update(
            &created.id,
            FilterDraft {
                replacement_interval: Some(12),
                ..FilterDraft::default()
            },
        )?;
        assert_eq!(updated.next_due_date, date!(2025 - 01 - 01));
        assert_eq!(updated.name, "A");
        Ok(())
    }

    #[test]
    fn mark_replaced_resets_install_and_prepends_history() -> anyhow::Result<()> {
        let (_temp, mut registry) = empty_registry()?;
        let created = registry.create(draft("Kitchen Carbon", date!(2024 - 01 - 01), 6), date!(2024 - 01 - 01))?;
        registry.mark_replaced(&created.id, date!(2024 - 05 - 01))?;
        let next_due = registry.mark_replaced(&created.id, date!(2024 - 07 - 10))?;

        assert_eq!(next_due, date!(2025 - 01 - 10));
        let history = registry.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, date!(2024 - 07 - 10));
        assert_eq!(history[0].cost, 50.0);
        assert_eq!(history[0].notes, "Filter replaced - Kitchen Carbon");

        let reloaded = Registry::load(registry.storage().clone(), false)?;
        assert_eq!(reloaded.history().len(), 2);
        assert_eq!(
            reloaded.get(&created.id).map(|f| f.install_date),
            Some(date!(2024 - 07 - 10))
        );
        Ok(())
    }

    #[test]
    fn mark_replaced_leaves_other_filters_untouched() -> anyhow::Result<()> {
        let (_temp, mut registry) = empty_registry()?;
        let kitchen = registry.create(draft("Kitchen Carbon", date!(2024 - 01 - 01), 6), date!(2024 - 01 - 01))?;
        let shower = registry.create(draft("Shower", date!(2024 - 02 - 01), 3), date!(2024 - 02 - 01))?;
        registry.mark_replaced(&shower.id, date!(2024 - 03 - 01))?;
        let shower_history: Vec<HistoryEntry> = registry.history().to_vec();

        registry.mark_replaced(&kitchen.id, date!(2024 - 06 - 01))?;

        assert_eq!(
            registry.get(&shower.id).map(|f| (f.install_date, f.next_due_date)),
            Some((date!(2024 - 03 - 01), date!(2024 - 06 - 01)))
        );
        let shower_after: Vec<&HistoryEntry> = registry
            .history()
            .iter()
            .filter(|entry| entry.filter_id == shower.id)
            .collect();
        assert_eq!(shower_after, shower_history.iter().collect::<Vec<_>>());
        assert_eq!(registry.history()[0].filter_id, kitchen.id);
        Ok(())
    }

    #[test]
    fn failed_writes_leave_memory_unchanged() -> anyhow::Result<()> {
        let (_temp, mut registry) = empty_registry()?;
        let created = registry.create(draft("Kitchen Carbon", date!(2024 - 01 - 01), 6), date!(2024 - 01 - 01))?;
        let filters_before = registry.all().to_vec();

        registry.storage().with_connection(|conn| {
            conn.execute_batch("DROP TABLE kv")?;
            Ok(())
        })?;

        assert_matches!(
            registry.create(draft("Shower", date!(2024 - 02 - 01), 3), date!(2024 - 02 - 01)),
            Err(RegistryError::Storage(_))
        );
        assert_matches!(
            registry.mark_replaced(&created.id, date!(2024 - 05 - 01)),
            Err(RegistryError::Storage(_))
        );
        assert_matches!(registry.remove(&created.id), Err(RegistryError::Storage(_)));
        assert_eq!(registry.all(), filters_before.as_slice());
        assert!(registry.history().is_empty());
        Ok(())
    }

    #[test]
    fn removed_filters_are_hidden_and_immutable() -> anyhow::Result<()> {
        let (_temp, mut registry) = empty_registry()?;
        let created = registry.create(draft("Gone", date!(2024 - 01 - 01), 6), date!(2024 - 01 - 01))?;
        registry.mark_replaced(&created.id, date!(2024 - 02 - 01))?;
        registry.remove(&created.id)?;

        assert!(registry.get(&created.id).is_none());
        assert_eq!(registry.search("").count(), 0);
        assert_eq!(registry.all().len(), 1);
        assert_matches!(
            registry.mark_replaced(&created.id, date!(2024 - 03 - 01)),
            Err(RegistryError::NotFound(id)) if id == created.id
        );
        assert_matches!(registry.remove(&created.id), Err(RegistryError::NotFound(_)));
        assert_eq!(registry.lookup_name(&registry.history()[0]), "Gone");
        Ok(())
    }

    #[test]
    fn unknown_ids_report_not_found() -> anyhow::Result<()> {
        let (_temp, mut registry) = empty_registry()?;
        assert_matches!(
            registry.update("missing", FilterDraft::default()),
            Err(RegistryError::NotFound(_))
        );
        Ok(())
    }

    #[test]
    fn load_sorts_history_and_repairs_due_dates() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let mut stale = filter("f1", "Stale", date!(2024 - 01 - 31), 1);
        stale.next_due_date = date!(2030 - 01 - 01);
        storage.put_json(keys::FILTERS, &vec![stale.clone()])?;
        let older = HistoryEntry::replacement(&stale, date!(2024 - 01 - 01));
        let newer = HistoryEntry::replacement(&stale, date!(2024 - 03 - 01));
        storage.put_json(keys::HISTORY, &vec![older, newer])?;

        let registry = Registry::load(storage, false)?;
        assert_eq!(registry.all()[0].next_due_date, date!(2024 - 02 - 29));
        assert_eq!(registry.history()[0].date, date!(2024 - 03 - 01));
        Ok(())
    }

    #[test]
    fn history_range_and_clear() -> anyhow::Result<()> {
        let (_temp, mut registry) = empty_registry()?;
        let created = registry.create(draft("A", date!(2024 - 01 - 01), 6), date!(2024 - 01 - 01))?;
        registry.mark_replaced(&created.id, date!(2024 - 01 - 10))?;
        registry.mark_replaced(&created.id, date!(2024 - 06 - 10))?;

        let today = date!(2024 - 06 - 30);
        assert_eq!(registry.history_in_range(HistoryRange::Last30Days, today).count(), 1);
        assert_eq!(registry.history_in_range(HistoryRange::All, today).count(), 2);

        assert_eq!(registry.clear_history()?, 2);
        let reloaded = Registry::load(registry.storage().clone(), false)?;
        assert!(reloaded.history().is_empty());
        Ok(())
    }

    #[test]
    fn replace_all_keeps_missing_parts() -> anyhow::Result<()> {
        let (_temp, mut registry) = empty_registry()?;
        let created = registry.create(draft("Keep", date!(2024 - 01 - 01), 6), date!(2024 - 01 - 01))?;
        registry.mark_replaced(&created.id, date!(2024 - 02 - 01))?;

        registry.replace_all(Some(Vec::new()), None, &[])?;
        assert!(registry.all().is_empty());
        assert_eq!(registry.history().len(), 1);

        let reloaded = Registry::load(registry.storage().clone(), true)?;
        assert!(reloaded.all().is_empty());
        Ok(())
    }
}
