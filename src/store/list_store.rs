use log::{debug, info, warn};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::logic::identity::{assign_all, carry_identity};
use crate::logic::translate::{self, RecordRef};
use crate::logic::{is_dirty, validate_record};
use crate::model::{apply_property, EditStatus, EditableRecord, Id, RecordStatus, StableId};
use crate::store::traits::{RecordBackend, ReferenceSource};

/// Canonical, backend-synchronized collection of one record kind.
///
/// Besides the records themselves it keeps, per stable id, a snapshot of the
/// form the backend last acknowledged. A record without a snapshot is new.
/// Snapshots decide between create and update and carry the business key that
/// update and delete calls are addressed by.
pub struct RecordListStore<R: EditableRecord> {
    backend: Arc<dyn RecordBackend<R>>,
    state: RwLock<ListState<R>>,
}

struct ListState<R> {
    records: Vec<R>,
    snapshots: HashMap<StableId, R>,
    loading: bool,
    error: Option<String>,
}

/// Business key the backend knows `record` by.
fn acknowledged_key<'a, R: EditableRecord>(snapshots: &'a HashMap<StableId, R>, record: &'a R) -> &'a str {
    record
        .stable_id()
        .and_then(|id| snapshots.get(&id))
        .map(|snapshot| snapshot.business_key())
        .unwrap_or_else(|| record.business_key())
}

/// Turn a record returned by the backend into a saved client record.
fn mark_saved<R: EditableRecord>(record: &mut R) {
    record.meta_mut().status = RecordStatus::Saved;
    record.meta_mut().edit_status = None;
    for child in record.children_mut() {
        child.meta.status = RecordStatus::Saved;
    }
    record.refresh_derived();
}

impl<R: EditableRecord> RecordListStore<R> {
    pub fn new(backend: Arc<dyn RecordBackend<R>>) -> Self {
        Self {
            backend,
            state: RwLock::new(ListState {
                records: Vec::new(),
                snapshots: HashMap::new(),
                loading: false,
                error: None,
            }),
        }
    }

    /// Fetch the whole collection and replace the local one.
    ///
    /// Records already known under the same acknowledged key keep their
    /// stable ids. On failure the current collection is left untouched.
    pub async fn load(&self) -> Result<()> {
        self.state.write().loading = true;
        let fetched = self.backend.get_all().await;

        let mut guard = self.state.write();
        let state = &mut *guard;
        state.loading = false;

        let mut records = match fetched {
            Ok(records) => records,
            Err(source) => {
                let err = CoreError::persistence("load", R::KIND.collection(), source);
                warn!("Loading {} failed: {}", R::KIND.collection(), err);
                state.error = Some(err.to_string());
                return Err(err);
            }
        };

        for record in &mut records {
            record.clear_client_state();
            let known = state
                .records
                .iter()
                .find(|existing| acknowledged_key(&state.snapshots, existing) == record.business_key());
            match known {
                Some(existing) => carry_identity(existing, record),
                None => assign_all(record),
            };
            mark_saved(record);
        }

        state.snapshots = records
            .iter()
            .filter_map(|record| record.stable_id().map(|id| (id, record.clone())))
            .collect();
        state.records = records;
        state.error = None;
        info!("Loaded {} {}", state.records.len(), R::KIND.collection());
        Ok(())
    }

    /// Validate and persist `record`, then make the backend's answer the saved state.
    ///
    /// Records without a snapshot are created; all others are updated under the
    /// business key of their snapshot, so an unsaved rename still reaches the
    /// right backend record. On failure only the transient edit status is
    /// cleared and the error is returned. A record that is not in the
    /// collection yet enters it only once the backend has accepted it.
    pub async fn save(&self, mut record: R) -> Result<R> {
        let (stable_id, previous_key, listed) = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let stable_id = assign_all(&mut record);

            if let Err(errors) = validate_record(&record, &state.records) {
                warn!("Not saving {} '{}': {}", R::KIND, record.business_key(), errors);
                return Err(errors.into());
            }

            let previous_key = state
                .snapshots
                .get(&stable_id)
                .map(|snapshot| snapshot.business_key().to_string());

            let entry = state.records.iter_mut().find(|r| r.stable_id() == Some(stable_id));
            let listed = entry.is_some();
            if let Some(entry) = entry {
                entry.meta_mut().edit_status = Some(EditStatus::Saving);
            }
            (stable_id, previous_key, listed)
        };

        let result = match &previous_key {
            Some(key) => {
                debug!("Updating {} '{}' as '{}'", R::KIND, key, record.business_key());
                self.backend.update(key, record.clone()).await
            }
            None => {
                debug!("Creating {} '{}'", R::KIND, record.business_key());
                self.backend.create(record.clone()).await
            }
        };

        let mut guard = self.state.write();
        let state = &mut *guard;
        let position = state
            .records
            .iter()
            .position(|r| r.stable_id() == Some(stable_id));

        let mut saved = match result {
            Ok(saved) => saved,
            Err(source) => {
                if let Some(position) = position {
                    state.records[position].meta_mut().edit_status = None;
                }
                let (operation, key) = match previous_key {
                    Some(key) => ("update", key),
                    None => ("create", record.business_key().to_string()),
                };
                let err = CoreError::persistence(operation, key, source);
                warn!("Saving {} failed: {}", R::KIND, err);
                return Err(err);
            }
        };

        saved.clear_client_state();
        carry_identity(&record, &mut saved);
        mark_saved(&mut saved);

        match position {
            Some(position) => {
                state.records[position] = saved.clone();
                state.snapshots.insert(stable_id, saved.clone());
                info!("Saved {} '{}'", R::KIND, saved.business_key());
            }
            None if !listed => {
                state.records.push(saved.clone());
                state.snapshots.insert(stable_id, saved.clone());
                info!("Created {} '{}'", R::KIND, saved.business_key());
            }
            None => warn!(
                "{} '{}' was removed while saving, ignoring the response",
                R::KIND,
                saved.business_key()
            ),
        }
        Ok(saved)
    }

    /// Remove a record. New records never reach the backend; others are
    /// deleted there first, under their acknowledged key.
    pub async fn delete(&self, stable_id: StableId) -> Result<()> {
        let acknowledged = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let position = state
                .records
                .iter()
                .position(|r| r.stable_id() == Some(stable_id))
                .ok_or(CoreError::RecordNotFound(stable_id))?;

            let acknowledged = state
                .snapshots
                .get(&stable_id)
                .map(|snapshot| snapshot.business_key().to_string());
            match acknowledged {
                Some(key) => key,
                None => {
                    let removed = state.records.remove(position);
                    info!("Discarded new {} '{}'", R::KIND, removed.business_key());
                    return Ok(());
                }
            }
        };

        self.backend
            .delete(&acknowledged)
            .await
            .map_err(|source| CoreError::persistence("delete", acknowledged.clone(), source))?;

        let mut state = self.state.write();
        state.records.retain(|r| r.stable_id() != Some(stable_id));
        state.snapshots.remove(&stable_id);
        info!("Deleted {} '{}'", R::KIND, acknowledged);
        Ok(())
    }

    /// Set a top-level field of a record in the collection.
    ///
    /// New records stay new; other records become dirty or saved depending on
    /// whether they now differ from their snapshot.
    pub fn update_field(&self, stable_id: StableId, path: &str, value: Value) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let entry = state
            .records
            .iter_mut()
            .find(|r| r.stable_id() == Some(stable_id))
            .ok_or(CoreError::RecordNotFound(stable_id))?;

        apply_property(entry, path, value)?;
        entry.refresh_derived();
        if !entry.meta().is_new() {
            let dirty = state
                .snapshots
                .get(&stable_id)
                .map_or(true, |snapshot| is_dirty(snapshot, &*entry, None));
            entry.meta_mut().status = if dirty {
                RecordStatus::Dirty
            } else {
                RecordStatus::Saved
            };
        }
        debug!("Set '{}' on {} {}", path, R::KIND, stable_id);
        Ok(())
    }

    /// Throw away local changes to a record. A new record is removed entirely.
    pub fn reset_changes(&self, stable_id: StableId) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let position = state
            .records
            .iter()
            .position(|r| r.stable_id() == Some(stable_id))
            .ok_or(CoreError::RecordNotFound(stable_id))?;

        match state.snapshots.get(&stable_id) {
            Some(snapshot) => state.records[position] = snapshot.clone(),
            None => {
                state.records.remove(position);
            }
        }
        Ok(())
    }

    /// Add a client-created record. It stays `new` until it is saved.
    pub fn add_new(&self, mut record: R) -> StableId {
        let stable_id = assign_all(&mut record);
        record.meta_mut().status = RecordStatus::New;
        record.meta_mut().edit_status = None;
        for child in record.children_mut() {
            child.meta.status = RecordStatus::New;
        }
        record.refresh_derived();
        debug!("Added new {} '{}'", R::KIND, record.business_key());
        self.state.write().records.push(record);
        stable_id
    }

    /// Re-fetch one record by its acknowledged business key.
    ///
    /// The fetched form becomes the record's snapshot. The collection entry is
    /// replaced too unless it holds unsaved changes, in which case only its
    /// status is recomputed against the new snapshot.
    pub async fn refresh_one(&self, key: &str) -> Result<R> {
        let mut fresh = self
            .backend
            .get(key)
            .await
            .map_err(|source| CoreError::persistence("refresh", key, source))?;
        fresh.clear_client_state();

        let mut guard = self.state.write();
        let state = &mut *guard;
        let position = state
            .records
            .iter()
            .position(|r| acknowledged_key(&state.snapshots, r) == key);

        match position {
            Some(position) => {
                carry_identity(&state.records[position], &mut fresh);
                mark_saved(&mut fresh);
                let entry = &mut state.records[position];
                if entry.meta().status == RecordStatus::Dirty && is_dirty(&fresh, &*entry, None) {
                    debug!("Keeping unsaved changes to {} '{}'", R::KIND, key);
                } else {
                    *entry = fresh.clone();
                }
            }
            None => {
                assign_all(&mut fresh);
                mark_saved(&mut fresh);
                state.records.push(fresh.clone());
            }
        }

        if let Some(stable_id) = fresh.stable_id() {
            state.snapshots.insert(stable_id, fresh.clone());
        }
        Ok(fresh)
    }

    pub fn records(&self) -> Vec<R> {
        self.state.read().records.clone()
    }

    pub fn get(&self, stable_id: StableId) -> Option<R> {
        self.state
            .read()
            .records
            .iter()
            .find(|r| r.stable_id() == Some(stable_id))
            .cloned()
    }

    pub fn find_by_business_key(&self, key: &str) -> Option<R> {
        self.state
            .read()
            .records
            .iter()
            .find(|r| r.business_key() == key)
            .cloned()
    }

    /// Last acknowledged form of a record, if the backend has seen it.
    pub fn snapshot(&self, stable_id: StableId) -> Option<R> {
        self.state.read().snapshots.get(&stable_id).cloned()
    }

    pub fn acknowledged_key(&self, stable_id: StableId) -> Option<Id> {
        self.snapshot(stable_id)
            .map(|snapshot| snapshot.business_key().to_string())
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.state
            .read()
            .records
            .iter()
            .any(|r| r.meta().status != RecordStatus::Saved)
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.records.clear();
        state.snapshots.clear();
        state.loading = false;
        state.error = None;
    }
}

impl<R: EditableRecord> ReferenceSource for RecordListStore<R> {
    fn references(&self) -> Vec<RecordRef> {
        translate::references(&self.state.read().records)
    }

    fn acknowledged_keys(&self) -> Option<Vec<Id>> {
        let state = self.state.read();
        Some(
            state
                .snapshots
                .values()
                .map(|snapshot| snapshot.business_key().to_string())
                .collect(),
        )
    }
}
