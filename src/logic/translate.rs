//! Translation of relationship references between stable-id space and
//! business-key space.
//!
//! The backend only speaks business keys, while selectors in the editor work
//! with stable ids so that an unsaved rename does not break an association.
//! None of these functions assume their input is already normalized, and
//! none of them fail on references they cannot resolve.

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::{Id, Identified, StableId};

/// The identity pair of one record, as seen by the translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub stable_id: StableId,
    pub business_key: Id,
}

impl RecordRef {
    /// `None` for records that have not been given a stable id yet.
    pub fn of<T: Identified>(record: &T) -> Option<Self> {
        record.stable_id().map(|stable_id| Self {
            stable_id,
            business_key: record.business_key().to_string(),
        })
    }
}

pub fn references<T: Identified>(records: &[T]) -> Vec<RecordRef> {
    records.iter().filter_map(RecordRef::of).collect()
}

/// References split by whether they resolve to a known record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceValidation {
    pub valid: Vec<Id>,
    pub invalid: Vec<Id>,
}

impl ReferenceValidation {
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty()
    }
}

fn by_stable_id<'a>(key: &str, refs: &'a [RecordRef]) -> Option<&'a RecordRef> {
    let stable_id = StableId::parse(key)?;
    refs.iter().find(|r| r.stable_id == stable_id)
}

fn by_business_key<'a>(key: &str, refs: &'a [RecordRef]) -> Option<&'a RecordRef> {
    refs.iter().find(|r| r.business_key == key)
}

/// Resolve a reference given in either space.
pub fn resolve<'a>(key: &str, refs: &'a [RecordRef]) -> Option<&'a RecordRef> {
    by_stable_id(key, refs).or_else(|| by_business_key(key, refs))
}

/// Business keys become stable ids; anything else passes through unchanged.
pub fn to_stable_ids(keys: &[Id], refs: &[RecordRef]) -> Vec<Id> {
    keys.iter()
        .map(|key| match by_business_key(key, refs) {
            Some(found) => found.stable_id.to_string(),
            None => key.clone(),
        })
        .collect()
}

/// Stable ids become business keys, known business keys are kept, and
/// unresolvable references are dropped. The output has no duplicates.
pub fn to_business_keys(keys: &[Id], refs: &[RecordRef]) -> Vec<Id> {
    keys.iter()
        .filter_map(|key| match resolve(key, refs) {
            Some(found) => Some(found.business_key.clone()),
            None => {
                debug!("dropping unresolvable reference '{}'", key);
                None
            }
        })
        .unique()
        .collect()
}

/// Like [`to_business_keys`] but keeps unresolvable references as they are.
/// Used where an orphan reference must stay visible, e.g. dirty comparison.
pub fn normalize_to_business_keys(keys: &[Id], refs: &[RecordRef]) -> Vec<Id> {
    keys.iter()
        .map(|key| match by_stable_id(key, refs) {
            Some(found) => found.business_key.clone(),
            None => key.clone(),
        })
        .collect()
}

pub fn validate(keys: &[Id], refs: &[RecordRef]) -> ReferenceValidation {
    let (valid, invalid): (Vec<Id>, Vec<Id>) = keys
        .iter()
        .cloned()
        .partition(|key| resolve(key, refs).is_some());
    ReferenceValidation { valid, invalid }
}

/// True when every reference is already a known stable id.
pub fn is_fully_translated(keys: &[Id], refs: &[RecordRef]) -> bool {
    keys.iter().all(|key| by_stable_id(key, refs).is_some())
}
