//! Structural dirty comparison.
//!
//! Both sides are projected onto a canonical form and compared. The
//! projection is the explicit list of fields that count: stable ids,
//! statuses, edit statuses and `display_id` are simply not part of it.
//! Relationship lists become sorted sets (absent equals empty), sub-records
//! are sorted by business key, and absent optional values equal empty ones.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::logic::translate::{normalize_to_business_keys, RecordRef};
use crate::model::{Attribute, AttributeType, EditableRecord, Id, StableId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalAttribute {
    pub id: Id,
    pub attr_type: AttributeType,
    pub default: Option<Value>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub relationships: Vec<Id>,
    pub children: Vec<CanonicalAttribute>,
    pub extra: Map<String, Value>,
}

fn non_empty(text: &Option<String>) -> Option<String> {
    text.as_ref().filter(|s| !s.is_empty()).cloned()
}

pub fn canonical_attribute(attribute: &Attribute) -> CanonicalAttribute {
    CanonicalAttribute {
        id: attribute.id.clone(),
        attr_type: attribute.attr_type,
        default: attribute.default.clone().filter(|value| !value.is_null()),
        description: non_empty(&attribute.description),
    }
}

/// Project `record` onto the fields that take part in dirty comparison.
///
/// With `refs`, relationship references held as stable ids are mapped to
/// business keys first, so a selector working in stable-id space does not make
/// an unchanged relationship look edited.
pub fn canonical<R: EditableRecord>(record: &R, refs: Option<&[RecordRef]>) -> CanonicalRecord {
    let base = record.base();

    let mut relationships = match (record.relationships(), refs) {
        (Some(keys), Some(refs)) => normalize_to_business_keys(keys, refs),
        (Some(keys), None) => keys.to_vec(),
        (None, _) => Vec::new(),
    };
    relationships.sort();
    relationships.dedup();

    let mut children: Vec<CanonicalAttribute> = record.children().iter().map(canonical_attribute).collect();
    children.sort_by(|a, b| a.id.cmp(&b.id));

    let extra = base
        .extra
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    CanonicalRecord {
        id: base.id.clone(),
        name: base.name.clone(),
        description: non_empty(&base.description),
        relationships,
        children,
        extra,
    }
}

pub fn is_dirty<R: EditableRecord>(original: &R, editing: &R, refs: Option<&[RecordRef]>) -> bool {
    canonical(original, refs) != canonical(editing, refs)
}

/// Sub-records that differ between a snapshot and a working copy, by stable id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttributeChanges {
    pub added: Vec<StableId>,
    pub removed: Vec<StableId>,
    pub modified: Vec<StableId>,
}

impl AttributeChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

pub fn attribute_changes<R: EditableRecord>(original: &R, editing: &R) -> AttributeChanges {
    let mut changes = AttributeChanges::default();

    for child in editing.children() {
        let Some(id) = child.meta.stable_id else {
            continue;
        };
        match original.find_child(id) {
            None => changes.added.push(id),
            Some(before) if canonical_attribute(before) != canonical_attribute(child) => {
                changes.modified.push(id)
            }
            Some(_) => {}
        }
    }

    for child in original.children() {
        if let Some(id) = child.meta.stable_id {
            if editing.find_child(id).is_none() {
                changes.removed.push(id);
            }
        }
    }

    changes
}
