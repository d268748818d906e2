use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;

use crate::error::{CoreError, Result};
use crate::model::{Attribute, Id, RecordKind, RecordMeta, StableId};

/// Anything that carries a stable identity next to a business key.
pub trait Identified {
    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;
    fn business_key(&self) -> &str;

    fn stable_id(&self) -> Option<StableId> {
        self.meta().stable_id
    }
}

/// Fields shared by every record kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordBase {
    #[serde(skip)]
    pub meta: RecordMeta,
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Backend fields this client does not model. Round-tripped untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecordBase {
    /// A client-created record that the backend has not seen yet.
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::new_record(),
            id: id.into(),
            name: name.into(),
            description: None,
            extra: Map::new(),
        }
    }
}

/// A record kind managed by a list store and editable through a record editor.
pub trait EditableRecord:
    Identified + Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: RecordKind;
    /// Field path of the relationship list.
    const RELATIONSHIP_FIELD: &'static str;
    /// Field path of the sub-record list.
    const CHILDREN_FIELD: &'static str;

    fn base(&self) -> &RecordBase;
    fn base_mut(&mut self) -> &mut RecordBase;
    fn children(&self) -> &[Attribute];
    fn children_mut(&mut self) -> &mut Vec<Attribute>;
    fn relationships(&self) -> Option<&[Id]>;
    fn relationships_mut(&mut self) -> &mut Option<Vec<Id>>;

    /// Namespace prefix applied to sub-record ids, if the kind has one.
    fn attribute_prefix(&self) -> Option<&str> {
        None
    }

    fn set_business_key(&mut self, key: Id) {
        self.base_mut().id = key;
    }

    /// Recompute display-only caches after the record was deserialized or edited.
    fn refresh_derived(&mut self) {
        let prefix = self.attribute_prefix().map(str::to_string);
        for child in self.children_mut() {
            child.refresh_display_id(prefix.as_deref());
        }
    }

    /// Drop stable ids and statuses, as a backend would never see them.
    fn clear_client_state(&mut self) {
        self.base_mut().meta = RecordMeta::default();
        for child in self.children_mut() {
            child.meta = RecordMeta::default();
        }
    }

    fn find_child(&self, stable_id: StableId) -> Option<&Attribute> {
        self.children()
            .iter()
            .find(|child| child.stable_id() == Some(stable_id))
    }

    fn find_child_mut(&mut self, stable_id: StableId) -> Option<&mut Attribute> {
        self.children_mut()
            .iter_mut()
            .find(|child| child.stable_id() == Some(stable_id))
    }
}

/// Apply `value` at a dotted field `path` of a record.
///
/// The first segment names a modelled field (`id`, `name`, `description`, the
/// relationship field) or any other top-level key, which lands in `extra`.
/// Deeper segments walk into JSON objects under `extra`. The record is left
/// untouched when an error is returned.
pub fn apply_property<R: EditableRecord>(record: &mut R, path: &str, value: Value) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(CoreError::UnknownField(path.to_string()));
    }
    let (head, rest) = segments
        .split_first()
        .ok_or_else(|| CoreError::UnknownField(path.to_string()))?;

    let modelled = matches!(*head, "id" | "name" | "description")
        || *head == R::RELATIONSHIP_FIELD
        || *head == R::CHILDREN_FIELD;
    if modelled && !rest.is_empty() {
        return Err(CoreError::UnknownField(path.to_string()));
    }

    match *head {
        "id" => {
            let key = required_string("id", value)?;
            record.set_business_key(key);
        }
        "name" => {
            record.base_mut().name = optional_string("name", value)?.unwrap_or_default();
        }
        "description" => {
            record.base_mut().description = optional_string("description", value)?;
        }
        field if field == R::RELATIONSHIP_FIELD => {
            *record.relationships_mut() = key_list(field, value)?;
        }
        field if field == R::CHILDREN_FIELD => {
            return Err(CoreError::invalid_value(
                field,
                "sub-records are edited through attribute operations",
            ));
        }
        _ => set_extra(&mut record.base_mut().extra, head, rest, value, path)?,
    }
    Ok(())
}

fn set_extra(
    map: &mut Map<String, Value>,
    key: &str,
    rest: &[&str],
    value: Value,
    path: &str,
) -> Result<()> {
    let Some((next, tail)) = rest.split_first() else {
        match value {
            Value::Null => {
                map.remove(key);
            }
            other => {
                map.insert(key.to_string(), other);
            }
        }
        return Ok(());
    };

    // Check before creating anything so a failed edit leaves no trace.
    if let Some(existing) = map.get(key) {
        if !existing.is_object() {
            return Err(CoreError::invalid_value(path, format!("'{}' is not an object", key)));
        }
    } else if value.is_null() {
        return Ok(());
    }

    let child = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    match child {
        Value::Object(inner) => set_extra(inner, next, tail, value, path),
        _ => Err(CoreError::invalid_value(path, format!("'{}' is not an object", key))),
    }
}

pub(crate) fn required_string(field: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(CoreError::invalid_value(
            field,
            format!("expected a string, got {}", other),
        )),
    }
}

pub(crate) fn optional_string(field: &str, value: Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        other => required_string(field, other).map(Some),
    }
}

fn key_list(field: &str, value: Value) -> Result<Option<Vec<Id>>> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => items
            .into_iter()
            .map(|item| required_string(field, item))
            .collect::<Result<Vec<_>>>()
            .map(Some),
        other => Err(CoreError::invalid_value(
            field,
            format!("expected a list of keys, got {}", other),
        )),
    }
}
