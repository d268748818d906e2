use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::model::record::{optional_string, required_string};
use crate::model::{Id, Identified, RecordMeta};

/// Value type of an attribute or behavior parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Bool,
    Int,
    Float,
    String,
    Vec2,
    Vec3,
    Vec4,
    Color,
    Entity,
    List,
    Map,
    /// Anything the backend reports that this client does not know about.
    #[default]
    #[serde(other)]
    Any,
}

/// A sub-record of a record: an entity/module attribute or a behavior parameter.
///
/// Module attributes live in the module's namespace, so their business id is
/// `"<module>/<attr>"`; `display_id` caches the part after the prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(skip)]
    pub meta: RecordMeta,
    pub id: Id,
    #[serde(skip)]
    pub display_id: String,
    #[serde(rename = "type", default)]
    pub attr_type: AttributeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Attribute {
    pub fn new(id: impl Into<Id>, attr_type: AttributeType) -> Self {
        let id = id.into();
        Self {
            meta: RecordMeta::new_record(),
            display_id: id.clone(),
            id,
            attr_type,
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Recompute `display_id` from `id` for the given namespace prefix.
    pub fn refresh_display_id(&mut self, prefix: Option<&str>) {
        self.display_id = display_part(&self.id, prefix).to_string();
    }

    /// Set the id from its display form, re-applying the namespace prefix.
    pub fn set_display_id(&mut self, display_id: &str, prefix: Option<&str>) {
        self.id = full_id(prefix, display_id);
        self.display_id = display_id.to_string();
    }

    /// Move the attribute into `prefix`'s namespace if it is not already there.
    pub fn adopt_prefix(&mut self, prefix: Option<&str>) {
        if let Some(prefix) = prefix {
            if !self.id.starts_with(&format!("{}/", prefix)) {
                let display = self.id.clone();
                self.set_display_id(&display, Some(prefix));
                return;
            }
        }
        self.refresh_display_id(prefix);
    }

    /// Apply a single field edit. The attribute is untouched on error.
    pub fn apply(&mut self, field: AttributeField, value: Value, prefix: Option<&str>) -> Result<()> {
        match field {
            AttributeField::Id => {
                self.id = required_string("id", value)?;
                self.adopt_prefix(prefix);
            }
            AttributeField::DisplayId => {
                let display = required_string("displayId", value)?;
                self.set_display_id(&display, prefix);
            }
            AttributeField::Type => {
                self.attr_type = serde_json::from_value(value)
                    .map_err(|e| CoreError::invalid_value("type", e.to_string()))?;
            }
            AttributeField::Default => {
                self.default = match value {
                    Value::Null => None,
                    other => Some(other),
                };
            }
            AttributeField::Description => {
                self.description = optional_string("description", value)?;
            }
        }
        Ok(())
    }
}

impl Identified for Attribute {
    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn business_key(&self) -> &str {
        &self.id
    }
}

/// Editable fields of an [`Attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeField {
    Id,
    DisplayId,
    Type,
    Default,
    Description,
}

impl FromStr for AttributeField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "id" => Ok(Self::Id),
            "displayId" | "display_id" => Ok(Self::DisplayId),
            "type" => Ok(Self::Type),
            "default" => Ok(Self::Default),
            "description" => Ok(Self::Description),
            other => Err(CoreError::UnknownField(other.to_string())),
        }
    }
}

pub fn full_id(prefix: Option<&str>, display_id: &str) -> Id {
    match prefix {
        Some(prefix) => format!("{}/{}", prefix, display_id),
        None => display_id.to_string(),
    }
}

pub fn display_part<'a>(id: &'a str, prefix: Option<&str>) -> &'a str {
    match prefix {
        Some(prefix) => id
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(id),
        None => id,
    }
}
