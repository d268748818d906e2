use serde::{Deserialize, Serialize};

use crate::model::{Attribute, EditableRecord, Id, Identified, RecordBase, RecordKind, RecordMeta};

/// A simulation entity: its own attributes plus the modules it is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(flatten)]
    pub base: RecordBase,
    /// Entity-only attributes. These carry no namespace prefix.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Business keys of the modules attached to this entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<Id>>,
}

impl Entity {
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            base: RecordBase::new(id, name),
            attributes: Vec::new(),
            modules: None,
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Id>,
    {
        self.modules = Some(modules.into_iter().map(Into::into).collect());
        self
    }
}

impl Identified for Entity {
    fn meta(&self) -> &RecordMeta {
        &self.base.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.base.meta
    }

    fn business_key(&self) -> &str {
        &self.base.id
    }
}

impl EditableRecord for Entity {
    const KIND: RecordKind = RecordKind::Entity;
    const RELATIONSHIP_FIELD: &'static str = "modules";
    const CHILDREN_FIELD: &'static str = "attributes";

    fn base(&self) -> &RecordBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecordBase {
        &mut self.base
    }

    fn children(&self) -> &[Attribute] {
        &self.attributes
    }

    fn children_mut(&mut self) -> &mut Vec<Attribute> {
        &mut self.attributes
    }

    fn relationships(&self) -> Option<&[Id]> {
        self.modules.as_deref()
    }

    fn relationships_mut(&mut self) -> &mut Option<Vec<Id>> {
        &mut self.modules
    }
}
