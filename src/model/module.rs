use serde::{Deserialize, Serialize};

use crate::model::{
    attribute::display_part, Attribute, EditableRecord, Id, Identified, RecordBase, RecordKind,
    RecordMeta,
};

/// A reusable component. Its attributes live under the module's namespace,
/// e.g. `physics/mass`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    #[serde(flatten)]
    pub base: RecordBase,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Business keys of other modules this one depends on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Vec<Id>>,
}

impl Module {
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            base: RecordBase::new(id, name),
            attributes: Vec::new(),
            requires: None,
        }
    }

    /// Add an attribute, moving it into this module's namespace.
    pub fn with_attribute(mut self, mut attribute: Attribute) -> Self {
        attribute.adopt_prefix(Some(self.base.id.as_str()));
        self.attributes.push(attribute);
        self
    }

    pub fn with_requires<I, S>(mut self, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Id>,
    {
        self.requires = Some(requires.into_iter().map(Into::into).collect());
        self
    }
}

impl Identified for Module {
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

impl EditableRecord for Module {
    const KIND: RecordKind = RecordKind::Module;
    const RELATIONSHIP_FIELD: &'static str = "requires";
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
        self.requires.as_deref()
    }

    fn relationships_mut(&mut self) -> &mut Option<Vec<Id>> {
        &mut self.requires
    }

    fn attribute_prefix(&self) -> Option<&str> {
        Some(self.base.id.as_str())
    }

    /// Renaming a module renames the namespace of its attributes with it.
    fn set_business_key(&mut self, key: Id) {
        let old = std::mem::replace(&mut self.base.id, key);
        for attribute in &mut self.attributes {
            let display = display_part(&attribute.id, Some(old.as_str())).to_string();
            attribute.set_display_id(&display, Some(self.base.id.as_str()));
        }
    }
}
