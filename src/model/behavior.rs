use serde::{Deserialize, Serialize};

use crate::model::{Attribute, EditableRecord, Id, Identified, RecordBase, RecordKind, RecordMeta};

/// A system that runs over entities having the listed modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Behavior {
    #[serde(flatten)]
    pub base: RecordBase,
    #[serde(default)]
    pub parameters: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<Id>>,
}

impl Behavior {
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            base: RecordBase::new(id, name),
            parameters: Vec::new(),
            modules: None,
        }
    }

    pub fn with_parameter(mut self, parameter: Attribute) -> Self {
        self.parameters.push(parameter);
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

impl Identified for Behavior {
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

impl EditableRecord for Behavior {
    const KIND: RecordKind = RecordKind::Behavior;
    const RELATIONSHIP_FIELD: &'static str = "modules";
    const CHILDREN_FIELD: &'static str = "parameters";

    fn base(&self) -> &RecordBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecordBase {
        &mut self.base
    }

    fn children(&self) -> &[Attribute] {
        &self.parameters
    }

    fn children_mut(&mut self) -> &mut Vec<Attribute> {
        &mut self.parameters
    }

    fn relationships(&self) -> Option<&[Id]> {
        self.modules.as_deref()
    }

    fn relationships_mut(&mut self) -> &mut Option<Vec<Id>> {
        &mut self.modules
    }
}
