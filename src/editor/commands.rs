use serde_json::Value;

use crate::model::{Attribute, StableId};

/// A synchronous edit of the editor session, as dispatched by the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorCommand<R> {
    /// Focus a record, or clear the session with `None`.
    Select(Option<R>),
    UpdateProperty {
        path: String,
        value: Value,
    },
    UpdateAttributeProperty {
        attribute: StableId,
        field: String,
        value: Value,
    },
    AddAttribute(Attribute),
    RemoveAttribute(StableId),
    /// Restore one sub-record from the snapshot.
    RevertAttribute(StableId),
    ResetChanges,
}

impl<R> EditorCommand<R> {
    pub fn update_property(path: impl Into<String>, value: Value) -> Self {
        Self::UpdateProperty {
            path: path.into(),
            value,
        }
    }

    pub fn update_attribute(attribute: StableId, field: impl Into<String>, value: Value) -> Self {
        Self::UpdateAttributeProperty {
            attribute,
            field: field.into(),
            value,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::UpdateProperty { .. } => "update_property",
            Self::UpdateAttributeProperty { .. } => "update_attribute_property",
            Self::AddAttribute(_) => "add_attribute",
            Self::RemoveAttribute(_) => "remove_attribute",
            Self::RevertAttribute(_) => "revert_attribute",
            Self::ResetChanges => "reset_changes",
        }
    }
}
