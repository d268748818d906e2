use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Business key of a record or attribute. This is what the backend addresses.
pub type Id = String;

/// Client-side identity of a record or attribute.
///
/// Assigned once when the record enters the client and never changed or sent
/// to the backend. Backed by a random v4 UUID, so two records never share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(Uuid);

impl StableId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse a reference that may or may not be a stable id.
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for StableId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Persistence status of a record relative to its last saved snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Matches the last snapshot acknowledged by the backend.
    #[default]
    Saved,
    /// Exists only on the client; there is no snapshot for it.
    New,
    /// Differs from its snapshot.
    Dirty,
    /// A save is in flight. Only reported by [`RecordMeta::effective_status`].
    Saving,
}

/// Transient marker set while a backend call for the record is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditStatus {
    Saving,
}

/// Client-only bookkeeping carried by every record and attribute.
///
/// Never serialized: the backend sees neither stable ids nor statuses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordMeta {
    pub stable_id: Option<StableId>,
    pub status: RecordStatus,
    pub edit_status: Option<EditStatus>,
}

impl RecordMeta {
    pub fn new_record() -> Self {
        Self {
            stable_id: None,
            status: RecordStatus::New,
            edit_status: None,
        }
    }

    pub fn effective_status(&self) -> RecordStatus {
        match self.edit_status {
            Some(EditStatus::Saving) => RecordStatus::Saving,
            None => self.status,
        }
    }

    pub fn is_new(&self) -> bool {
        self.status == RecordStatus::New
    }
}

/// The record kinds the editor manages, one backend collection each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Entity,
    Module,
    Behavior,
}

impl RecordKind {
    /// Path segment of the backend collection endpoint.
    pub fn collection(&self) -> &'static str {
        match self {
            RecordKind::Entity => "entities",
            RecordKind::Module => "modules",
            RecordKind::Behavior => "behaviors",
        }
    }

    /// Kind whose business keys this kind's relationship field refers to.
    pub fn relationship_target(&self) -> RecordKind {
        RecordKind::Module
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Entity => "entity",
            RecordKind::Module => "module",
            RecordKind::Behavior => "behavior",
        };
        f.write_str(name)
    }
}
