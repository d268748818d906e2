use anyhow::Result;

use crate::logic::RecordRef;
use crate::model::{EditableRecord, Id};

/// Backend collection endpoint for one record kind.
///
/// Records are always addressed by the business key the backend last
/// acknowledged. Stable ids never cross this boundary.
#[async_trait::async_trait]
pub trait RecordBackend<R: EditableRecord>: Send + Sync {
    /// Fetch every record in the collection
    async fn get_all(&self) -> Result<Vec<R>>;
    /// Fetch a single record by business key
    async fn get(&self, key: &str) -> Result<R>;
    /// Create a record, returning the backend's canonical form of it
    async fn create(&self, record: R) -> Result<R>;
    /// Replace the record known as `previous_key`; `record` may carry a new key
    async fn update(&self, previous_key: &Id, record: R) -> Result<R>;
    /// Delete the record known as `key`
    async fn delete(&self, key: &Id) -> Result<()>;
}

/// Something that can list the identity pairs of a record collection.
///
/// Editors use it to translate relationship fields that point into another
/// kind's collection.
pub trait ReferenceSource: Send + Sync {
    fn references(&self) -> Vec<RecordRef>;

    /// Business keys the backend has acknowledged, if the source tracks them.
    fn acknowledged_keys(&self) -> Option<Vec<Id>> {
        None
    }
}
