use anyhow::Result;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::model::{EditableRecord, Id, RecordKind};
use crate::store::traits::RecordBackend;

/// Failures reported by [`InMemoryBackend`]. The HTTP layer maps each to a status code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("{kind} id must not be empty")]
    EmptyKey { kind: RecordKind },
    #[error("{kind} '{key}' not found")]
    NotFound { kind: RecordKind, key: Id },
    #[error("{kind} '{key}' already exists")]
    Conflict { kind: RecordKind, key: Id },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// A call received by an [`InMemoryBackend`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    GetAll,
    Get(Id),
    Create(Id),
    Update { previous_key: Id, key: Id },
    Delete(Id),
}

/// Ordered in-memory collection behaving like a backend endpoint.
///
/// Stored records never hold client state. Every call is journaled, and a
/// single failure can be queued with [`InMemoryBackend::fail_next`].
#[derive(Debug)]
pub struct InMemoryBackend<R> {
    records: RwLock<Vec<R>>,
    journal: Mutex<Vec<BackendCall>>,
    failure: Mutex<Option<String>>,
}

impl<R: EditableRecord> Default for InMemoryBackend<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: EditableRecord> InMemoryBackend<R> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            journal: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    pub fn with_records(records: Vec<R>) -> Self {
        let backend = Self::new();
        *backend.records.write() = records.into_iter().map(Self::normalize).collect();
        backend
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.journal.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.journal.lock().clear();
    }

    /// Make the next call fail with [`BackendError::Unavailable`].
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn normalize(mut record: R) -> R {
        record.clear_client_state();
        if record.base().name.is_empty() {
            let key = record.business_key().to_string();
            record.base_mut().name = key;
        }
        record.refresh_derived();
        record
    }

    /// Records are stored under the same trimmed key the checks ran against.
    fn store_key(record: &mut R, key: Id) {
        if record.business_key() != key {
            record.set_business_key(key);
        }
    }

    fn begin(&self, call: BackendCall) -> std::result::Result<(), BackendError> {
        self.journal.lock().push(call);
        match self.failure.lock().take() {
            Some(message) => Err(BackendError::Unavailable(message)),
            None => Ok(()),
        }
    }

    pub fn list(&self) -> std::result::Result<Vec<R>, BackendError> {
        self.begin(BackendCall::GetAll)?;
        Ok(self.records.read().clone())
    }

    pub fn find(&self, key: &str) -> std::result::Result<R, BackendError> {
        self.begin(BackendCall::Get(key.to_string()))?;
        self.records
            .read()
            .iter()
            .find(|record| record.business_key() == key)
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                kind: R::KIND,
                key: key.to_string(),
            })
    }

    pub fn insert(&self, mut record: R) -> std::result::Result<R, BackendError> {
        let key = record.business_key().trim().to_string();
        self.begin(BackendCall::Create(key.clone()))?;
        if key.is_empty() {
            return Err(BackendError::EmptyKey { kind: R::KIND });
        }

        let mut records = self.records.write();
        if records.iter().any(|existing| existing.business_key() == key) {
            return Err(BackendError::Conflict { kind: R::KIND, key });
        }
        Self::store_key(&mut record, key);
        let stored = Self::normalize(record);
        records.push(stored.clone());
        Ok(stored)
    }

    pub fn replace(&self, previous_key: &str, mut record: R) -> std::result::Result<R, BackendError> {
        let key = record.business_key().trim().to_string();
        self.begin(BackendCall::Update {
            previous_key: previous_key.to_string(),
            key: key.clone(),
        })?;
        if key.is_empty() {
            return Err(BackendError::EmptyKey { kind: R::KIND });
        }

        let mut records = self.records.write();
        let position = records
            .iter()
            .position(|existing| existing.business_key() == previous_key)
            .ok_or_else(|| BackendError::NotFound {
                kind: R::KIND,
                key: previous_key.to_string(),
            })?;
        if key != previous_key && records.iter().any(|existing| existing.business_key() == key) {
            return Err(BackendError::Conflict { kind: R::KIND, key });
        }
        Self::store_key(&mut record, key);
        let stored = Self::normalize(record);
        records[position] = stored.clone();
        Ok(stored)
    }

    pub fn remove(&self, key: &str) -> std::result::Result<(), BackendError> {
        self.begin(BackendCall::Delete(key.to_string()))?;
        let mut records = self.records.write();
        let position = records
            .iter()
            .position(|existing| existing.business_key() == key)
            .ok_or_else(|| BackendError::NotFound {
                kind: R::KIND,
                key: key.to_string(),
            })?;
        records.remove(position);
        Ok(())
    }
}

#[async_trait::async_trait]
impl<R: EditableRecord> RecordBackend<R> for InMemoryBackend<R> {
    async fn get_all(&self) -> Result<Vec<R>> {
        Ok(self.list()?)
    }

    async fn get(&self, key: &str) -> Result<R> {
        Ok(self.find(key)?)
    }

    async fn create(&self, record: R) -> Result<R> {
        Ok(self.insert(record)?)
    }

    async fn update(&self, previous_key: &Id, record: R) -> Result<R> {
        Ok(self.replace(previous_key, record)?)
    }

    async fn delete(&self, key: &Id) -> Result<()> {
        Ok(self.remove(key)?)
    }
}
