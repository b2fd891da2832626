//! Record store collaborator.
//!
//! Endpoints only need three operations: `save`, `load` and `delete`.
//! Persistence lives behind [`Store`]; [`MemoryStore`] backs the demo and the
//! tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The record was refused. The message is shown to the client as-is.
    #[error("{0}")]
    Invalid(String),

    #[error("record {0} not found")]
    NotFound(u64),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Something a [`Store`] can hold.
pub trait Record: Clone + Send + Sync + 'static {
    /// `None` until the record has been saved once.
    fn id(&self) -> Option<u64>;

    fn set_id(&mut self, id: u64);

    /// Intrinsic checks run before every save.
    fn check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// A value that must be unique across the store, with the message to
    /// report on a clash.
    fn unique_key(&self) -> Option<(String, &'static str)> {
        None
    }
}

#[async_trait]
pub trait Store<T: Record>: Send + Sync {
    /// Inserts a record without an id, or replaces the record with its id.
    /// Returns the record's id.
    async fn save(&self, record: T) -> Result<u64, StoreError>;

    async fn load(&self, id: u64) -> Result<Option<T>, StoreError>;

    async fn delete(&self, id: u64) -> Result<(), StoreError>;
}

/// Process-local store. Ids start at 1.
pub struct MemoryStore<T> {
    inner: RwLock<Inner<T>>,
}

struct Inner<T> {
    next_id: u64,
    records: BTreeMap<u64, T>,
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner { next_id: 1, records: BTreeMap::new() }) }
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl<T: Record> Store<T> for MemoryStore<T> {
    async fn save(&self, mut record: T) -> Result<u64, StoreError> {
        record.check()?;
        let mut inner = self.inner.write();

        if let Some((key, message)) = record.unique_key() {
            let clash = inner.records.values().any(|other| {
                other.id() != record.id() && other.unique_key().is_some_and(|(k, _)| k == key)
            });
            if clash {
                return Err(StoreError::Invalid(message.to_owned()));
            }
        }

        let id = match record.id() {
            Some(id) if inner.records.contains_key(&id) => id,
            Some(id) => return Err(StoreError::NotFound(id)),
            None => {
                let id = inner.next_id;
                inner.next_id += 1;
                record.set_id(id);
                id
            }
        };
        inner.records.insert(id, record);
        Ok(id)
    }

    async fn load(&self, id: u64) -> Result<Option<T>, StoreError> {
        Ok(self.inner.read().records.get(&id).cloned())
    }

    async fn delete(&self, id: u64) -> Result<(), StoreError> {
        self.inner
            .write()
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}

// ── Records used by the reference endpoints ───────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Post {
    pub id: Option<u64>,
    pub title: String,
    pub content: String,
}

impl Record for Post {
    fn id(&self) -> Option<u64> { self.id }
    fn set_id(&mut self, id: u64) { self.id = Some(id); }

    fn check(&self) -> Result<(), StoreError> {
        if self.title.is_empty() && self.content.is_empty() {
            return Err(StoreError::Invalid("Content and title are empty.".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct User {
    pub id: Option<u64>,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl Record for User {
    fn id(&self) -> Option<u64> { self.id }
    fn set_id(&mut self, id: u64) { self.id = Some(id); }

    fn check(&self) -> Result<(), StoreError> {
        if self.email.is_empty() {
            return Err(StoreError::Invalid("Cannot create a user with an empty login name.".into()));
        }
        if self.password.is_empty() {
            return Err(StoreError::Invalid("Cannot create a user with an empty password.".into()));
        }
        Ok(())
    }

    fn unique_key(&self) -> Option<(String, &'static str)> {
        Some((self.email.to_ascii_lowercase(), "Sorry, that email address is already used!"))
    }
}
