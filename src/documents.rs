//! Document store seam: collections of JSON documents with live snapshot streams.

use crate::clock::Clock;
use crate::errors::StoreError;
use crate::models::Document;
use crate::storage::{load_json, persist_json};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};
use uuid::Uuid;

pub const BACKUPS_COLLECTION: &str = "backups";
pub const PREFERENCES_DOC: &str = "preferences";
pub const PROFILE_DOC: &str = "info";

pub fn cards_collection(uid: &str) -> String {
    format!("users/{uid}/cards")
}

pub fn settings_collection(uid: &str) -> String {
    format!("users/{uid}/settings")
}

pub fn profile_collection(uid: &str) -> String {
    format!("users/{uid}/profile")
}

pub fn goals_collection(uid: &str) -> String {
    format!("users/{uid}/goals")
}

pub fn analytics_collection(uid: &str) -> String {
    format!("users/{uid}/analytics")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub data: Document,
}

pub type Snapshot = Arc<Vec<StoredDocument>>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Live view of a collection. The receiver holds the current snapshot and is
    /// notified after every write to the collection.
    async fn subscribe(&self, collection: &str) -> Result<watch::Receiver<Snapshot>, StoreError>;

    /// Adds a document under a store-assigned id.
    async fn create(&self, collection: &str, data: Document) -> Result<String, StoreError>;

    /// Writes a document, merging top-level fields into any existing one.
    async fn upsert(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentData {
    pub collections: BTreeMap<String, BTreeMap<String, Document>>,
}

#[derive(Default)]
struct Inner {
    data: DocumentData,
    channels: HashMap<String, watch::Sender<Snapshot>>,
}

impl Inner {
    fn snapshot(&self, collection: &str) -> Snapshot {
        let docs = self
            .data
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| StoredDocument {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Arc::new(docs)
    }

    fn publish(&mut self, collection: &str) {
        let snapshot = self.snapshot(collection);
        if let Some(sender) = self.channels.get(collection) {
            sender.send_replace(snapshot);
        }
    }
}

/// In-process document store, optionally mirrored to a JSON file after each write.
pub struct MemoryDocumentStore {
    inner: Mutex<Inner>,
    data_path: Option<PathBuf>,
    clock: Clock,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new(clock: Clock) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            data_path: None,
            clock,
            offline: AtomicBool::new(false),
        }
    }

    /// Opens a store backed by `path`, loading whatever it already holds.
    pub async fn open(path: PathBuf, clock: Clock) -> Self {
        let data: DocumentData = load_json(&path).await;
        info!(
            "loaded {} collections from {}",
            data.collections.len(),
            path.display()
        );
        Self {
            inner: Mutex::new(Inner {
                data,
                channels: HashMap::new(),
            }),
            data_path: Some(path),
            clock,
            offline: AtomicBool::new(false),
        }
    }

    /// While offline every read and write fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }

    async fn commit(&self, inner: &mut Inner, collection: &str) -> Result<(), StoreError> {
        inner.publish(collection);
        if let Some(path) = &self.data_path {
            persist_json(path, &inner.data).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn subscribe(&self, collection: &str) -> Result<watch::Receiver<Snapshot>, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(sender) = inner.channels.get(collection) {
            return Ok(sender.subscribe());
        }
        let (sender, receiver) = watch::channel(inner.snapshot(collection));
        inner.channels.insert(collection.to_owned(), sender);
        debug!("listening on {collection}");
        Ok(receiver)
    }

    async fn create(&self, collection: &str, mut data: Document) -> Result<String, StoreError> {
        self.ensure_online()?;
        let now = Value::from(self.clock.now_millis());
        data.entry("createdAt").or_insert_with(|| now.clone());
        data.insert("updatedAt".to_owned(), now);

        let id = Uuid::new_v4().to_string();
        let mut inner = self.inner.lock().await;
        inner
            .data
            .collections
            .entry(collection.to_owned())
            .or_default()
            .insert(id.clone(), data);
        self.commit(&mut inner, collection).await?;
        debug!("created {collection}/{id}");
        Ok(id)
    }

    async fn upsert(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
        self.ensure_online()?;
        let now = Value::from(self.clock.now_millis());
        let mut inner = self.inner.lock().await;
        let doc = inner
            .data
            .collections
            .entry(collection.to_owned())
            .or_default()
            .entry(id.to_owned())
            .or_default();
        for (key, value) in data {
            doc.insert(key, value);
        }
        doc.insert("updatedAt".to_owned(), now);
        self.commit(&mut inner, collection).await?;
        debug!("upserted {collection}/{id}");
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut inner = self.inner.lock().await;
        let removed = inner
            .data
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            self.commit(&mut inner, collection).await?;
            debug!("deleted {collection}/{id}");
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        self.ensure_online()?;
        let inner = self.inner.lock().await;
        Ok(inner.snapshot(collection).as_ref().clone())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.ensure_online()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .data
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }
}
