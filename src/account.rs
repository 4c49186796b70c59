//! Per-user records outside the card list: preferences, profile, goals, activity, stats, export.

use crate::clock::Clock;
use crate::documents::{
    BACKUPS_COLLECTION, DocumentStore, PREFERENCES_DOC, PROFILE_DOC, analytics_collection,
    cards_collection, goals_collection, profile_collection, settings_collection,
};
use crate::errors::StoreError;
use crate::models::{Document, ExportData, HabitCard, Preferences, UserStats};
use crate::stats::build_user_stats;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const GOAL_ACTIVE: &str = "active";

#[derive(Clone)]
pub struct Account {
    documents: Arc<dyn DocumentStore>,
    clock: Clock,
}

impl Account {
    pub fn new(documents: Arc<dyn DocumentStore>, clock: Clock) -> Self {
        Self { documents, clock }
    }

    /// Stored preferences laid over the defaults, so missing keys keep their default.
    pub async fn preferences(&self, uid: &str) -> Result<Preferences, StoreError> {
        let stored = self
            .documents
            .get(&settings_collection(uid), PREFERENCES_DOC)
            .await?;
        let Some(stored) = stored else {
            return Ok(Preferences::default());
        };
        let mut merged = match serde_json::to_value(Preferences::default())? {
            Value::Object(map) => map,
            _ => Document::new(),
        };
        for (key, value) in stored {
            if merged.contains_key(&key) {
                merged.insert(key, value);
            }
        }
        Ok(serde_json::from_value(Value::Object(merged))?)
    }

    pub async fn save_preferences(&self, uid: &str, preferences: &Preferences) -> Result<(), StoreError> {
        let doc = match serde_json::to_value(preferences)? {
            Value::Object(map) => map,
            _ => Document::new(),
        };
        self.documents
            .upsert(&settings_collection(uid), PREFERENCES_DOC, doc)
            .await
    }

    pub async fn profile(&self, uid: &str) -> Result<Document, StoreError> {
        Ok(self
            .documents
            .get(&profile_collection(uid), PROFILE_DOC)
            .await?
            .unwrap_or_default())
    }

    /// Merges `fields` into the stored profile and returns the result.
    pub async fn save_profile(&self, uid: &str, fields: Document) -> Result<Document, StoreError> {
        self.documents
            .upsert(&profile_collection(uid), PROFILE_DOC, fields)
            .await?;
        self.profile(uid).await
    }

    /// Stores a new goal as active and returns it with its id.
    pub async fn add_goal(&self, uid: &str, mut goal: Document) -> Result<Document, StoreError> {
        let now = Value::from(self.clock.now_millis());
        goal.insert("createdAt".to_owned(), now.clone());
        goal.insert("updatedAt".to_owned(), now);
        goal.insert("status".to_owned(), Value::from(GOAL_ACTIVE));
        let id = self
            .documents
            .create(&goals_collection(uid), goal.clone())
            .await?;
        goal.insert("id".to_owned(), Value::String(id));
        Ok(goal)
    }

    pub async fn goals(&self, uid: &str) -> Result<Vec<Value>, StoreError> {
        self.with_ids(&goals_collection(uid)).await
    }

    /// Sets a goal's current progress. `None` when the goal does not exist.
    pub async fn update_goal_progress(
        &self,
        uid: &str,
        goal_id: &str,
        progress: f64,
    ) -> Result<Option<Document>, StoreError> {
        let collection = goals_collection(uid);
        if self.documents.get(&collection, goal_id).await?.is_none() {
            return Ok(None);
        }
        let mut fields = Document::new();
        fields.insert("currentProgress".to_owned(), Value::from(progress));
        fields.insert("updatedAt".to_owned(), Value::from(self.clock.now_millis()));
        self.documents.upsert(&collection, goal_id, fields).await?;
        let mut goal = self.documents.get(&collection, goal_id).await?.unwrap_or_default();
        goal.insert("id".to_owned(), Value::String(goal_id.to_owned()));
        Ok(Some(goal))
    }

    /// Appends an entry to the user's activity log.
    pub async fn track_action(&self, uid: &str, action: &str, data: Document) -> Result<(), StoreError> {
        let mut entry = Document::new();
        entry.insert("action".to_owned(), Value::from(action));
        entry.insert("data".to_owned(), Value::Object(data));
        entry.insert("timestamp".to_owned(), Value::from(self.clock.now_millis()));
        self.documents
            .create(&analytics_collection(uid), entry)
            .await?;
        debug!(%uid, action, "action tracked");
        Ok(())
    }

    async fn with_ids(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .documents
            .list(collection)
            .await?
            .into_iter()
            .map(|doc| {
                let mut data = doc.data;
                data.insert("id".to_owned(), Value::String(doc.id));
                Value::Object(data)
            })
            .collect())
    }

    async fn cards(&self, uid: &str) -> Result<Vec<HabitCard>, StoreError> {
        let docs = self.documents.list(&cards_collection(uid)).await?;
        Ok(docs
            .iter()
            .filter_map(|doc| HabitCard::from_document(&doc.id, &doc.data).ok())
            .collect())
    }

    pub async fn stats(&self, uid: &str) -> Result<UserStats, StoreError> {
        Ok(build_user_stats(&self.cards(uid).await?))
    }

    pub async fn export(&self, uid: &str) -> Result<ExportData, StoreError> {
        let cards = self.with_ids(&cards_collection(uid)).await?;
        Ok(ExportData {
            export_date: self.clock.now().to_rfc3339(),
            user_id: uid.to_owned(),
            cards,
            preferences: self.preferences(uid).await?,
            profile: self.profile(uid).await?,
            goals: self.goals(uid).await?,
        })
    }

    /// Writes a full export into the backups collection, keyed by user.
    pub async fn backup(&self, uid: &str) -> Result<ExportData, StoreError> {
        let export = self.export(uid).await?;
        let doc = match serde_json::to_value(&export)? {
            Value::Object(map) => map,
            _ => Document::new(),
        };
        self.documents.upsert(BACKUPS_COLLECTION, uid, doc).await?;
        info!(%uid, cards = export.cards.len(), "backup written");
        Ok(export)
    }

    /// Removes cards, goals, activity, preferences and profile. Backups are left in place.
    pub async fn delete_data(&self, uid: &str) -> Result<(), StoreError> {
        for collection in [
            cards_collection(uid),
            goals_collection(uid),
            analytics_collection(uid),
        ] {
            for doc in self.documents.list(&collection).await? {
                if let Err(err) = self.documents.delete(&collection, &doc.id).await {
                    warn!("failed to delete {collection}/{}: {err}", doc.id);
                    return Err(err);
                }
            }
        }
        self.documents
            .delete(&settings_collection(uid), PREFERENCES_DOC)
            .await?;
        self.documents
            .delete(&profile_collection(uid), PROFILE_DOC)
            .await?;
        info!(%uid, "account data deleted");
        Ok(())
    }
}
