use crate::errors::StoreError;
use crate::models::{GUEST_OWNER, HabitCard};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error};

/// Reads a JSON file, falling back to the default value when it is missing or unreadable.
pub async fn load_json<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse {}: {err}", path.display());
                T::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => T::default(),
        Err(err) => {
            error!("failed to read {}: {err}", path.display());
            T::default()
        }
    }
}

pub async fn persist_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let payload = serde_json::to_vec_pretty(data)?;
    fs::write(path, payload).await?;
    Ok(())
}

pub fn cards_key(owner: &str) -> String {
    format!("tracker.cards.v1.{owner}")
}

/// On-device key/value storage: one JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct DeviceStorage {
    dir: PathBuf,
}

impl DeviceStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                error!("failed to read device key {key}: {err}");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                error!("ignoring unreadable device key {key}: {err}");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        persist_json(&self.path_for(key), value).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                debug!("removed device key {key}");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Cards kept on the device for `owner`, normalized for display.
    ///
    /// Entries that fail to parse are skipped; restored cards are never in edit mode.
    pub async fn load_cards(&self, owner: &str) -> Vec<HabitCard> {
        let Some(raw) = self.get::<Vec<serde_json::Value>>(&cards_key(owner)).await else {
            return Vec::new();
        };
        raw.into_iter()
            .filter_map(|value| match serde_json::from_value::<HabitCard>(value) {
                Ok(mut card) => {
                    card.editing = false;
                    if card.owner_id.is_empty() {
                        card.owner_id = GUEST_OWNER.to_owned();
                    }
                    Some(card)
                }
                Err(err) => {
                    error!("skipping stored card: {err}");
                    None
                }
            })
            .collect()
    }

    pub async fn save_cards(&self, owner: &str, cards: &[HabitCard]) -> Result<(), StoreError> {
        self.set(&cards_key(owner), &cards).await
    }
}
