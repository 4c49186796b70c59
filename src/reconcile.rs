use crate::models::HabitCard;
use std::collections::{HashMap, HashSet};

/// How long a freshly saved id keeps its optimistic local copy over streamed copies.
pub const RECENTLY_SAVED_TTL_MS: i64 = 2000;

/// Mutations applied locally that the snapshot stream may not reflect yet.
#[derive(Debug, Clone, Default)]
pub struct Pending {
    recently_saved: HashMap<String, i64>,
    tombstones: HashSet<String>,
    unsynced: HashSet<String>,
}

impl Pending {
    pub fn mark_saved(&mut self, id: &str, now_ms: i64) {
        self.recently_saved
            .insert(id.to_owned(), now_ms + RECENTLY_SAVED_TTL_MS);
    }

    pub fn is_recently_saved(&self, id: &str) -> bool {
        self.recently_saved.contains_key(id)
    }

    /// Records a persisted card whose last write did not reach the backend.
    pub fn mark_unsynced(&mut self, id: &str) {
        self.unsynced.insert(id.to_owned());
    }

    pub fn mark_synced(&mut self, id: &str) {
        self.unsynced.remove(id);
    }

    pub fn is_unsynced(&self, id: &str) -> bool {
        self.unsynced.contains(id)
    }

    /// Whether the local copy of `id` must win over the streamed one.
    fn keeps_local(&self, id: &str) -> bool {
        self.is_recently_saved(id) || self.is_unsynced(id)
    }

    pub fn tombstone(&mut self, id: &str) {
        self.recently_saved.remove(id);
        self.unsynced.remove(id);
        self.tombstones.insert(id.to_owned());
    }

    pub fn is_tombstoned(&self, id: &str) -> bool {
        self.tombstones.contains(id)
    }

    /// Drops expired saved ids, and tombstones the snapshot no longer carries.
    pub fn prune(&mut self, now_ms: i64, remote: &[HabitCard]) {
        self.recently_saved.retain(|_, expires_at| *expires_at > now_ms);
        let present: HashSet<&str> = remote.iter().filter_map(|c| c.id.persisted()).collect();
        self.tombstones.retain(|id| present.contains(id.as_str()));
    }

    pub fn clear(&mut self) {
        self.recently_saved.clear();
        self.tombstones.clear();
        self.unsynced.clear();
    }
}

/// Merges a streamed snapshot with the local list into the list to display.
///
/// Persisted cards come first, newest first; temporary cards that no persisted
/// card matches yet follow in their local order.
pub fn reconcile(remote: Vec<HabitCard>, local: &[HabitCard], pending: &Pending) -> Vec<HabitCard> {
    let local_persisted: HashMap<&str, &HabitCard> = local
        .iter()
        .filter_map(|card| card.id.persisted().map(|id| (id, card)))
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut persisted: Vec<HabitCard> = Vec::with_capacity(remote.len());
    for mut card in remote {
        let Some(id) = card.id.persisted().map(str::to_owned) else {
            continue;
        };
        if pending.is_tombstoned(&id) || !seen.insert(id.clone()) {
            continue;
        }
        match local_persisted.get(id.as_str()) {
            Some(mine) if pending.keeps_local(&id) => persisted.push((*mine).clone()),
            Some(mine) => {
                card.editing = mine.editing;
                persisted.push(card);
            }
            None => persisted.push(card),
        }
    }

    // A just-saved or unsynced card the stream has not delivered yet stays visible.
    for (id, card) in &local_persisted {
        if pending.keeps_local(id) && !pending.is_tombstoned(id) && !seen.contains(*id) {
            seen.insert((*id).to_owned());
            persisted.push((*card).clone());
        }
    }

    persisted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let temps = local
        .iter()
        .filter(|card| card.id.is_temp())
        .filter(|temp| !persisted.iter().any(|p| same_card(temp, p)))
        .cloned()
        .collect::<Vec<_>>();
    persisted.extend(temps);
    persisted
}

/// Whether a temporary card and a persisted card are the same habit.
///
/// Cards minted here carry a correlation token; content equality is only used for
/// temporary cards restored from storage written before tokens existed.
pub fn same_card(temp: &HabitCard, persisted: &HabitCard) -> bool {
    match &temp.correlation {
        Some(token) => persisted.correlation.as_deref() == Some(token.as_str()),
        None => {
            temp.title == persisted.title
                && temp.details == persisted.details
                && temp.editing == persisted.editing
        }
    }
}
