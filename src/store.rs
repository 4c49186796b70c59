//! In-memory card list with optimistic mutations.
//!
//! Every operation is synchronous and runs under the caller's lock; the tracker
//! performs the persistence round trips and reports back through
//! [`CardStore::confirm_created`] and [`CardStore::apply_snapshot`].

use crate::debounce::{
    ADD_WINDOW_MS, COMPLETION_WINDOW_MS, DELETE_WINDOW_MS, Debounce, KeyedDebounce,
};
use crate::drag::DragSession;
use crate::errors::{CardError, ValidationError};
use crate::models::{
    CardId, CardView, Draft, DraftPatch, HabitCard, Offset, Pointer, UNTITLED_HABIT,
    parse_deadline,
};
use crate::progress;
use crate::reconcile::{Pending, reconcile, same_card};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// An empty, never-saved card was discarded.
    Removed,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub card: HabitCard,
    pub celebrate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Confirm {
    /// The temporary card now carries the document id. `stale` is set when the
    /// card changed locally after the create request was sent.
    Replaced { card: HabitCard, stale: bool },
    /// The temporary card was deleted while the create was in flight.
    Orphaned(String),
}

#[derive(Debug)]
pub struct CardStore {
    owner: String,
    cards: Vec<HabitCard>,
    drafts: HashMap<CardId, Draft>,
    pending: Pending,
    creating: HashSet<u64>,
    /// Correlation tokens of temporary cards deleted while their create was in flight.
    discarded: HashMap<String, u64>,
    celebrating: Option<CardId>,
    drag: Option<DragSession>,
    add_guard: Debounce,
    completion_guard: KeyedDebounce<CardId>,
    delete_guard: Debounce,
}

impl CardStore {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            cards: Vec::new(),
            drafts: HashMap::new(),
            pending: Pending::default(),
            creating: HashSet::new(),
            discarded: HashMap::new(),
            celebrating: None,
            drag: None,
            add_guard: Debounce::new(ADD_WINDOW_MS),
            completion_guard: KeyedDebounce::new(COMPLETION_WINDOW_MS),
            delete_guard: Debounce::new(DELETE_WINDOW_MS),
        }
    }

    /// Starts over for a different owner, keeping the debounce history.
    pub fn reset(&mut self, owner: impl Into<String>, cards: Vec<HabitCard>) {
        self.owner = owner.into();
        self.cards = cards;
        self.drafts.clear();
        self.pending.clear();
        self.creating.clear();
        self.discarded.clear();
        self.celebrating = None;
        self.drag = None;
    }

    pub fn cards(&self) -> &[HabitCard] {
        &self.cards
    }

    pub fn card(&self, id: &CardId) -> Option<&HabitCard> {
        self.cards.iter().find(|card| &card.id == id)
    }

    pub fn draft(&self, id: &CardId) -> Option<&Draft> {
        self.drafts.get(id)
    }

    pub fn celebrating(&self) -> Option<&CardId> {
        self.celebrating.as_ref()
    }

    pub fn views(&self) -> Vec<CardView> {
        self.cards
            .iter()
            .map(|card| CardView {
                card: card.clone(),
                editing: card.editing,
                percent: progress::of_card(card).percent,
                celebrating: self.celebrating.as_ref() == Some(&card.id),
                draft: self.drafts.get(&card.id).cloned(),
            })
            .collect()
    }

    pub fn add_card(&mut self, now_ms: i64, correlation: String, rotation: i8) -> Result<CardId, CardError> {
        if !self.add_guard.try_fire(now_ms) {
            return Err(CardError::Debounced);
        }
        let mut token = now_ms.max(0) as u64;
        while self.card(&CardId::Temp(token)).is_some() {
            token += 1;
        }
        let card = HabitCard::new_temp(token, correlation, &self.owner, now_ms, rotation);
        let id = card.id.clone();
        self.cards.insert(0, card);
        self.drafts.insert(id.clone(), Draft::default());
        Ok(id)
    }

    pub fn start_edit(&mut self, id: &CardId) -> Result<Draft, CardError> {
        let card = self.card_mut(id)?;
        card.editing = true;
        let mut draft = Draft::from_card(card);
        draft.show_advanced = !card.manual_progress;
        self.drafts.insert(id.clone(), draft.clone());
        Ok(draft)
    }

    pub fn update_draft(&mut self, id: &CardId, patch: DraftPatch) -> Result<Draft, CardError> {
        let deadline = match patch.deadline.as_deref().map(str::trim) {
            None => None,
            Some("") => Some(None),
            Some(raw) => Some(Some(
                parse_deadline(raw).map_err(|_| ValidationError::InvalidDeadline(raw.to_owned()))?,
            )),
        };
        let draft = self
            .drafts
            .get_mut(id)
            .ok_or_else(|| CardError::NotEditing(id.clone()))?;
        if let Some(title) = patch.title {
            draft.title = title;
        }
        if let Some(details) = patch.details {
            draft.details = details;
        }
        if let Some(deadline) = deadline {
            draft.deadline = deadline;
        }
        if let Some(show_advanced) = patch.show_advanced {
            draft.show_advanced = show_advanced;
        }
        if let Some(completions) = patch.completions {
            draft.completions = completions;
        }
        Ok(draft.clone())
    }

    pub fn cancel_edit(&mut self, id: &CardId) -> Result<CancelOutcome, CardError> {
        let card = self.card_mut(id)?;
        let outcome = if card.id.is_temp() && card.is_blank() {
            self.remove(id);
            CancelOutcome::Removed
        } else {
            card.editing = false;
            CancelOutcome::Closed
        };
        self.drafts.remove(id);
        Ok(outcome)
    }

    /// Applies the draft to the card and returns the card to persist.
    pub fn save_card(&mut self, id: &CardId) -> Result<HabitCard, CardError> {
        let draft = self
            .drafts
            .get(id)
            .cloned()
            .ok_or_else(|| CardError::NotEditing(id.clone()))?;
        let card = self.card_mut(id)?;
        let title = draft.title.trim();
        card.title = if title.is_empty() {
            UNTITLED_HABIT.to_owned()
        } else {
            draft.title.clone()
        };
        card.details = draft.details;
        card.deadline = draft.deadline;
        card.manual_progress = !draft.show_advanced;
        card.completions = draft.completions;
        card.editing = false;
        let derived = progress::of_card(card);
        card.progress = derived.percent;
        card.completed = derived.complete;
        let saved = card.clone();
        self.drafts.remove(id);
        Ok(saved)
    }

    pub fn record_completion(&mut self, id: &CardId, now_ms: i64) -> Result<Completion, CardError> {
        if self.card(id).is_none() {
            return Err(CardError::NotFound(id.clone()));
        }
        if !self.completion_guard.try_fire(id.clone(), now_ms) {
            return Err(CardError::Debounced);
        }
        let card = self.card_mut(id)?;
        if !card.has_title() {
            return Err(ValidationError::MissingTitle.into());
        }
        card.completions = card.completions.saturating_add(1);
        card.streak = card.streak.saturating_add(1);
        let derived = progress::of_card(card);
        card.progress = derived.percent;
        card.completed = derived.complete;
        let celebrate = derived.complete && !card.manual_progress;
        let updated = card.clone();
        if celebrate {
            self.celebrating = Some(id.clone());
        }
        Ok(Completion {
            card: updated,
            celebrate,
        })
    }

    pub fn restart_card(&mut self, id: &CardId) -> Result<HabitCard, CardError> {
        let card = self.card_mut(id)?;
        card.completions = 0;
        card.streak = 0;
        card.progress = 0;
        card.completed = false;
        let updated = card.clone();
        self.celebrating = None;
        Ok(updated)
    }

    /// Removes the card locally. Returns the document id to delete remotely, if any.
    pub fn delete_card(&mut self, id: &CardId, now_ms: i64) -> Result<Option<String>, CardError> {
        if !self.delete_guard.try_fire(now_ms) {
            return Err(CardError::Debounced);
        }
        let removed = self.remove(id).ok_or_else(|| CardError::NotFound(id.clone()))?;
        self.drafts.remove(id);
        self.completion_guard.forget(id);
        self.celebrating = None;
        if self.drag.as_ref().is_some_and(|drag| &drag.card_id == id) {
            self.drag = None;
        }
        match removed.id {
            CardId::Persisted(doc_id) => {
                self.pending.tombstone(&doc_id);
                Ok(Some(doc_id))
            }
            CardId::Temp(token) => {
                if let Some(corr) = removed.correlation.filter(|_| self.creating.contains(&token)) {
                    self.discarded.insert(corr, token);
                }
                Ok(None)
            }
        }
    }

    pub fn begin_drag(&mut self, id: &CardId, pointer: Pointer) -> Result<Offset, CardError> {
        let card = self.card(id).ok_or_else(|| CardError::NotFound(id.clone()))?;
        let origin = Offset { x: card.x, y: card.y };
        self.drag = Some(DragSession::begin(id.clone(), pointer, origin));
        Ok(origin)
    }

    /// Visual offset for an in-progress drag. The card list is untouched.
    pub fn drag_to(&mut self, id: &CardId, pointer: Pointer) -> Result<Offset, CardError> {
        match self.drag.as_mut() {
            Some(drag) if &drag.card_id == id => Ok(drag.move_to(pointer)),
            _ => Err(CardError::NoDrag),
        }
    }

    /// Commits the drag offset to the card on pointer release.
    pub fn end_drag(&mut self, id: &CardId, pointer: Option<Pointer>) -> Result<HabitCard, CardError> {
        let drag = match self.drag.take() {
            Some(drag) if &drag.card_id == id => drag,
            other => {
                self.drag = other;
                return Err(CardError::NoDrag);
            }
        };
        let (card_id, offset) = drag.finish(pointer);
        let card = self.card_mut(&card_id)?;
        card.x = offset.x;
        card.y = offset.y;
        Ok(card.clone())
    }

    /// Marks a create request in flight. Returns false when one is already pending
    /// for this temporary card.
    pub fn begin_create(&mut self, token: u64) -> bool {
        self.creating.insert(token)
    }

    pub fn abort_create(&mut self, token: u64) {
        self.creating.remove(&token);
        self.discarded.retain(|_, pending| *pending != token);
    }

    /// Remembers that the last write of a persisted card failed, so snapshots keep
    /// the local copy until a later write goes through.
    pub fn mark_unsynced(&mut self, doc_id: &str) {
        self.pending.mark_unsynced(doc_id);
    }

    pub fn mark_synced(&mut self, doc_id: &str) {
        self.pending.mark_synced(doc_id);
    }

    pub fn is_unsynced(&self, doc_id: &str) -> bool {
        self.pending.is_unsynced(doc_id)
    }

    /// Swaps a temporary card for its newly created document.
    pub fn confirm_created(&mut self, token: u64, doc_id: &str, sent: &HabitCard, now_ms: i64) -> Confirm {
        self.creating.remove(&token);
        let temp_id = CardId::Temp(token);
        let persisted_id = CardId::Persisted(doc_id.to_owned());

        let discarded = sent
            .correlation
            .as_ref()
            .and_then(|corr| self.discarded.remove(corr))
            .is_some();
        if discarded {
            self.remove(&persisted_id);
            self.pending.tombstone(doc_id);
            return Confirm::Orphaned(doc_id.to_owned());
        }

        let card = match self.remove(&temp_id) {
            Some(mut card) => {
                card.id = persisted_id.clone();
                let existing = self.cards.iter().position(|c| c.id == persisted_id);
                match existing {
                    Some(index) => self.cards[index] = card.clone(),
                    None => self.cards.insert(0, card.clone()),
                }
                self.rekey(&temp_id, &persisted_id);
                card
            }
            // The snapshot delivered the document before this confirmation.
            None => match self.card(&persisted_id).cloned() {
                Some(card) => card,
                None => {
                    self.pending.tombstone(doc_id);
                    return Confirm::Orphaned(doc_id.to_owned());
                }
            },
        };

        self.pending.mark_saved(doc_id, now_ms);
        let stale = card.to_document() != sent.to_document();
        Confirm::Replaced { card, stale }
    }

    /// Merges a streamed snapshot of persisted cards into the local list.
    pub fn apply_snapshot(&mut self, remote: Vec<HabitCard>, now_ms: i64) {
        self.pending.prune(now_ms, &remote);
        let remote: Vec<HabitCard> = remote
            .into_iter()
            .filter(|card| {
                card.correlation
                    .as_ref()
                    .is_none_or(|token| !self.discarded.contains_key(token))
            })
            .collect();

        // Temporary cards about to be replaced hand their UI state to the replacement.
        let mut handover: Vec<(CardId, CardId, bool)> = Vec::new();
        for temp in self.cards.iter().filter(|card| card.id.is_temp()) {
            if let Some(found) = remote.iter().find(|p| same_card(temp, p)) {
                if self.card(&found.id).is_none() {
                    handover.push((temp.id.clone(), found.id.clone(), temp.editing));
                }
            }
        }

        self.cards = reconcile(remote, &self.cards, &self.pending);

        for (from, to, editing) in handover {
            if let Some(card) = self.cards.iter_mut().find(|c| c.id == to) {
                card.editing = card.editing || editing;
            }
            self.rekey(&from, &to);
        }

        let present: HashSet<&CardId> = self.cards.iter().map(|card| &card.id).collect();
        self.drafts.retain(|id, _| present.contains(id));
        if self.celebrating.as_ref().is_some_and(|id| !present.contains(id)) {
            self.celebrating = None;
        }
    }

    fn rekey(&mut self, from: &CardId, to: &CardId) {
        if let Some(draft) = self.drafts.remove(from) {
            self.drafts.insert(to.clone(), draft);
        }
        if self.celebrating.as_ref() == Some(from) {
            self.celebrating = Some(to.clone());
        }
        if let Some(drag) = self.drag.as_mut().filter(|drag| &drag.card_id == from) {
            drag.card_id = to.clone();
        }
        self.completion_guard.rekey(from, to.clone());
    }

    fn card_mut(&mut self, id: &CardId) -> Result<&mut HabitCard, CardError> {
        self.cards
            .iter_mut()
            .find(|card| &card.id == id)
            .ok_or_else(|| CardError::NotFound(id.clone()))
    }

    fn remove(&mut self, id: &CardId) -> Option<HabitCard> {
        let index = self.cards.iter().position(|card| &card.id == id)?;
        Some(self.cards.remove(index))
    }
}
