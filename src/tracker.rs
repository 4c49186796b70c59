//! Glue between the card store, the document store and device storage.
//!
//! Each action mutates the store under its lock, releases the lock, and only then
//! talks to the backend. Backend failures are logged and the local state stands.

use crate::clock::Clock;
use crate::documents::{DocumentStore, Snapshot, cards_collection};
use crate::errors::CardError;
use crate::models::{
    CardId, CardView, Draft, DraftPatch, DragPhase, GUEST_OWNER, HabitCard, Offset, Pointer,
    SessionUser,
};
use crate::storage::DeviceStorage;
use crate::store::{CancelOutcome, CardStore, Completion, Confirm};
use rand::Rng;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MAX_ROTATION: i8 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    Guest,
    User(String),
}

pub struct Tracker {
    store: Arc<Mutex<CardStore>>,
    documents: Arc<dyn DocumentStore>,
    device: DeviceStorage,
    clock: Clock,
    binding: Mutex<Option<Binding>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Tracker {
    pub fn new(documents: Arc<dyn DocumentStore>, device: DeviceStorage, clock: Clock) -> Self {
        Self {
            store: Arc::new(Mutex::new(CardStore::new(GUEST_OWNER))),
            documents,
            device,
            clock,
            binding: Mutex::new(None),
            listener: Mutex::new(None),
        }
    }

    /// Points the store at the signed-in user's cards, or at the guest cards on
    /// this device when nobody is signed in. Rebinding to the same scope is a no-op.
    pub async fn bind(&self, user: Option<&SessionUser>) {
        let next = match user {
            Some(user) => Binding::User(user.id.clone()),
            None => Binding::Guest,
        };
        let mut binding = self.binding.lock().await;
        if binding.as_ref() == Some(&next) {
            return;
        }
        if let Some(listener) = self.listener.lock().await.take() {
            listener.abort();
        }

        match &next {
            Binding::Guest => {
                let cards = self.device.load_cards(GUEST_OWNER).await;
                info!(count = cards.len(), "loaded guest cards from device");
                self.store.lock().await.reset(GUEST_OWNER, cards);
            }
            Binding::User(uid) => {
                if let Err(err) = self.device.remove(&crate::storage::cards_key(uid)).await {
                    warn!("failed to clear device cards for {uid}: {err}");
                }
                self.store.lock().await.reset(uid.clone(), Vec::new());
                match self.documents.subscribe(&cards_collection(uid)).await {
                    Ok(receiver) => self.listen(receiver).await,
                    Err(err) => warn!("card stream unavailable for {uid}: {err}"),
                }
                info!(%uid, "bound card store to user");
            }
        }
        *binding = Some(next);
    }

    async fn listen(&self, mut receiver: watch::Receiver<Snapshot>) {
        let initial = receiver.borrow_and_update().clone();
        self.store
            .lock()
            .await
            .apply_snapshot(decode_cards(&initial), self.clock.now_millis());

        let store = Arc::clone(&self.store);
        let clock = self.clock.clone();
        let handle = tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let snapshot = receiver.borrow_and_update().clone();
                let cards = decode_cards(&snapshot);
                debug!(count = cards.len(), "card snapshot");
                store.lock().await.apply_snapshot(cards, clock.now_millis());
            }
        });
        *self.listener.lock().await = Some(handle);
    }

    async fn current_uid(&self) -> Option<String> {
        match self.binding.lock().await.as_ref() {
            Some(Binding::User(uid)) => Some(uid.clone()),
            _ => None,
        }
    }

    pub async fn views(&self) -> Vec<CardView> {
        self.store.lock().await.views()
    }

    pub async fn view(&self, id: &CardId) -> Option<CardView> {
        self.store
            .lock()
            .await
            .views()
            .into_iter()
            .find(|view| &view.card.id == id)
    }

    pub async fn cards(&self) -> Vec<HabitCard> {
        self.store.lock().await.cards().to_vec()
    }

    pub async fn card(&self, id: &CardId) -> Option<HabitCard> {
        self.store.lock().await.card(id).cloned()
    }

    pub async fn add_card(&self) -> Result<CardId, CardError> {
        let rotation = rand::rng().random_range(-MAX_ROTATION..=MAX_ROTATION);
        let correlation = Uuid::new_v4().to_string();
        let id = self
            .store
            .lock()
            .await
            .add_card(self.clock.now_millis(), correlation, rotation)?;
        self.mirror_guest().await;
        Ok(id)
    }

    pub async fn start_edit(&self, id: &CardId) -> Result<Draft, CardError> {
        self.store.lock().await.start_edit(id)
    }

    pub async fn update_draft(&self, id: &CardId, patch: DraftPatch) -> Result<Draft, CardError> {
        self.store.lock().await.update_draft(id, patch)
    }

    pub async fn cancel_edit(&self, id: &CardId) -> Result<CancelOutcome, CardError> {
        let outcome = self.store.lock().await.cancel_edit(id)?;
        self.mirror_guest().await;
        Ok(outcome)
    }

    pub async fn save_card(&self, id: &CardId) -> Result<HabitCard, CardError> {
        let card = self.store.lock().await.save_card(id)?;
        let card = self.persist(card).await;
        self.mirror_guest().await;
        Ok(card)
    }

    pub async fn record_completion(&self, id: &CardId) -> Result<Completion, CardError> {
        let mut completion = self
            .store
            .lock()
            .await
            .record_completion(id, self.clock.now_millis())?;
        if completion.celebrate {
            info!(card = %id, "habit completed");
        }
        completion.card = self.persist(completion.card).await;
        self.mirror_guest().await;
        Ok(completion)
    }

    pub async fn restart_card(&self, id: &CardId) -> Result<HabitCard, CardError> {
        let card = self.store.lock().await.restart_card(id)?;
        let card = self.persist(card).await;
        self.mirror_guest().await;
        Ok(card)
    }

    /// Removes the card. The backend delete is best-effort; the card is gone locally either way.
    pub async fn delete_card(&self, id: &CardId) -> Result<(), CardError> {
        let doc_id = self
            .store
            .lock()
            .await
            .delete_card(id, self.clock.now_millis())?;
        if let (Some(doc_id), Some(uid)) = (doc_id, self.current_uid().await) {
            if let Err(err) = self.documents.delete(&cards_collection(&uid), &doc_id).await {
                warn!("delete of {doc_id} failed, keeping local removal: {err}");
            }
        }
        self.mirror_guest().await;
        Ok(())
    }

    /// Drives a pointer drag. Only the release touches card state and storage.
    pub async fn drag(
        &self,
        id: &CardId,
        phase: DragPhase,
        pointer: Pointer,
    ) -> Result<(Offset, bool), CardError> {
        match phase {
            DragPhase::Start => Ok((self.store.lock().await.begin_drag(id, pointer)?, false)),
            DragPhase::Move => Ok((self.store.lock().await.drag_to(id, pointer)?, false)),
            DragPhase::End => {
                let card = self.store.lock().await.end_drag(id, Some(pointer))?;
                let offset = Offset { x: card.x, y: card.y };
                // Unsaved cards are created by save, not by moving them around.
                if !card.id.is_temp() {
                    self.persist(card).await;
                }
                self.mirror_guest().await;
                Ok((offset, true))
            }
        }
    }

    /// Sends a locally updated card to the document store when signed in and
    /// returns the card as the store now holds it. A temporary card comes back
    /// under its document id once the create is confirmed.
    async fn persist(&self, card: HabitCard) -> HabitCard {
        let Some(uid) = self.current_uid().await else {
            return card;
        };
        let collection = cards_collection(&uid);
        let token = match &card.id {
            CardId::Persisted(doc_id) => {
                self.write_through(&collection, doc_id, &card).await;
                return card;
            }
            CardId::Temp(token) => *token,
        };

        if !self.store.lock().await.begin_create(token) {
            debug!(token, "create already in flight");
            return card;
        }
        let created = self.documents.create(&collection, card.to_document()).await;
        if self.current_uid().await.as_deref() != Some(uid.as_str()) {
            debug!(token, "session changed while creating card");
            return card;
        }
        match created {
            Ok(doc_id) => {
                let confirm = self.store.lock().await.confirm_created(
                    token,
                    &doc_id,
                    &card,
                    self.clock.now_millis(),
                );
                self.settle(&collection, confirm).await.unwrap_or(card)
            }
            Err(err) => {
                self.store.lock().await.abort_create(token);
                warn!(token, "creating card failed, keeping local copy: {err}");
                card
            }
        }
    }

    async fn settle(&self, collection: &str, confirm: Confirm) -> Option<HabitCard> {
        match confirm {
            Confirm::Replaced { card, stale: false } => {
                debug!(card = %card.id, "card persisted");
                Some(card)
            }
            Confirm::Replaced { card, stale: true } => {
                if let Some(doc_id) = card.id.persisted() {
                    self.write_through(collection, doc_id, &card).await;
                }
                Some(card)
            }
            Confirm::Orphaned(doc_id) => {
                if let Err(err) = self.documents.delete(collection, &doc_id).await {
                    warn!("removing orphaned {doc_id} failed: {err}");
                }
                None
            }
        }
    }

    /// Upserts a persisted card. A failed write keeps the local copy authoritative
    /// until a later write of the same card succeeds.
    async fn write_through(&self, collection: &str, doc_id: &str, card: &HabitCard) {
        match self.documents.upsert(collection, doc_id, card.to_document()).await {
            Ok(()) => self.store.lock().await.mark_synced(doc_id),
            Err(err) => {
                warn!("saving {doc_id} failed, keeping local copy: {err}");
                self.store.lock().await.mark_unsynced(doc_id);
            }
        }
    }

    /// Guest cards live on the device; keep the copy there current.
    async fn mirror_guest(&self) {
        if *self.binding.lock().await != Some(Binding::Guest) {
            return;
        }
        let cards = self.store.lock().await.cards().to_vec();
        if let Err(err) = self.device.save_cards(GUEST_OWNER, &cards).await {
            warn!("failed to store guest cards: {err}");
        }
    }
}

fn decode_cards(snapshot: &Snapshot) -> Vec<HabitCard> {
    snapshot
        .iter()
        .filter_map(|doc| match HabitCard::from_document(&doc.id, &doc.data) {
            Ok(card) => Some(card),
            Err(err) => {
                warn!("skipping malformed card {}: {err}", doc.id);
                None
            }
        })
        .collect()
}
