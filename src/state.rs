use crate::account::Account;
use crate::clock::Clock;
use crate::config::Config;
use crate::documents::{DocumentStore, MemoryDocumentStore};
use crate::errors::AppError;
use crate::identity::{IdentityProvider, MemoryIdentity};
use crate::models::SessionUser;
use crate::session::Session;
use crate::storage::DeviceStorage;
use crate::tracker::Tracker;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub session: Arc<Session>,
    pub tracker: Arc<Tracker>,
    pub account: Account,
    auth_sync: Arc<Mutex<()>>,
}

impl AppState {
    /// Wires the in-process providers from configuration.
    pub async fn open(config: &Config) -> Self {
        let clock = Clock::system();
        let documents = Arc::new(MemoryDocumentStore::open(config.data_path.clone(), clock.clone()).await);
        let device = DeviceStorage::new(config.device_dir.clone());
        Self::new(Arc::new(MemoryIdentity::new()), documents, device, clock).await
    }

    pub async fn new(
        identity: Arc<dyn IdentityProvider>,
        documents: Arc<dyn DocumentStore>,
        device: DeviceStorage,
        clock: Clock,
    ) -> Self {
        let session = Session::restore(device.clone()).await;
        let tracker = Tracker::new(documents.clone(), device, clock.clone());
        tracker.bind(session.current().as_ref()).await;
        Self {
            identity,
            session: Arc::new(session),
            tracker: Arc::new(tracker),
            account: Account::new(documents, clock),
            auth_sync: Arc::new(Mutex::new(())),
        }
    }

    /// Brings the session and the card store in line with the provider's auth state.
    pub async fn sync_auth(&self) -> Option<SessionUser> {
        let _guard = self.auth_sync.lock().await;
        let auth = self.identity.subscribe().borrow().clone();
        let user = self.session.apply(auth.as_ref()).await;
        self.tracker.bind(user.as_ref()).await;
        user
    }

    /// Follows provider auth changes for the lifetime of the process, starting
    /// with the provider's current state.
    pub fn watch_auth(&self) -> JoinHandle<()> {
        let state = self.clone();
        let mut changes = self.identity.subscribe();
        tokio::spawn(async move {
            let user = state.sync_auth().await;
            info!(signed_in = user.is_some(), "auth state resolved");
            while changes.changed().await.is_ok() {
                let user = state.sync_auth().await;
                debug!(uid = ?user.as_ref().map(|u| &u.id), "auth state changed");
            }
        })
    }

    pub fn require_user(&self) -> Result<SessionUser, AppError> {
        self.session.current().ok_or_else(AppError::unauthorized)
    }
}
