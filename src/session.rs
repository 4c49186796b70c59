use crate::identity::AuthUser;
use crate::models::SessionUser;
use crate::storage::DeviceStorage;
use std::sync::RwLock;
use tracing::{info, warn};

/// Device key holding the last signed-in user, used only to start fast.
pub const SESSION_CACHE_KEY: &str = "tracer.user";

/// The signed-in user as the rest of the app sees it.
pub struct Session {
    current: RwLock<Option<SessionUser>>,
    device: DeviceStorage,
}

impl Session {
    /// Starts from the cached user, if any, until the provider reports its state.
    pub async fn restore(device: DeviceStorage) -> Self {
        let cached: Option<SessionUser> = device.get(SESSION_CACHE_KEY).await;
        if let Some(user) = &cached {
            info!(uid = %user.id, "restored cached session");
        }
        Self {
            current: RwLock::new(cached),
            device,
        }
    }

    pub fn current(&self) -> Option<SessionUser> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Records a provider state change and refreshes the device cache.
    pub async fn apply(&self, auth: Option<&AuthUser>) -> Option<SessionUser> {
        let user = auth.map(session_user);
        {
            let mut guard = match self.current.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = user.clone();
        }
        let cached = match &user {
            Some(user) => self.device.set(SESSION_CACHE_KEY, user).await,
            None => self.device.remove(SESSION_CACHE_KEY).await,
        };
        if let Err(err) = cached {
            warn!("failed to update session cache: {err}");
        }
        user
    }
}

pub fn session_user(auth: &AuthUser) -> SessionUser {
    let name = auth
        .display_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| {
            auth.email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_owned()
        });
    SessionUser {
        id: auth.uid.clone(),
        email: auth.email.clone(),
        name,
        photo_url: auth.photo_url.clone(),
    }
}
