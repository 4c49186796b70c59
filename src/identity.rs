//! Identity provider seam and an in-process provider for local use and tests.

use crate::errors::AuthError;
use crate::validation::{MIN_PASSWORD_LEN, is_valid_email};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_FAILED_ATTEMPTS: u32 = 5;
pub const SUPPORTED_FEDERATED_PROVIDERS: &[&str] = &["google"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub email_verified: bool,
}

/// What a federated sign-in hands back once the user finishes the provider flow.
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    pub provider: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Verification(String),
    PasswordReset(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates an account, signs it in, and sends a verification notice.
    async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthUser, AuthError>;

    async fn login(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    async fn federated_login(&self, profile: FederatedProfile) -> Result<AuthUser, AuthError>;

    async fn logout(&self) -> Result<(), AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// Auth state changes; holds the signed-in user or `None`.
    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>>;
}

struct Account {
    user: AuthUser,
    password: Option<String>,
    disabled: bool,
    failed_attempts: u32,
}

/// In-process identity provider. Accounts live for the lifetime of the process.
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    notices: Mutex<Vec<Notice>>,
    state: watch::Sender<Option<AuthUser>>,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentity {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            notices: Mutex::new(Vec::new()),
            state,
        }
    }

    pub fn current(&self) -> Option<AuthUser> {
        self.state.borrow().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn set_disabled(&self, email: &str, disabled: bool) -> Result<(), AuthError> {
        let mut accounts = self.lock_accounts()?;
        let account = accounts
            .get_mut(&normalize(email))
            .ok_or(AuthError::UserNotFound)?;
        account.disabled = disabled;
        Ok(())
    }

    fn lock_accounts(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Account>>, AuthError> {
        self.accounts
            .lock()
            .map_err(|err| AuthError::Provider(err.to_string()))
    }

    fn notify(&self, notice: Notice) {
        match self.notices.lock() {
            Ok(mut notices) => notices.push(notice),
            Err(err) => warn!("dropping notice: {err}"),
        }
    }

    fn sign_in(&self, user: AuthUser) -> AuthUser {
        self.state.send_replace(Some(user.clone()));
        user
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthUser, AuthError> {
        let key = normalize(email);
        if !is_valid_email(&key) {
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        let user = {
            let mut accounts = self.lock_accounts()?;
            if accounts.contains_key(&key) {
                return Err(AuthError::EmailAlreadyInUse);
            }
            let user = AuthUser {
                uid: Uuid::new_v4().simple().to_string(),
                email: key.clone(),
                display_name: display_name
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned),
                photo_url: None,
                email_verified: false,
            };
            accounts.insert(
                key.clone(),
                Account {
                    user: user.clone(),
                    password: Some(password.to_owned()),
                    disabled: false,
                    failed_attempts: 0,
                },
            );
            user
        };
        self.notify(Notice::Verification(key));
        info!(uid = %user.uid, "registered account");
        Ok(self.sign_in(user))
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let key = normalize(email);
        if !is_valid_email(&key) {
            return Err(AuthError::InvalidEmail);
        }
        let user = {
            let mut accounts = self.lock_accounts()?;
            let account = accounts.get_mut(&key).ok_or(AuthError::UserNotFound)?;
            if account.disabled {
                return Err(AuthError::UserDisabled);
            }
            if account.failed_attempts >= MAX_FAILED_ATTEMPTS {
                return Err(AuthError::TooManyRequests);
            }
            if account.password.as_deref() != Some(password) {
                account.failed_attempts += 1;
                return Err(AuthError::WrongPassword);
            }
            account.failed_attempts = 0;
            account.user.clone()
        };
        info!(uid = %user.uid, "signed in");
        Ok(self.sign_in(user))
    }

    async fn federated_login(&self, profile: FederatedProfile) -> Result<AuthUser, AuthError> {
        if profile.cancelled {
            return Err(AuthError::PopupClosedByUser);
        }
        if !SUPPORTED_FEDERATED_PROVIDERS.contains(&profile.provider.as_str()) {
            return Err(AuthError::OperationNotAllowed);
        }
        let key = normalize(&profile.email);
        if !is_valid_email(&key) {
            return Err(AuthError::InvalidEmail);
        }
        let user = {
            let mut accounts = self.lock_accounts()?;
            let account = accounts.entry(key.clone()).or_insert_with(|| Account {
                user: AuthUser {
                    uid: Uuid::new_v4().simple().to_string(),
                    email: key.clone(),
                    display_name: None,
                    photo_url: None,
                    email_verified: true,
                },
                password: None,
                disabled: false,
                failed_attempts: 0,
            });
            if account.disabled {
                return Err(AuthError::UserDisabled);
            }
            if profile.display_name.is_some() {
                account.user.display_name = profile.display_name;
            }
            if profile.photo_url.is_some() {
                account.user.photo_url = profile.photo_url;
            }
            account.user.email_verified = true;
            account.user.clone()
        };
        info!(uid = %user.uid, provider = %profile.provider, "federated sign-in");
        Ok(self.sign_in(user))
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.state.send_replace(None);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let key = normalize(email);
        if !is_valid_email(&key) {
            return Err(AuthError::InvalidEmail);
        }
        if !self.lock_accounts()?.contains_key(&key) {
            return Err(AuthError::UserNotFound);
        }
        self.notify(Notice::PasswordReset(key));
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_signs_in_and_sends_verification() {
        let identity = MemoryIdentity::new();
        let mut rx = identity.subscribe();
        let user = identity.register("Sam@Example.com", "secret1", Some("Sam")).await.unwrap();
        assert_eq!(user.email, "sam@example.com");
        assert_eq!(user.display_name.as_deref(), Some("Sam"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref(), Some(&user));
        assert_eq!(identity.notices(), vec![Notice::Verification("sam@example.com".into())]);
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_weak_passwords() {
        let identity = MemoryIdentity::new();
        identity.register("a@b.co", "secret1", None).await.unwrap();
        assert_eq!(
            identity.register("a@b.co", "secret1", None).await,
            Err(AuthError::EmailAlreadyInUse)
        );
        assert_eq!(identity.register("c@b.co", "123", None).await, Err(AuthError::WeakPassword));
        assert_eq!(identity.register("nope", "secret1", None).await, Err(AuthError::InvalidEmail));
    }

    #[tokio::test]
    async fn login_errors_follow_provider_codes() {
        let identity = MemoryIdentity::new();
        identity.register("a@b.co", "secret1", None).await.unwrap();
        identity.logout().await.unwrap();

        assert_eq!(identity.login("x@b.co", "secret1").await, Err(AuthError::UserNotFound));
        assert_eq!(identity.login("a@b.co", "wrong").await, Err(AuthError::WrongPassword));
        assert!(identity.login("a@b.co", "secret1").await.is_ok());

        identity.set_disabled("a@b.co", true).unwrap();
        assert_eq!(identity.login("a@b.co", "secret1").await, Err(AuthError::UserDisabled));
    }

    #[tokio::test]
    async fn repeated_failures_lock_the_account() {
        let identity = MemoryIdentity::new();
        identity.register("a@b.co", "secret1", None).await.unwrap();
        for _ in 0..MAX_FAILED_ATTEMPTS {
            assert_eq!(identity.login("a@b.co", "bad").await, Err(AuthError::WrongPassword));
        }
        assert_eq!(identity.login("a@b.co", "secret1").await, Err(AuthError::TooManyRequests));
    }

    #[tokio::test]
    async fn federated_login_creates_verified_account() {
        let identity = MemoryIdentity::new();
        let profile = FederatedProfile {
            provider: "google".into(),
            email: "g@b.co".into(),
            display_name: Some("Gee".into()),
            photo_url: Some("https://img/g.png".into()),
            cancelled: false,
        };
        let user = identity.federated_login(profile.clone()).await.unwrap();
        assert!(user.email_verified);
        assert_eq!(identity.federated_login(profile).await.unwrap().uid, user.uid);

        let cancelled = FederatedProfile {
            provider: "google".into(),
            email: "g@b.co".into(),
            display_name: None,
            photo_url: None,
            cancelled: true,
        };
        assert_eq!(
            identity.federated_login(cancelled).await,
            Err(AuthError::PopupClosedByUser)
        );
    }

    #[tokio::test]
    async fn password_reset_requires_known_email() {
        let identity = MemoryIdentity::new();
        identity.register("a@b.co", "secret1", None).await.unwrap();
        identity.send_password_reset("a@b.co").await.unwrap();
        assert_eq!(
            identity.send_password_reset("z@b.co").await,
            Err(AuthError::UserNotFound)
        );
        assert!(identity.notices().contains(&Notice::PasswordReset("a@b.co".into())));
    }
}
