use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::{KeyValueStore, StorageKey};
use crate::models::{LoginResponse, UserProfile};

/// Record stored under the `user` key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn from_login(login: &LoginResponse) -> Self {
        Self {
            token: Some(login.token.clone()),
            user: Some(login.user.clone()),
            created_at: Utc::now(),
        }
    }
}

/// Credentials attached to one outgoing request.
///
/// Loaded fresh from storage for every request; never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
    pub company_id: Option<String>,
}

/// Session accessor over the persisted store.
///
/// Holds no session state of its own: storage is the source of truth, so a
/// logout or re-login made elsewhere is seen by the very next request.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyValueStore>,
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read a key, treating storage failures as absent
    async fn read(&self, key: StorageKey) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "Failed to read session storage");
                None
            }
        }
    }

    /// Load the stored session record, if any
    pub async fn load(&self) -> Option<SessionData> {
        let raw = self.read(StorageKey::User).await?;
        match serde_json::from_str::<SessionData>(&raw) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(error = %e, "Failed to parse stored session");
                None
            }
        }
    }

    /// Token and tenant id for the next request. Two independent reads;
    /// either may be missing.
    pub async fn credentials(&self) -> Credentials {
        let token = self
            .load()
            .await
            .and_then(|data| data.token)
            .filter(|t| !t.is_empty());
        let company_id = self.read(StorageKey::CompanyId).await;
        Credentials { token, company_id }
    }

    pub async fn uid(&self) -> Option<String> {
        self.read(StorageKey::Uid).await
    }

    pub async fn id_token(&self) -> Option<String> {
        self.read(StorageKey::IdToken).await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.credentials().await.token.is_some()
    }

    /// Persist a successful login
    pub async fn save_login(&self, login: &LoginResponse) -> Result<()> {
        let data = SessionData::from_login(login);
        let contents = serde_json::to_string(&data)?;
        self.store
            .set(StorageKey::User, &contents)
            .await
            .context("Failed to save session")?;
        self.store.set(StorageKey::Token, &login.token).await?;
        self.store.set(StorageKey::Uid, &login.user.uid).await?;

        for (key, value) in [
            (StorageKey::CompanyId, &login.user.company_id),
            (StorageKey::IdToken, &login.user.id_token),
        ] {
            match value {
                Some(value) => self.store.set(key, value).await?,
                None => self.store.remove(key).await?,
            }
        }

        debug!(uid = %login.user.uid, "Session saved");
        Ok(())
    }

    /// Delete every session key. Keeps going past individual failures and
    /// reports the first one.
    pub async fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for key in StorageKey::ALL {
            if let Err(e) = self.store.remove(key).await {
                warn!(key = key.as_str(), error = %e, "Failed to remove session key");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.context("Failed to clear session")),
            None => {
                debug!("Session cleared");
                Ok(())
            }
        }
    }
}
