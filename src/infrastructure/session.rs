use crate::domain::ports::{SessionStore, SessionStoreBox, StoredSession};
use crate::domain::user::{AuthResponse, User};
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// The authenticated context every request runs under.
///
/// Cheap to clone; clones share the same credentials. `begin` is called at
/// login or registration and `end` at logout. Both keep the backing
/// [`SessionStore`] in step with memory.
#[derive(Clone)]
pub struct Session {
    current: Arc<RwLock<Option<StoredSession>>>,
    store: Arc<dyn SessionStore>,
}

impl Session {
    /// Starts from whatever the store has persisted.
    pub async fn restore(store: SessionStoreBox) -> Result<Self> {
        let store: Arc<dyn SessionStore> = Arc::from(store);
        let current = store.load().await?;
        if let Some(session) = &current {
            debug!(
                user = session.user.as_ref().map(|u| u.email.as_str()),
                "restored session"
            );
        }
        Ok(Self {
            current: Arc::new(RwLock::new(current)),
            store,
        })
    }

    pub async fn begin(&self, auth: &AuthResponse) -> Result<()> {
        let session = StoredSession {
            token: auth.token.clone(),
            user: Some(auth.user.clone()),
        };
        self.store.save(&session).await?;
        *self.current.write().await = Some(session);
        info!(user = %auth.user.email, "session started");
        Ok(())
    }

    pub async fn end(&self) -> Result<()> {
        *self.current.write().await = None;
        self.store.clear().await?;
        info!("session ended");
        Ok(())
    }

    pub async fn token(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|s| s.token.clone())
    }

    pub async fn user(&self) -> Option<User> {
        self.current
            .read()
            .await
            .as_ref()
            .and_then(|s| s.user.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Replaces the cached user after a profile fetch.
    pub async fn update_user(&self, user: User) -> Result<()> {
        let mut current = self.current.write().await;
        if let Some(session) = current.as_mut() {
            session.user = Some(user);
            self.store.save(session).await?;
        }
        Ok(())
    }
}
