use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::auth::storage::{KeyValueStore, MemoryStore};

/// Key the session token is persisted under
pub const TOKEN_STORAGE_KEY: &str = "vt_access_token";

/// Holder of the current bearer token.
///
/// Keeps an in-memory cache in front of a [`KeyValueStore`]. Operations are
/// serialized by a single async mutex so `set`, `get` and `clear` never
/// interleave. None of them fail: if durable storage errors once, the store
/// logs a warning and keeps working from memory for the rest of its life.
/// Removal is still attempted after that, so a token written before the
/// failure cannot outlive a later `clear`.
pub struct TokenStore {
    cached: Mutex<Option<String>>,
    storage: Arc<dyn KeyValueStore>,
    durable: AtomicBool,
}

impl TokenStore {
    /// Create a token store backed by the given durable storage
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            cached: Mutex::new(None),
            storage,
            durable: AtomicBool::new(true),
        }
    }

    /// Create a token store that never touches disk
    pub fn memory_only() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Store `token` as the current session credential
    pub async fn set(&self, token: impl Into<String>) {
        let token = token.into();
        let mut cached = self.cached.lock().await;

        let saved = if self.is_durable() {
            match self.storage.save(TOKEN_STORAGE_KEY, &token).await {
                Ok(()) => true,
                Err(e) => {
                    self.degrade(&e);
                    false
                }
            }
        } else {
            false
        };

        // Durable storage must never hold a token older than the cached one
        if !saved {
            self.remove_stored().await;
        }

        *cached = Some(token);
        debug!("Session token stored");
    }

    /// Current token, consulting durable storage when the cache is empty
    pub async fn get(&self) -> Option<String> {
        let mut cached = self.cached.lock().await;
        if cached.is_some() {
            return cached.clone();
        }

        if !self.is_durable() {
            return None;
        }

        match self.storage.load(TOKEN_STORAGE_KEY).await {
            Ok(stored) => {
                if stored.is_some() {
                    debug!("Session token restored from durable storage");
                }
                *cached = stored.clone();
                stored
            }
            Err(e) => {
                self.degrade(&e);
                None
            }
        }
    }

    /// Remove the token from memory and durable storage
    pub async fn clear(&self) {
        let mut cached = self.cached.lock().await;
        *cached = None;

        self.remove_stored().await;
        debug!("Session token cleared");
    }

    /// Whether a token is currently present
    pub async fn is_authenticated(&self) -> bool {
        self.get().await.is_some_and(|token| !token.is_empty())
    }

    /// False once durable storage has failed and the store went memory-only
    pub fn is_durable(&self) -> bool {
        self.durable.load(Ordering::SeqCst)
    }

    /// Best-effort removal from durable storage, attempted even when degraded
    async fn remove_stored(&self) {
        if let Err(e) = self.storage.remove(TOKEN_STORAGE_KEY).await {
            if self.is_durable() {
                self.degrade(&e);
            } else {
                debug!(error = %e, "Could not remove stored session token");
            }
        }
    }

    fn degrade(&self, error: &anyhow::Error) {
        if self.durable.swap(false, Ordering::SeqCst) {
            warn!(error = %error, "Durable token storage unavailable, continuing in memory only");
        }
    }
}
