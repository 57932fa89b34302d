use crate::error::StoreError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Key/value persistence for recovery-only cold-start rehydration. Live
/// reads always go through the in-memory room actor; the store is
/// write-through and best-effort.
pub trait StoreAdapter: Send + Sync {
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl StoreAdapter for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.inner.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

impl StoreAdapter for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }
}

/// Either backend behind one handle, chosen at startup. `store_url` unset or
/// `memory://` selects memory; any other URL attempts Redis, falling back
/// to memory with a logged warning if the connection fails.
#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Redis(RedisStore),
}

impl Store {
    pub async fn connect(store_url: Option<&str>) -> Self {
        match store_url {
            None | Some("memory://") => Store::Memory(MemoryStore::default()),
            Some(url) => match RedisStore::connect(url).await {
                Ok(store) => Store::Redis(store),
                Err(err) => {
                    warn!(%err, "store adapter: failed to connect to redis, falling back to memory");
                    Store::Memory(MemoryStore::default())
                }
            },
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self {
            Store::Memory(s) => s.get(key).await,
            Store::Redis(s) => s.get(key).await,
        }
    }

    pub async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        match self {
            Store::Memory(s) => s.set(key, value).await,
            Store::Redis(s) => s.set(key, value).await,
        }
    }
}

pub fn room_key(room_id: &str) -> String {
    format!("room:{room_id}")
}
