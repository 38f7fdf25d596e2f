use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{KeyValueStore, KvError};

/// In-process store with lazy expiry: stale entries are dropped when read.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .map_err(|_| KvError::Poisoned)?
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut entries = self.entries.lock().map_err(|_| KvError::Poisoned)?;
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> Result<bool, KvError> {
        let mut entries = self.entries.lock().map_err(|_| KvError::Poisoned)?;
        Ok(match entries.remove(key) {
            Some((_, expires_at)) => expires_at > Instant::now(),
            None => false,
        })
    }
}
