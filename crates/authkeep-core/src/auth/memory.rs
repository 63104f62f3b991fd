use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::TokenStore;

/// In-process token storage. Clones share the same slot.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token.to_string()))),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<String>> {
        let slot = self.slot.lock().map_err(|_| anyhow!("Token store lock poisoned"))?;
        Ok(slot.clone())
    }

    fn set(&self, token: &str) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|_| anyhow!("Token store lock poisoned"))?;
        *slot = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|_| anyhow!("Token store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_slot() {
        let store = MemoryTokenStore::new();
        let view = store.clone();

        store.set("T1").unwrap();
        assert_eq!(view.get().unwrap().as_deref(), Some("T1"));

        view.remove().unwrap();
        assert_eq!(store.get().unwrap(), None);
    }
}
