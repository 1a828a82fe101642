//! Local-placeholder to server id reconciliation.

use std::collections::HashMap;
use std::sync::RwLock;

/// Maps locally-generated placeholder ids to their server-assigned ids.
///
/// Create-type mutations are enqueued against an id minted on the device;
/// once the server confirms the create, every queued successor that still
/// references the placeholder must be rewritten before dispatch. The map is
/// persisted through the mutation store and this cache is warmed from it at
/// startup, so reconciliation survives restarts.
pub struct IdReconciler {
    mappings: RwLock<HashMap<String, String>>,
}

impl IdReconciler {
    pub fn new() -> Self {
        Self {
            mappings: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the cache from persisted mappings at startup.
    pub fn warm(&self, mappings: impl IntoIterator<Item = (String, String)>) {
        let mut guard = self.mappings.write().unwrap();
        for (local_id, server_id) in mappings {
            guard.insert(local_id, server_id);
        }
    }

    pub fn record(&self, local_id: impl Into<String>, server_id: impl Into<String>) {
        self.mappings
            .write()
            .unwrap()
            .insert(local_id.into(), server_id.into());
    }

    /// Server id for `local_id`, if the create has been confirmed.
    pub fn lookup(&self, local_id: &str) -> Option<String> {
        self.mappings.read().unwrap().get(local_id).cloned()
    }

    /// Resolve an entity id for dispatch: the server id when a mapping
    /// exists, otherwise the id unchanged.
    pub fn resolve<'a>(&self, entity_id: &'a str) -> std::borrow::Cow<'a, str> {
        match self.lookup(entity_id) {
            Some(server_id) => std::borrow::Cow::Owned(server_id),
            None => std::borrow::Cow::Borrowed(entity_id),
        }
    }

    pub fn len(&self) -> usize {
        self.mappings.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.read().unwrap().is_empty()
    }
}

impl Default for IdReconciler {
    fn default() -> Self {
        Self::new()
    }
}
