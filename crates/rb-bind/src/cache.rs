//! Memoized model descriptors.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use restbind_client::Result;
use tracing::debug;

use crate::classify::ModelDescriptor;
use crate::model::Model;
use crate::profile::Owner;

type Entry = Arc<dyn Any + Send + Sync>;

/// Descriptors keyed by `(profile type, model type)`.
///
/// Entries are never evicted. Classification runs outside the lock; when two
/// callers race on the same key the first stored descriptor is kept and
/// shared.
#[derive(Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<(TypeId, TypeId), Entry>>,
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("entries", &self.len())
            .finish()
    }
}

impl MetadataCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor of `M` for `owner`, classifying on first use.
    pub fn descriptor<M: Model>(&self, owner: &Owner) -> Result<Arc<ModelDescriptor<M>>> {
        let key = (owner.type_id, TypeId::of::<M>());

        let cached = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(entry) = cached {
            if let Ok(descriptor) = entry.downcast::<ModelDescriptor<M>>() {
                return Ok(descriptor);
            }
        }

        let computed: Entry = Arc::new(ModelDescriptor::<M>::classify(owner)?);
        debug!(
            profile = owner.name,
            model = std::any::type_name::<M>(),
            "Classified model"
        );

        let stored = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(computed)
            .clone();
        stored.downcast::<ModelDescriptor<M>>().map_err(|_| {
            restbind_client::Error::config(format!(
                "metadata cache holds a foreign entry for {}",
                std::any::type_name::<M>()
            ))
        })
    }

    /// Number of cached descriptors.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if nothing was classified yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
