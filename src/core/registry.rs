// File: src/core/registry.rs
use crate::core::model::FastText;
use crate::error::{FastTextError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Name-keyed table of loaded models.
///
/// Models are fully built before they are handed over, and the lock is only
/// held to clone or swap an `Arc`, so a reader sees either the complete old
/// model or the complete new one. Queries already holding the old `Arc`
/// finish on it; it is dropped when the last of them returns.
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<FastText>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `model` under `name`, returning the model it replaced.
    pub fn register(&self, name: impl Into<String>, model: FastText) -> Option<Arc<FastText>> {
        self.register_shared(name, Arc::new(model))
    }

    pub fn register_shared(&self, name: impl Into<String>, model: Arc<FastText>) -> Option<Arc<FastText>> {
        let name = name.into();
        let previous = self.models.write().insert(name.clone(), model);
        if previous.is_some() {
            tracing::warn!(model = %name, "replaced previously registered model");
        }
        previous
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<FastText>> {
        self.models
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FastTextError::ModelNotFound(name.to_string()))
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<FastText>> {
        self.models.write().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.read().contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}
