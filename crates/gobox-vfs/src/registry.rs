use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;

use crate::backend::BackendKind;
use crate::error::{FsError, Result};
use crate::vfs::{Vfs, VfsConfig};

static GLOBAL: Lazy<Registry> = Lazy::new(|| Registry::new(VfsConfig::default()));

/// Instances keyed by id, created lazily on first open.
#[derive(Debug)]
pub struct Registry {
    config: VfsConfig,
    instances: Mutex<HashMap<String, Vfs>>,
}

impl Registry {
    pub fn new(config: VfsConfig) -> Self {
        Registry {
            config,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide registry with default configuration.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    pub fn open(&self, backend: BackendKind, id: &str) -> Result<Vfs> {
        if !backend.is_implemented() {
            return Err(FsError::UnsupportedBackend(backend.as_str().to_string()));
        }
        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(fs) = instances.get(id) {
            return Ok(fs.clone());
        }
        tracing::debug!(target: "gobox::vfs", backend = %backend, id, "creating instance");
        let fs = Vfs::new(id, &self.config);
        instances.insert(id.to_string(), fs.clone());
        Ok(fs)
    }

    pub fn open_str(&self, backend: &str, id: &str) -> Result<Vfs> {
        self.open(backend.parse()?, id)
    }

    /// Forgets an instance. Handles still held elsewhere keep working but
    /// the next `open` with the same id starts from an empty tree.
    pub fn close(&self, id: &str) -> bool {
        let removed = self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some();
        if removed {
            tracing::debug!(target: "gobox::vfs", id, "closed instance");
        }
        removed
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
