use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};

use crate::media::MediaKind;

use super::backend::DetectorBackend;

/// Registry of detector backends, keyed by backend name.
///
/// Backends are wrapped in `Mutex` because detection takes `&mut self`.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<Mutex<dyn DetectorBackend>>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Warm a backend up, then register it. A backend that fails to warm
    /// up is not registered.
    pub fn register_warmed<B: DetectorBackend + 'static>(&mut self, mut backend: B) -> Result<()> {
        backend
            .warm_up()
            .with_context(|| format!("backend '{}' failed to warm up", backend.name()))?;
        self.register(backend);
        Ok(())
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.backends.get(name).cloned()
    }

    pub fn default_backend(&self) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Registered backend names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Select a backend able to process `kind`, preferring the default.
    pub fn backend_for(&self, kind: MediaKind) -> Result<Arc<Mutex<dyn DetectorBackend>>> {
        if let Some(default_backend) = self.default_backend() {
            let supports = {
                let guard = default_backend
                    .lock()
                    .map_err(|_| anyhow!("default backend lock poisoned"))?;
                guard.supports(kind)
            };
            if supports {
                return Ok(default_backend);
            }
        }

        for name in self.list() {
            let Some(backend) = self.get(&name) else {
                continue;
            };
            let supports = {
                let guard = backend
                    .lock()
                    .map_err(|_| anyhow!("backend lock poisoned"))?;
                guard.supports(kind)
            };
            if supports {
                return Ok(backend);
            }
        }

        Err(anyhow!("no registered backend supports {} input", kind))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
