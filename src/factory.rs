//! Template holder and resource factory

use crate::backend::Backend;
use crate::errors::PoolResult;
use crate::guard::Slot;

use std::sync::atomic::{AtomicU64, Ordering};

/// Owns the compiled template and the configuration every instance is built with.
pub(crate) struct Factory<B: Backend> {
    backend: B,
    template: B::Template,
    config: B::Config,
    next_id: AtomicU64,
}

impl<B: Backend> Factory<B> {
    /// Compile `bytes` once. The template is never mutated afterwards.
    pub fn new(backend: B, bytes: &[u8], config: B::Config) -> PoolResult<Self> {
        let template = backend.compile(bytes)?;
        Ok(Self {
            backend,
            template,
            config,
            next_id: AtomicU64::new(0),
        })
    }

    pub fn template(&self) -> &B::Template {
        &self.template
    }

    /// Instantiate a fresh resource.
    pub fn create(&self) -> PoolResult<Slot<B::Resource>> {
        let resource = self.backend.instantiate(&self.template, &self.config)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(instance_id = id, "instantiated pooled instance");
        Ok(Slot::new(id, resource))
    }
}
