//! Seams between the pool and the engine that compiles and instantiates templates

use crate::errors::PoolResult;

/// A pooled execution context.
pub trait Resource: Send + 'static {
    /// Release everything the resource holds. Called at most once per resource.
    ///
    /// Must not panic; failures are swallowed because there may be no caller
    /// left to report them to.
    fn dispose(self)
    where
        Self: Sized,
    {
    }
}

/// Compiles raw program bytes into a template and instantiates resources from it.
pub trait Backend: Send + Sync + 'static {
    /// Immutable compiled program shared by every resource.
    type Template: Send + Sync + 'static;

    /// Immutable settings applied to every instantiation.
    type Config: Send + Sync + 'static;

    type Resource: Resource;

    fn compile(&self, bytes: &[u8]) -> PoolResult<Self::Template>;

    fn instantiate(
        &self,
        template: &Self::Template,
        config: &Self::Config,
    ) -> PoolResult<Self::Resource>;
}
