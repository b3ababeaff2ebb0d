use std::sync::Arc;

use crate::domain::{chain::Chain, error::RuntimeError};

/// Lookup of immutable chains by name
///
/// Registries are assembled once before processing starts and are then
/// shared read-only by every processor.
pub trait ChainRegistry: Send + Sync {
    /// Resolve a chain, failing with [`RuntimeError::ChainNotFound`]
    fn resolve(&self, name: &str) -> Result<Arc<Chain>, RuntimeError>;

    /// Names of all registered chains, sorted
    fn names(&self) -> Vec<String>;
}
