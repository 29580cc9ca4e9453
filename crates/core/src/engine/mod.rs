use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::{
    config::EngineConfig,
    legacy::{self, LegacyMap},
    loader,
    model::{Element, TimbreProfile},
    tables::TableSet,
    Registry, Result,
};

/// Attribute bundle for a resolved mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub mode: String,
    pub family: String,
    pub element: Element,
    pub timbre: TimbreProfile,
}

/// Resolves `query` against `registry`. Cardinality plays no part.
pub fn resolve_in(registry: &Registry, query: &str) -> Result<Resolution> {
    let mode = registry.lookup_mode(query)?;
    let association = registry.association_of(&mode.id)?;
    Ok(Resolution {
        mode: mode.id.clone(),
        family: mode.family_id.clone(),
        element: association.element,
        timbre: association.timbre.clone(),
    })
}

/// Query-facing façade that owns the registry it was built from.
#[derive(Debug, Clone)]
pub struct HarmonicEngine {
    registry: Arc<Registry>,
}

impl HarmonicEngine {
    pub fn new(registry: Registry) -> Self {
        Self::from_shared(Arc::new(registry))
    }

    pub fn from_shared(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Builds an engine over the compiled-in canonical tables.
    pub fn bundled() -> Result<Self> {
        Self::from_tables(&TableSet::bundled()?)
    }

    pub fn from_tables(tables: &TableSet) -> Result<Self> {
        Ok(Self::new(loader::load(tables)?))
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::from_tables(&config.load_tables()?)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn shared_registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn resolve(&self, query: &str) -> Result<Resolution> {
        resolve_in(&self.registry, query)
    }

    /// Legacy-shaped mapping over this engine's registry.
    pub fn load_map(&self) -> LegacyMap {
        legacy::load_map(&self.registry)
    }
}

/// Holds the registry consumers currently read from and lets a freshly
/// loaded one replace it atomically.
#[derive(Debug)]
pub struct SharedEngine {
    current: ArcSwap<Registry>,
    generation: AtomicU64,
}

impl SharedEngine {
    pub fn new(registry: Registry) -> Self {
        Self {
            current: ArcSwap::from_pointee(registry),
            generation: AtomicU64::new(0),
        }
    }

    /// Current registry. The snapshot stays valid after a reload.
    pub fn snapshot(&self) -> Arc<Registry> {
        self.current.load_full()
    }

    pub fn engine(&self) -> HarmonicEngine {
        HarmonicEngine::from_shared(self.snapshot())
    }

    pub fn resolve(&self, query: &str) -> Result<Resolution> {
        resolve_in(&self.current.load(), query)
    }

    /// Number of successful reloads so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Loads `tables` into a new registry and swaps it in. On failure the
    /// previous registry keeps serving.
    pub fn reload(&self, tables: &TableSet) -> Result<u64> {
        match loader::load(tables) {
            Ok(registry) => {
                self.current.store(Arc::new(registry));
                let generation = self
                    .generation
                    .fetch_add(1, Ordering::AcqRel)
                    .saturating_add(1);
                tracing::info!(generation, "mode cosmology reloaded");
                Ok(generation)
            }
            Err(err) => {
                tracing::warn!(error = %err, "reload rejected, keeping current registry");
                Err(err)
            }
        }
    }
}
