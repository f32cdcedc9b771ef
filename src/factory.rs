//! Method factory: builds indexes by algorithm name.
//!
//! The process-wide registry is populated exactly once, either lazily with
//! the built-in methods on first use of [`global`] or explicitly through
//! [`init_global`]. It is read-only afterwards, so concurrent
//! [`MethodRegistry::create`] calls need no locking.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::index::Index;
use crate::object::Dataset;
use crate::params::{ParamManager, Params};
use crate::space::Space;
use crate::{permutation, seq_search, small_world, vptree};

/// Builds an index from a space, a dataset and its parameters.
///
/// The constructor reads every parameter it understands from the manager,
/// including query-time ones; the registry rejects whatever is left over.
pub type MethodConstructor =
    fn(Arc<dyn Space>, Arc<Dataset>, &mut ParamManager<'_>) -> Result<Box<dyn Index>>;

/// Maps method names to constructors.
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    constructors: BTreeMap<String, MethodConstructor>,
}

impl MethodRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every method shipped with the crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let builtin: [(&str, MethodConstructor); 4] = [
            (seq_search::METHOD_NAME, seq_search::SeqSearch::create),
            (vptree::METHOD_NAME, vptree::VpTree::create),
            (small_world::METHOD_NAME, small_world::SmallWorldRand::create),
            (permutation::METHOD_NAME, permutation::PermutationIncSort::create),
        ];
        for (name, ctor) in builtin {
            registry.constructors.insert(name.to_string(), ctor);
        }
        registry
    }

    /// Register a constructor under `name`.
    ///
    /// Registering the same constructor twice is a no-op; a different
    /// constructor under an existing name is an error.
    pub fn register(&mut self, name: impl Into<String>, ctor: MethodConstructor) -> Result<()> {
        let name = name.into();
        match self.constructors.get(&name) {
            Some(existing) if *existing as usize == ctor as usize => Ok(()),
            Some(_) => Err(SearchError::DuplicateMethod { name }),
            None => {
                debug!(method = %name, "registered method");
                self.constructors.insert(name, ctor);
                Ok(())
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered method names in sorted order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Build the index called `name`.
    ///
    /// Fails on an unknown name, on invalid parameter values and on
    /// parameters the method does not recognize. No index is returned on
    /// failure.
    pub fn create(
        &self,
        name: &str,
        space: Arc<dyn Space>,
        dataset: Arc<Dataset>,
        params: &Params,
    ) -> Result<Box<dyn Index>> {
        let ctor = self
            .constructors
            .get(name)
            .ok_or_else(|| SearchError::UnknownMethod {
                name: name.to_string(),
            })?;

        info!(
            method = name,
            space = space.name(),
            objects = dataset.len(),
            params = %params,
            "creating index"
        );

        let mut manager = ParamManager::new(params);
        let index = ctor(space, dataset, &mut manager)?;
        manager.check_unused()?;
        Ok(index)
    }
}

static GLOBAL_REGISTRY: OnceLock<MethodRegistry> = OnceLock::new();

/// The process-wide registry, initialized with the built-in methods on
/// first use unless [`init_global`] ran before.
pub fn global() -> &'static MethodRegistry {
    GLOBAL_REGISTRY.get_or_init(MethodRegistry::with_builtin)
}

/// Install a custom process-wide registry.
///
/// Must run before the first call to [`global`]; fails otherwise.
pub fn init_global(registry: MethodRegistry) -> Result<()> {
    GLOBAL_REGISTRY
        .set(registry)
        .map_err(|_| SearchError::IndexError("method registry is already initialized".to_string()))
}

/// Build an index through the process-wide registry.
pub fn create_method(
    name: &str,
    space: Arc<dyn Space>,
    dataset: Arc<Dataset>,
    params: &Params,
) -> Result<Box<dyn Index>> {
    global().create(name, space, dataset, params)
}
