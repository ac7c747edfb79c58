//! Process-wide cache of annotation element defaults.
//!
//! Entries are keyed by (interface name, module token). The token stands in
//! for the identity of the loaded module version: when the embedder reloads
//! a module it invalidates that token's entries explicitly.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::classpath::{AnnotationInterface, DefaultsSource, TypeLookup};
use crate::codec;
use crate::error::ReaderError;
use crate::value::AnnotationValue;

/// Opaque identity of one loaded module version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleToken(u64);

impl ModuleToken {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

type RegistryKey = (String, ModuleToken);

static GLOBAL: Lazy<DefaultsRegistry> = Lazy::new(DefaultsRegistry::new);

/// Defaults per (interface, module). Each entry holds only the elements that
/// declare a default and is never mutated once inserted.
#[derive(Debug, Default)]
pub struct DefaultsRegistry {
    entries: RwLock<HashMap<RegistryKey, Arc<AnnotationValue>>>,
}

impl DefaultsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> &'static DefaultsRegistry {
        &GLOBAL
    }

    pub fn get(&self, interface: &str, module: ModuleToken) -> Option<Arc<AnnotationValue>> {
        self.read()
            .get(&(interface.to_string(), module))
            .cloned()
    }

    /// Return the cached entry, computing it on a miss. `compute` runs
    /// outside the lock; when two callers race, the first insert wins and
    /// both observe that entry.
    pub fn get_or_populate<E, F>(
        &self,
        interface: &str,
        module: ModuleToken,
        compute: F,
    ) -> Result<Arc<AnnotationValue>, E>
    where
        F: FnOnce() -> Result<AnnotationValue, E>,
    {
        if let Some(entry) = self.get(interface, module) {
            return Ok(entry);
        }
        let computed = Arc::new(compute()?);
        let mut entries = self.write();
        let entry = entries
            .entry((interface.to_string(), module))
            .or_insert_with(|| {
                debug!(
                    interface,
                    module = module.id(),
                    elements = computed.len(),
                    "cached annotation defaults"
                );
                Arc::clone(&computed)
            });
        Ok(Arc::clone(entry))
    }

    /// Drop the entry for one interface. Returns whether it was present.
    pub fn invalidate(&self, interface: &str, module: ModuleToken) -> bool {
        self.write()
            .remove(&(interface.to_string(), module))
            .is_some()
    }

    /// Drop every entry of a reloaded module. Returns the number removed.
    pub fn invalidate_module(&self, module: ModuleToken) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|(_, token), _| *token != module);
        let removed = before - entries.len();
        debug!(module = module.id(), removed, "invalidated module defaults");
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<RegistryKey, Arc<AnnotationValue>>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("defaults registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<RegistryKey, Arc<AnnotationValue>>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("defaults registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Everything resolution and decoding need to load types and defaults for
/// one module.
#[derive(Clone, Copy)]
pub struct LoaderContext<'a> {
    types: &'a dyn TypeLookup,
    defaults: &'a dyn DefaultsSource,
    registry: &'a DefaultsRegistry,
    module: ModuleToken,
}

impl<'a> LoaderContext<'a> {
    pub fn new<S>(source: &'a S, registry: &'a DefaultsRegistry, module: ModuleToken) -> Self
    where
        S: TypeLookup + DefaultsSource,
    {
        Self::with_sources(source, source, registry, module)
    }

    pub fn with_sources(
        types: &'a dyn TypeLookup,
        defaults: &'a dyn DefaultsSource,
        registry: &'a DefaultsRegistry,
        module: ModuleToken,
    ) -> Self {
        Self {
            types,
            defaults,
            registry,
            module,
        }
    }

    pub fn types(&self) -> &'a dyn TypeLookup {
        self.types
    }

    pub fn module(&self) -> ModuleToken {
        self.module
    }

    pub fn registry(&self) -> &'a DefaultsRegistry {
        self.registry
    }

    /// Defaulted elements of `interface`, populated lazily from the
    /// default-value attributes on first use.
    pub fn defaults_for(
        &self,
        interface: &AnnotationInterface,
    ) -> Result<Arc<AnnotationValue>, ReaderError> {
        self.registry
            .get_or_populate(&interface.name, self.module, || self.load_defaults(interface))
    }

    fn load_defaults(&self, interface: &AnnotationInterface) -> Result<AnnotationValue, ReaderError> {
        let mut defaults = AnnotationValue::new(interface.name.clone());
        for element in &interface.elements {
            let Some(bytes) = self.defaults.default_value(&interface.name, &element.name) else {
                continue;
            };
            let value = codec::decode_value(&bytes, self).map_err(|err| {
                ReaderError::InvalidDefault {
                    interface: interface.name.clone(),
                    element: element.name.clone(),
                    reason: err.to_string(),
                }
            })?;
            if !value.conforms_to(&element.ty) {
                return Err(ReaderError::TypeMismatch {
                    interface: interface.name.clone(),
                    element: element.name.clone(),
                    expected: element.ty.to_string(),
                    found: value.kind_name(),
                });
            }
            defaults.insert(element.name.clone(), value);
        }
        Ok(defaults)
    }
}
