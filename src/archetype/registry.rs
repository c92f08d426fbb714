//! Name → archetype lookup, plus dependency-ordered loading of extension
//! archetypes.

use super::{Archetype, BigDoor, Drawbridge, Portcullis, SlidingDoor};
use crate::error::{GeometryError, RegistryError};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

/// An archetype shipped outside the core, possibly building on others.
pub struct ArchetypeExtension {
    pub archetype: Arc<dyn Archetype>,
    /// Names of extensions (or already registered archetypes) that must be
    /// loaded first.
    pub depends_on: Vec<String>,
}

impl ArchetypeExtension {
    pub fn new(archetype: Arc<dyn Archetype>) -> Self {
        Self {
            archetype,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }
}

pub struct ArchetypeRegistry {
    archetypes: HashMap<String, Arc<dyn Archetype>>,
}

impl ArchetypeRegistry {
    pub fn new() -> Self {
        Self {
            archetypes: HashMap::new(),
        }
    }

    /// Registry preloaded with the four core archetypes.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let builtin: [Arc<dyn Archetype>; 4] = [
            Arc::new(BigDoor),
            Arc::new(Drawbridge),
            Arc::new(SlidingDoor),
            Arc::new(Portcullis),
        ];
        for archetype in builtin {
            registry
                .archetypes
                .insert(archetype.name().to_string(), archetype);
        }
        registry
    }

    pub fn register(&mut self, archetype: Arc<dyn Archetype>) -> Result<(), RegistryError> {
        let name = archetype.name().to_string();
        if self.archetypes.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        debug!("Registered archetype '{}'", name);
        self.archetypes.insert(name, archetype);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Archetype>, GeometryError> {
        self.archetypes
            .get(name)
            .cloned()
            .ok_or_else(|| GeometryError::UnsupportedArchetype(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.archetypes.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.archetypes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Register a batch of extensions in dependency order.
    ///
    /// Either every extension is registered or none is. Returns the load
    /// order on success.
    pub fn register_extensions(
        &mut self,
        extensions: Vec<ArchetypeExtension>,
    ) -> Result<Vec<String>, RegistryError> {
        let order = self.load_order(&extensions)?;

        let mut by_name: HashMap<String, ArchetypeExtension> = extensions
            .into_iter()
            .map(|e| (e.archetype.name().to_string(), e))
            .collect();
        for name in &order {
            if let Some(ext) = by_name.remove(name) {
                self.archetypes.insert(name.clone(), ext.archetype);
            }
        }

        info!("Loaded {} archetype extension(s): {:?}", order.len(), order);
        Ok(order)
    }

    /// Kahn's algorithm over the extension dependency graph. Dependencies on
    /// archetypes already in the registry count as satisfied.
    fn load_order(&self, extensions: &[ArchetypeExtension]) -> Result<Vec<String>, RegistryError> {
        // BTreeMap keeps the order deterministic among independent extensions.
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for ext in extensions {
            let name = ext.archetype.name();
            if self.archetypes.contains_key(name) || in_degree.contains_key(name) {
                return Err(RegistryError::Duplicate(name.to_string()));
            }
            in_degree.insert(name, 0);
        }

        for ext in extensions {
            let name = ext.archetype.name();
            for dep in &ext.depends_on {
                if in_degree.contains_key(dep.as_str()) {
                    *in_degree.entry(name).or_default() += 1;
                    dependents.entry(dep.as_str()).or_default().push(name);
                } else if !self.archetypes.contains_key(dep) {
                    return Err(RegistryError::MissingDependency {
                        extension: name.to_string(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let mut ready: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(extensions.len());

        while let Some(name) = ready.pop_front() {
            order.push(name.to_string());
            for dependent in dependents.get(name).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push_back(*dependent);
                    }
                }
            }
        }

        if order.len() != extensions.len() {
            let stuck: Vec<String> = in_degree
                .into_iter()
                .filter(|(_, deg)| *deg > 0)
                .map(|(name, _)| name.to_string())
                .collect();
            return Err(RegistryError::DependencyCycle(stuck));
        }

        Ok(order)
    }
}

impl Default for ArchetypeRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
