//! Module dependency registry.
//!
//! Arena model: records are keyed by [`ModuleId`], edges are sets of ids.
//! `dependents` holds the reverse edges (dependency -> importers) and is
//! rebuilt from each record's forward set on `register`, so every reverse
//! edge always mirrors some record's `dependencies` entry.

use crate::models::{ComponentInfo, FileKind, ModuleId};
use crate::strategy::accepts_live_update;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    pub module_id: ModuleId,
    pub content_hash: String,
    pub dependencies: HashSet<ModuleId>,
    pub accepts_live_update: bool,
    pub last_update: DateTime<Utc>,
    pub is_component: bool,
    pub component_name: Option<String>,
    pub has_local_state: bool,
    /// Hook/props signature of the component, empty for non-components.
    pub signature: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub total_modules: usize,
    pub hmr_capable_modules: usize,
}

#[derive(Debug, Default)]
pub struct ModuleDependencyRegistry {
    records: HashMap<ModuleId, ModuleRecord>,
    dependents: HashMap<ModuleId, HashSet<ModuleId>>,
}

impl ModuleDependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a module and replace the edges it owns.
    ///
    /// # Arguments
    /// - `module_id`: module being registered
    /// - `hash`: current content fingerprint
    /// - `dependencies`: resolved local imports (replaces any previous set)
    /// - `component`: component metadata, `None` when analysis found nothing
    pub fn register(
        &mut self,
        module_id: ModuleId,
        hash: String,
        dependencies: Vec<ModuleId>,
        component: Option<ComponentInfo>,
    ) {
        self.detach_forward_edges(&module_id);

        let dependencies: HashSet<ModuleId> = dependencies
            .into_iter()
            .filter(|dep| *dep != module_id)
            .collect();
        for dep in &dependencies {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .insert(module_id.clone());
        }

        let kind = FileKind::from_extension(module_id.extension().as_deref().unwrap_or(""));
        let accepts = accepts_live_update(&module_id, kind, component.is_some());

        let record = ModuleRecord {
            module_id: module_id.clone(),
            content_hash: hash,
            dependencies,
            accepts_live_update: accepts,
            last_update: Utc::now(),
            is_component: component.is_some(),
            component_name: component.as_ref().map(|c| c.name.clone()),
            has_local_state: component.as_ref().map(|c| c.has_local_state).unwrap_or(false),
            signature: component.map(|c| c.signature).unwrap_or_default(),
        };
        self.records.insert(module_id.clone(), record);
        self.adopt_placeholder_edges(&module_id);
    }

    /// Record a new hash for a known module.
    ///
    /// Returns `false` (and leaves `last_update` alone) when the module is
    /// unknown or the hash is unchanged.
    pub fn update(&mut self, module_id: &ModuleId, new_hash: &str) -> bool {
        match self.records.get_mut(module_id) {
            Some(record) if record.content_hash != new_hash => {
                record.content_hash = new_hash.to_string();
                record.last_update = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Every module transitively depending on `module_id`, breadth-first.
    ///
    /// Cycle-safe: each module appears at most once and `module_id` itself is
    /// never included.
    pub fn affected_by(&self, module_id: &ModuleId) -> Vec<ModuleId> {
        let mut visited: HashSet<&ModuleId> = HashSet::new();
        let mut affected = Vec::new();
        let mut queue: VecDeque<&ModuleId> = VecDeque::new();

        visited.insert(module_id);
        queue.push_back(module_id);

        while let Some(current) = queue.pop_front() {
            let Some(importers) = self.dependents.get(current) else {
                continue;
            };
            for importer in importers {
                if visited.insert(importer) {
                    affected.push(importer.clone());
                    queue.push_back(importer);
                }
            }
        }

        affected
    }

    /// Delete a module and every edge that mentions it.
    pub fn remove(&mut self, module_id: &ModuleId) -> Option<ModuleRecord> {
        self.detach_forward_edges(module_id);

        if let Some(importers) = self.dependents.remove(module_id) {
            for importer in importers {
                if let Some(record) = self.records.get_mut(&importer) {
                    record.dependencies.remove(module_id);
                }
            }
        }

        self.records.remove(module_id)
    }

    /// Drop every record and edge.
    pub fn clear(&mut self) {
        self.records.clear();
        self.dependents.clear();
    }

    pub fn get(&self, module_id: &ModuleId) -> Option<&ModuleRecord> {
        self.records.get(module_id)
    }

    pub fn contains(&self, module_id: &ModuleId) -> bool {
        self.records.contains_key(module_id)
    }

    /// Direct importers of `module_id`.
    pub fn dependents_of(&self, module_id: &ModuleId) -> Vec<ModuleId> {
        self.dependents
            .get(module_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_modules: self.records.len(),
            hmr_capable_modules: self
                .records
                .values()
                .filter(|r| r.accepts_live_update)
                .count(),
        }
    }

    /// Drop the reverse edges created by `module_id`'s current forward set.
    /// Re-point importers of a not-yet-existing target at the module that
    /// now satisfies it. An import of `./Badge` was kept as the lexical id
    /// `Badge`; once `Badge.tsx` (or `Badge/index.tsx`) registers, those
    /// importers depend on it instead.
    fn adopt_placeholder_edges(&mut self, module_id: &ModuleId) {
        for placeholder in placeholder_ids(module_id) {
            if self.records.contains_key(&placeholder) {
                continue;
            }
            let Some(importers) = self.dependents.remove(&placeholder) else {
                continue;
            };
            for importer in importers {
                let is_self = importer == *module_id;
                if let Some(record) = self.records.get_mut(&importer) {
                    record.dependencies.remove(&placeholder);
                    if !is_self {
                        record.dependencies.insert(module_id.clone());
                    }
                }
                if is_self {
                    continue;
                }
                self.dependents
                    .entry(module_id.clone())
                    .or_default()
                    .insert(importer);
            }
        }
    }

    fn detach_forward_edges(&mut self, module_id: &ModuleId) {
        let Some(record) = self.records.get(module_id) else {
            return;
        };
        for dep in &record.dependencies {
            if let Some(importers) = self.dependents.get_mut(dep) {
                importers.remove(module_id);
                if importers.is_empty() {
                    self.dependents.remove(dep);
                }
            }
        }
    }
}

/// Lexical ids an unresolved import of `module_id` would have been kept as:
/// the path without its extension, and the directory for an `index` file.
fn placeholder_ids(module_id: &ModuleId) -> Vec<ModuleId> {
    let mut ids = Vec::new();
    if module_id.extension().is_none() {
        return ids;
    }

    let parent = module_id.parent();
    let stem = module_id.file_stem();
    let bare = if parent.is_empty() {
        ModuleId::new(stem)
    } else {
        ModuleId::new(format!("{}/{}", parent, stem))
    };
    if bare != *module_id {
        ids.push(bare);
    }
    if stem == "index" && !parent.is_empty() {
        ids.push(ModuleId::new(parent));
    }
    ids
}
