//! Model index: raw block-model storage and inheritance resolution.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use regex::Regex;

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::model::{BlockModel, PredicateKey, BLOCK_ENTITY_BASE, ITEM_BASE};
use crate::pack::PackContainer;

/// Bound on chained override redirects, so predicate loops between models
/// cannot recurse forever.
const MAX_OVERRIDE_DEPTH: usize = 16;

/// Stores raw block models keyed by namespaced resource location and
/// resolves inheritance/override chains into fully merged models.
pub struct ModelIndex {
    config: Arc<RuntimeConfig>,
    models: HashMap<String, BlockModel>,
}

impl ModelIndex {
    pub fn new(config: Arc<RuntimeConfig>) -> Self {
        ModelIndex {
            config,
            models: HashMap::new(),
        }
    }

    /// Merge one pack namespace's `models` folder into the index.
    /// Individually malformed files are logged and skipped.
    pub fn load_directory(
        &mut self,
        namespace: &str,
        folder: &str,
        container: &PackContainer,
    ) -> Result<()> {
        for file in container.list_files_recursively(folder, &["json"]) {
            let relative = file
                .strip_prefix(&format!("{folder}/"))
                .unwrap_or(&file)
                .trim_end_matches(".json")
                .to_string();
            let key = format!("{namespace}:{relative}");

            let text = match container.read_to_string(&file) {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("unable to read block model {file}: {e}");
                    continue;
                }
            };
            match serde_json::from_str::<BlockModel>(&text) {
                Ok(mut model) => {
                    model.location = key.clone();
                    self.models.insert(key, model);
                }
                Err(e) => {
                    log::warn!("unable to parse block model {key}: {e}");
                }
            }
        }
        Ok(())
    }

    /// Insert or replace a raw model.
    pub fn insert(&mut self, location: impl Into<String>, mut model: BlockModel) {
        let location = location.into();
        model.location = location.clone();
        self.models.insert(location, model);
    }

    /// Look up the raw (unresolved) model for a location.
    pub fn raw(&self, location: &str) -> Option<&BlockModel> {
        self.models.get(location)
    }

    /// Remove keys whose namespace and path match the filter patterns.
    /// Paths are matched relative to the `models` folder with their
    /// extension restored (`item/bow.json`), as in the original loader.
    pub fn filter_resources(&mut self, namespace: &Regex, path: &Regex) {
        self.models.retain(|key, _| {
            let (ns, rel) = crate::types::split_location(key);
            !(namespace.is_match(ns) && path.is_match(&format!("{rel}.json")))
        });
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn clear(&mut self) {
        self.models.clear();
    }

    /// Resolve a model's inheritance and override chain into an effective
    /// model. Returns None only when `location` itself is not indexed.
    ///
    /// Overrides are evaluated in declaration order, first match wins, and
    /// a match redirects resolution to the target with an empty predicate
    /// set. The parent walk stops at the sprite/builtin-entity terminals,
    /// at a missing parent, or when a parent cycle is detected; the last
    /// two keep the partial merge rather than failing, so malformed packs
    /// still render, and are reported at warn level.
    pub fn resolve(
        &self,
        location: &str,
        legacy: bool,
        predicates: &BTreeMap<PredicateKey, f64>,
    ) -> Option<BlockModel> {
        self.resolve_inner(location, legacy, predicates, 0)
    }

    fn resolve_inner(
        &self,
        location: &str,
        legacy: bool,
        predicates: &BTreeMap<PredicateKey, f64>,
        depth: usize,
    ) -> Option<BlockModel> {
        if depth >= MAX_OVERRIDE_DEPTH {
            log::warn!("override redirect chain too deep resolving {location}");
            return None;
        }

        let mut model = self.models.get(location)?.clone();

        if let Some(target) = self.matching_override(&model, predicates) {
            return self.resolve_inner(&target, legacy, &BTreeMap::new(), depth + 1);
        }

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(location.to_string());

        while let Some(parent_raw) = model.parent.clone() {
            if parent_raw == ITEM_BASE {
                break;
            }
            if parent_raw == BLOCK_ENTITY_BASE {
                let last_segment = location.rsplit('/').next().unwrap_or(location);
                let builtin = format!(
                    "{}{}",
                    self.config.builtin_entity_model_prefix, last_segment
                );
                if let Some(resolved) =
                    self.resolve_inner(&builtin, legacy, predicates, depth + 1)
                {
                    return Some(resolved);
                }
                break;
            }

            let parent_key = self.config.namespaced(&parent_raw);
            if !visited.insert(parent_key.clone()) {
                log::warn!("parent cycle at {parent_key} while resolving {location}");
                break;
            }
            let Some(parent) = self.models.get(&parent_key) else {
                log::warn!("missing parent {parent_key} while resolving {location}");
                break;
            };

            // A child's overrides keep precedence over anything inherited,
            // so they are re-evaluated at every hop.
            if let Some(target) = self.matching_override(&model, predicates) {
                return self.resolve_inner(&target, legacy, &BTreeMap::new(), depth + 1);
            }

            model = model.merge_with_parent(parent);
        }

        Some(model.finalize(legacy))
    }

    fn matching_override(
        &self,
        model: &BlockModel,
        predicates: &BTreeMap<PredicateKey, f64>,
    ) -> Option<String> {
        if predicates.is_empty() {
            return None;
        }
        model
            .overrides
            .iter()
            .find(|o| o.matches(predicates))
            .map(|o| self.config.namespaced(&o.model))
    }
}
