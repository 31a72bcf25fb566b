//! Font index: provider definitions for the sibling text subsystem.
//!
//! No glyph layout happens here; the index only stores each font's
//! provider list so a text renderer can look textures up through the same
//! session.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use crate::error::Result;
use crate::pack::PackContainer;

/// Maps namespaced font keys to their raw provider definitions.
#[derive(Default)]
pub struct FontIndex {
    fonts: HashMap<String, Value>,
}

impl FontIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one pack namespace's `font` folder into the index.
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

            match container
                .read_to_string(&file)
                .and_then(|text| serde_json::from_str::<Value>(&text).map_err(Into::into))
            {
                Ok(definition) => {
                    self.fonts.insert(key, definition);
                }
                Err(e) => {
                    log::warn!("unable to load font {key}: {e}");
                }
            }
        }
        Ok(())
    }

    /// Look up a font definition by namespaced key.
    pub fn get(&self, location: &str) -> Option<&Value> {
        self.fonts.get(location)
    }

    /// Remove keys matching the filter patterns. Paths are matched
    /// relative to the `font` folder (`default.json`).
    pub fn filter_resources(&mut self, namespace: &Regex, path: &Regex) {
        self.fonts.retain(|key, _| {
            let (ns, rel) = crate::types::split_location(key);
            !(namespace.is_match(ns) && path.is_match(&format!("{rel}.json")))
        });
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn clear(&mut self) {
        self.fonts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter() {
        let mut index = FontIndex::new();
        index
            .fonts
            .insert("minecraft:default".to_string(), Value::Null);
        index
            .fonts
            .insert("minecraft:alt".to_string(), Value::Null);

        let ns = Regex::new("^(?:minecraft)$").unwrap();
        let path = Regex::new(r"^(?:default\.json)$").unwrap();
        index.filter_resources(&ns, &path);

        assert!(index.get("minecraft:default").is_none());
        assert!(index.get("minecraft:alt").is_some());
    }
}
