//! Language index: translation tables merged across packs.

use std::collections::HashMap;

use regex::Regex;

use crate::error::Result;
use crate::pack::{LanguageMeta, PackContainer};

/// Merged translation tables keyed by language id. Individual keys from
/// later packs override earlier ones.
#[derive(Default)]
pub struct LanguageIndex {
    /// (namespace, language id) -> translations, kept apart so filter
    /// rules can erase one namespace's contribution.
    tables: HashMap<(String, String), HashMap<String, String>>,
    /// Language metadata collected from pack manifests.
    meta: HashMap<String, LanguageMeta>,
}

impl LanguageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one pack namespace's `lang` folder into the index, recording
    /// the manifest's language metadata alongside.
    pub fn load_directory(
        &mut self,
        namespace: &str,
        folder: &str,
        container: &PackContainer,
        meta: &HashMap<String, LanguageMeta>,
    ) -> Result<()> {
        for file in container.list_files_recursively(folder, &["json"]) {
            let language = file
                .strip_prefix(&format!("{folder}/"))
                .unwrap_or(&file)
                .trim_end_matches(".json")
                .to_string();

            match container
                .read_to_string(&file)
                .and_then(|text| {
                    serde_json::from_str::<HashMap<String, String>>(&text).map_err(Into::into)
                }) {
                Ok(translations) => {
                    self.tables
                        .entry((namespace.to_string(), language.clone()))
                        .or_default()
                        .extend(translations);
                }
                Err(e) => {
                    log::warn!("unable to load language file {namespace}:{language}: {e}");
                }
            }
        }
        for (language, language_meta) in meta {
            self.meta.insert(language.clone(), language_meta.clone());
        }
        Ok(())
    }

    /// Translate a key in a language, searching every namespace.
    pub fn translate(&self, language: &str, key: &str) -> Option<&str> {
        self.tables
            .iter()
            .filter(|((_, lang), _)| lang == language)
            .find_map(|(_, table)| table.get(key))
            .map(String::as_str)
    }

    /// Metadata for a language, when a manifest declared any.
    pub fn language_meta(&self, language: &str) -> Option<&LanguageMeta> {
        self.meta.get(language)
    }

    /// Remove tables matching the filter patterns. Paths are matched
    /// relative to the `lang` folder (`en_us.json`).
    pub fn filter_resources(&mut self, namespace: &Regex, path: &Regex) {
        self.tables.retain(|(ns, language), _| {
            !(namespace.is_match(ns) && path.is_match(&format!("{language}.json")))
        });
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.meta.clear();
    }
}
