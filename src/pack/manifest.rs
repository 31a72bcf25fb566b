//! `pack.mcmeta` manifest parsing.

use std::collections::HashMap;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// A parsed pack manifest.
#[derive(Debug, Clone)]
pub struct PackManifest {
    /// Declared pack format version.
    pub pack_format: i32,
    /// Pack description, normalized to plain text.
    pub description: PackDescription,
    /// Language metadata declared by the pack.
    pub languages: HashMap<String, LanguageMeta>,
    /// Resource filter rules erasing lower-priority resources.
    pub filters: Vec<ResourceFilter>,
}

/// The pack description in both raw and plain-text form. The raw value may
/// be a plain string, a legacy colour-coded string or structured rich text.
#[derive(Debug, Clone)]
pub struct PackDescription {
    /// Readable text with legacy colour codes stripped.
    pub plain: String,
    /// The description value as it appeared in the manifest.
    pub raw: Value,
}

impl PackDescription {
    fn from_value(value: Value) -> PackDescription {
        let plain = plain_text(&value);
        PackDescription { plain, raw: value }
    }
}

/// Language metadata from the manifest's `language` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageMeta {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bidirectional: bool,
}

/// One `filter.block` rule: resources whose namespace and pack-relative
/// path both match are removed from every lower-priority pack.
#[derive(Debug, Clone)]
pub struct ResourceFilter {
    pub namespace_pattern: String,
    pub path_pattern: String,
    pub namespace: Regex,
    pub path: Regex,
}

impl ResourceFilter {
    /// Compile a rule. Absent patterns match everything. Patterns must
    /// match the whole namespace/path, as in the game's implementation.
    pub fn new(namespace: Option<&str>, path: Option<&str>) -> Result<ResourceFilter> {
        let namespace_pattern = namespace.unwrap_or(".*").to_string();
        let path_pattern = path.unwrap_or(".*").to_string();
        Ok(ResourceFilter {
            namespace: Regex::new(&format!("^(?:{namespace_pattern})$"))?,
            path: Regex::new(&format!("^(?:{path_pattern})$"))?,
            namespace_pattern,
            path_pattern,
        })
    }

    /// Whether this rule erases the given namespace + pack-relative path.
    pub fn matches(&self, namespace: &str, path: &str) -> bool {
        self.namespace.is_match(namespace) && self.path.is_match(path)
    }
}

#[derive(Deserialize)]
struct RawManifest {
    pack: Option<RawPackSection>,
    #[serde(default)]
    language: HashMap<String, LanguageMeta>,
    filter: Option<RawFilterSection>,
}

#[derive(Deserialize)]
struct RawPackSection {
    pack_format: i32,
    #[serde(default)]
    description: Value,
}

#[derive(Deserialize)]
struct RawFilterSection {
    #[serde(default)]
    block: Vec<RawFilterRule>,
}

#[derive(Deserialize)]
struct RawFilterRule {
    namespace: Option<String>,
    path: Option<String>,
}

impl PackManifest {
    /// Parse a `pack.mcmeta` document. When `default_pack` is supplied
    /// (built-in pack loading), a missing `pack` section falls back to the
    /// given format and description instead of failing.
    pub fn parse(text: &str, default_pack: Option<(i32, &str)>) -> Result<PackManifest> {
        let raw: RawManifest = serde_json::from_str(text)?;

        let (pack_format, description) = match (raw.pack, default_pack) {
            (Some(pack), _) => (pack.pack_format, PackDescription::from_value(pack.description)),
            (None, Some((format, description))) => (
                format,
                PackDescription::from_value(Value::String(description.to_string())),
            ),
            (None, None) => {
                return Err(crate::error::RasterError::InvalidPack(
                    "pack.mcmeta has no pack section".to_string(),
                ))
            }
        };

        let mut filters = Vec::new();
        if let Some(filter) = raw.filter {
            for rule in filter.block {
                filters.push(ResourceFilter::new(
                    rule.namespace.as_deref(),
                    rule.path.as_deref(),
                )?);
            }
        }

        Ok(PackManifest {
            pack_format,
            description,
            languages: raw.language,
            filters,
        })
    }
}

/// Flatten a description value to readable text: plain strings lose their
/// legacy colour codes, rich-text objects collapse to their `text` content.
fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => strip_legacy_codes(s),
        Value::Array(parts) => parts.iter().map(plain_text).collect(),
        Value::Object(obj) => {
            let mut out = String::new();
            if let Some(text) = obj.get("text") {
                out.push_str(&plain_text(text));
            } else if let Some(translate) = obj.get("translate").and_then(Value::as_str) {
                out.push_str(translate);
            }
            if let Some(Value::Array(extra)) = obj.get("extra") {
                for part in extra {
                    out.push_str(&plain_text(part));
                }
            }
            out
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Remove legacy `section-sign + code` colour sequences.
fn strip_legacy_codes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\u{00a7}' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}
