//! Per-pack load reports.

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;

use super::manifest::{LanguageMeta, PackDescription, ResourceFilter};

/// Where a pack came from in the load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackType {
    /// The built-in default pack, loaded first.
    BuiltIn,
    /// A user-installed pack.
    Local,
    /// A server-provided pack, loaded last.
    Server,
}

/// The outcome of loading one pack. Rejected packs still produce an info
/// record so callers can report "N of M packs failed" to an operator.
pub struct PackInfo {
    /// Pack display name.
    pub name: String,
    /// Where the pack came from.
    pub pack_type: PackType,
    /// Whether the pack's assets were merged into the session.
    pub status: bool,
    /// Human-readable rejection reason when `status` is false.
    pub rejection_reason: Option<String>,
    /// Declared manifest format version (0 when the manifest never parsed).
    pub pack_format: i32,
    /// Resolved pack description.
    pub description: Option<PackDescription>,
    /// `pack.png`, when present and decodable.
    pub icon: Option<Arc<RgbaImage>>,
    /// Language metadata declared by the manifest.
    pub languages: HashMap<String, LanguageMeta>,
    /// Filter rules this pack applied to lower-priority packs.
    pub filters: Vec<ResourceFilter>,
}

impl PackInfo {
    /// An info record for a pack that failed before its assets loaded.
    pub fn rejected(name: impl Into<String>, pack_type: PackType, reason: impl Into<String>) -> Self {
        PackInfo {
            name: name.into(),
            pack_type,
            status: false,
            rejection_reason: Some(reason.into()),
            pack_format: 0,
            description: None,
            icon: None,
            languages: HashMap::new(),
            filters: Vec::new(),
        }
    }

    /// An info record for a successfully merged pack.
    pub fn accepted(
        name: impl Into<String>,
        pack_type: PackType,
        pack_format: i32,
        description: PackDescription,
        icon: Option<Arc<RgbaImage>>,
        languages: HashMap<String, LanguageMeta>,
        filters: Vec<ResourceFilter>,
    ) -> Self {
        PackInfo {
            name: name.into(),
            pack_type,
            status: true,
            rejection_reason: None,
            pack_format,
            description: Some(description),
            icon,
            languages,
            filters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_info() {
        let info = PackInfo::rejected("broken.zip", PackType::Local, "pack.mcmeta not found");
        assert!(!info.status);
        assert_eq!(
            info.rejection_reason.as_deref(),
            Some("pack.mcmeta not found")
        );
        assert_eq!(info.pack_format, 0);
    }
}
