//! Resource pack containers and manifests.
//!
//! A pack is a directory or ZIP archive carrying a `pack.mcmeta` manifest
//! and an `assets/` tree. This module abstracts the storage behind a small
//! virtual filesystem and parses the manifest.

pub mod container;
pub mod info;
pub mod manifest;

pub use container::PackContainer;
pub use info::{PackInfo, PackType};
pub use manifest::{LanguageMeta, PackDescription, PackManifest, ResourceFilter};
