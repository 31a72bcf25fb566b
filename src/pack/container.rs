//! Pack containers: a directory or ZIP archive as a virtual filesystem.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use zip::ZipArchive;

use crate::error::{RasterError, Result};

/// A resource pack's backing storage. All paths are forward-slash
/// separated and relative to the pack root.
pub enum PackContainer {
    Directory(DirectoryContainer),
    Zip(ZipContainer),
}

impl PackContainer {
    /// Open a pack from a file path. Directories are used as-is; anything
    /// else is treated as a ZIP archive.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<PackContainer> {
        let path = path.as_ref();
        if path.is_dir() {
            Ok(PackContainer::Directory(DirectoryContainer {
                name: file_name(path),
                root: path.to_path_buf(),
            }))
        } else {
            Ok(PackContainer::Zip(ZipContainer::open(path)?))
        }
    }

    /// The pack's display name (its file name).
    pub fn name(&self) -> &str {
        match self {
            PackContainer::Directory(dir) => &dir.name,
            PackContainer::Zip(zip) => &zip.name,
        }
    }

    /// Whether an entry exists at `path` (file or directory).
    pub fn exists(&self, path: &str) -> bool {
        match self {
            PackContainer::Directory(dir) => dir.root.join(path).exists(),
            PackContainer::Zip(zip) => zip.files.contains(path) || zip.dirs.contains(path),
        }
    }

    /// Whether `path` is a directory.
    pub fn is_dir(&self, path: &str) -> bool {
        match self {
            PackContainer::Directory(dir) => dir.root.join(path).is_dir(),
            PackContainer::Zip(zip) => zip.dirs.contains(path),
        }
    }

    /// Read a file entry's bytes.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        match self {
            PackContainer::Directory(dir) => Ok(std::fs::read(dir.root.join(path))?),
            PackContainer::Zip(zip) => zip.read(path),
        }
    }

    /// Read a file entry as UTF-8 text, stripping a leading BOM if present.
    pub fn read_to_string(&self, path: &str) -> Result<String> {
        let bytes = self.read(path)?;
        let bytes = bytes
            .strip_prefix(&[0xEF, 0xBB, 0xBF][..])
            .unwrap_or(&bytes);
        String::from_utf8(bytes.to_vec())
            .map_err(|e| RasterError::InvalidPack(format!("{path} is not valid UTF-8: {e}")))
    }

    /// Immediate child directory names under `path`, sorted.
    pub fn list_dirs(&self, path: &str) -> Vec<String> {
        match self {
            PackContainer::Directory(dir) => {
                let mut names = Vec::new();
                if let Ok(entries) = std::fs::read_dir(dir.root.join(path)) {
                    for entry in entries.flatten() {
                        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                            names.push(entry.file_name().to_string_lossy().to_string());
                        }
                    }
                }
                names.sort();
                names
            }
            PackContainer::Zip(zip) => {
                let prefix = normalize_dir_prefix(path);
                let mut names = BTreeSet::new();
                for d in &zip.dirs {
                    if let Some(rest) = d.strip_prefix(&prefix) {
                        if !rest.is_empty() && !rest.contains('/') {
                            names.insert(rest.to_string());
                        }
                    }
                }
                names.into_iter().collect()
            }
        }
    }

    /// All file paths under `path` (recursively) whose extension is in
    /// `extensions`, sorted, relative to the container root. An empty
    /// extension list matches every file. A missing directory yields an
    /// empty list.
    pub fn list_files_recursively(&self, path: &str, extensions: &[&str]) -> Vec<String> {
        let mut files = match self {
            PackContainer::Directory(dir) => {
                let mut files = Vec::new();
                collect_files(&dir.root, &dir.root.join(path), &mut files);
                files
            }
            PackContainer::Zip(zip) => {
                let prefix = normalize_dir_prefix(path);
                zip.files
                    .iter()
                    .filter(|f| f.starts_with(&prefix))
                    .cloned()
                    .collect()
            }
        };
        if !extensions.is_empty() {
            files.retain(|f| {
                f.rsplit_once('.')
                    .is_some_and(|(_, ext)| extensions.contains(&ext))
            });
        }
        files.sort();
        files
    }

    /// Release the backing handle. Zip-backed containers hold an open file
    /// handle that must not outlive the owning session.
    pub fn close(&self) {
        if let PackContainer::Zip(zip) = self {
            zip.archive.lock().take();
        }
    }
}

/// A pack rooted at a plain directory.
pub struct DirectoryContainer {
    name: String,
    root: PathBuf,
}

/// A pack backed by a ZIP archive. The entry list is indexed up front;
/// entry contents are read on demand through the shared archive handle.
pub struct ZipContainer {
    name: String,
    files: BTreeSet<String>,
    dirs: BTreeSet<String>,
    archive: Mutex<Option<ZipArchive<File>>>,
}

impl ZipContainer {
    fn open(path: &Path) -> Result<ZipContainer> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;

        let mut files = BTreeSet::new();
        let mut dirs = BTreeSet::new();
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            let name = entry.name().trim_matches('/').to_string();
            if entry.is_dir() {
                dirs.insert(name);
            } else {
                // Implicit parent directories.
                let mut parent = name.as_str();
                while let Some((dir, _)) = parent.rsplit_once('/') {
                    dirs.insert(dir.to_string());
                    parent = dir;
                }
                files.insert(name);
            }
        }

        Ok(ZipContainer {
            name: file_name(path),
            files,
            dirs,
            archive: Mutex::new(Some(archive)),
        })
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let mut guard = self.archive.lock();
        let archive = guard
            .as_mut()
            .ok_or(RasterError::Closed("pack container"))?;
        let mut entry = archive.by_name(path)?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        Ok(data)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn normalize_dir_prefix(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

fn collect_files(base: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(base, &path, out);
        } else if let Ok(relative) = path.strip_prefix(base) {
            out.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
}
