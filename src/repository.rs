//! The abstract content store queried during asset resolution.
//!
//! The resolver treats the repository as a read-only collaborator: it is queried
//! for containment, single lookups and glob matches, but never mutated. The
//! bundled [`InMemoryRepository`] backs repository paths with real files or
//! in-memory byte strings and is the implementation used throughout the tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use regex::Regex;

use crate::error::{AssetError, AssetResult};

/// Read-only lookup interface consumed by the asset factory.
pub trait Repository {
    /// Fetch the resource stored at an absolute repository path.
    fn get(&self, path: &str) -> AssetResult<Resource>;

    /// Find every resource matching a glob pattern, in path order.
    fn find(&self, glob: &str) -> Vec<Resource>;

    /// Returns `true` when a resource exists at the given path.
    fn contains(&self, path: &str) -> bool;

    /// URI schemes this repository can resolve, if any.
    fn supported_schemes(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A single entry of the repository tree.
#[derive(Debug, Clone)]
pub struct Resource {
    path: String,
    backing: Backing,
}

#[derive(Debug, Clone)]
enum Backing {
    File(PathBuf),
    Memory {
        bytes: Arc<[u8]>,
        modified: SystemTime,
    },
    Directory,
}

impl Resource {
    /// A resource backed by a real file on disk.
    pub fn file(path: impl Into<String>, filesystem_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backing: Backing::File(filesystem_path.into()),
        }
    }

    /// A resource holding its content in memory.
    pub fn memory(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            backing: Backing::Memory {
                bytes: bytes.into().into(),
                modified: SystemTime::now(),
            },
        }
    }

    /// A directory entry carrying no content.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            backing: Backing::Directory,
        }
    }

    /// Absolute repository path of the resource.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns `true` when the resource carries content.
    pub fn is_file(&self) -> bool {
        !matches!(self.backing, Backing::Directory)
    }

    /// The real file behind the resource, when one exists.
    pub fn filesystem_path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File(path) => Some(path),
            _ => None,
        }
    }

    /// Read the content bytes of the resource.
    pub fn content(&self) -> AssetResult<Vec<u8>> {
        match &self.backing {
            Backing::File(path) => {
                fs::read(path).map_err(|err| AssetError::io(path.to_string_lossy(), err))
            }
            Backing::Memory { bytes, .. } => Ok(bytes.to_vec()),
            Backing::Directory => Err(AssetError::NotAFile {
                path: self.path.clone(),
            }),
        }
    }

    /// Timestamp of the last modification of the resource.
    pub fn last_modified(&self) -> AssetResult<SystemTime> {
        match &self.backing {
            Backing::File(path) => fs::metadata(path)
                .and_then(|meta| meta.modified())
                .map_err(|err| AssetError::io(path.to_string_lossy(), err)),
            Backing::Memory { modified, .. } => Ok(*modified),
            Backing::Directory => Err(AssetError::NotAFile {
                path: self.path.clone(),
            }),
        }
    }
}

/// Repository implementation holding its tree in memory.
///
/// Paths can be backed by in-memory bytes or by real files mounted from a
/// directory. Registered URI schemes make `scheme:///path` spellings resolve
/// to the plain repository path.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    resources: BTreeMap<String, Resource>,
    schemes: Vec<String>,
}

impl InMemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a URI scheme handled by this repository.
    pub fn register_scheme(&mut self, scheme: impl Into<String>) {
        self.schemes.push(scheme.into());
    }

    /// Add an in-memory resource.
    pub fn insert_memory(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let path = path.into();
        self.insert_parents(&path);
        self.resources
            .insert(path.clone(), Resource::memory(path, bytes));
    }

    /// Add a resource backed by a real file.
    pub fn insert_file(&mut self, path: impl Into<String>, filesystem_path: impl Into<PathBuf>) {
        let path = path.into();
        self.insert_parents(&path);
        self.resources
            .insert(path.clone(), Resource::file(path, filesystem_path));
    }

    /// Mount a directory tree under a repository path.
    ///
    /// Every file below `directory` becomes a file-backed resource at the
    /// corresponding path below `prefix`.
    pub fn mount(&mut self, prefix: &str, directory: impl AsRef<Path>) -> AssetResult<()> {
        let directory = directory.as_ref();
        let prefix = prefix.trim_end_matches('/');
        self.insert_parents(&format!("{prefix}/"));
        self.resources
            .insert(prefix.to_string(), Resource::directory(prefix));
        self.mount_dir(prefix, directory)
    }

    fn mount_dir(&mut self, prefix: &str, directory: &Path) -> AssetResult<()> {
        let entries = fs::read_dir(directory)
            .map_err(|err| AssetError::io(directory.to_string_lossy(), err))?;

        for entry in entries {
            let entry = entry.map_err(|err| AssetError::io(directory.to_string_lossy(), err))?;
            let name = entry.file_name();
            let child_path = format!("{}/{}", prefix, name.to_string_lossy());
            let file_type = entry
                .file_type()
                .map_err(|err| AssetError::io(entry.path().to_string_lossy(), err))?;

            if file_type.is_dir() {
                self.resources
                    .insert(child_path.clone(), Resource::directory(child_path.clone()));
                self.mount_dir(&child_path, &entry.path())?;
            } else {
                self.resources
                    .insert(child_path.clone(), Resource::file(child_path, entry.path()));
            }
        }

        Ok(())
    }

    fn insert_parents(&mut self, path: &str) {
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let parent = current.clone();
            current = format!("{parent}/{segment}");
            if current != path && !self.resources.contains_key(&current) {
                self.resources
                    .insert(current.clone(), Resource::directory(current.clone()));
            }
        }
    }

    /// Strip a registered scheme prefix, if present.
    ///
    /// Returns `None` when the path carries a scheme this repository does not
    /// support.
    fn plain_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        match path.split_once("://") {
            Some((scheme, remainder)) => {
                if self.schemes.iter().any(|s| s == scheme) {
                    Some(remainder)
                } else {
                    None
                }
            }
            None => Some(path),
        }
    }
}

impl Repository for InMemoryRepository {
    fn get(&self, path: &str) -> AssetResult<Resource> {
        let Some(plain) = self.plain_path(path) else {
            let scheme = path.split_once("://").map(|(s, _)| s).unwrap_or_default();
            return Err(AssetError::UnknownScheme {
                scheme: scheme.to_string(),
            });
        };

        self.resources
            .get(plain)
            .cloned()
            .ok_or_else(|| AssetError::ResourceNotFound {
                path: plain.to_string(),
            })
    }

    fn find(&self, glob: &str) -> Vec<Resource> {
        let Some(plain) = self.plain_path(glob) else {
            return Vec::new();
        };

        let Ok(pattern) = glob_to_regex(plain) else {
            return Vec::new();
        };

        self.resources
            .values()
            .filter(|resource| pattern.is_match(resource.path()))
            .cloned()
            .collect()
    }

    fn contains(&self, path: &str) -> bool {
        match self.plain_path(path) {
            Some(plain) => self.resources.contains_key(plain),
            None => false,
        }
    }

    fn supported_schemes(&self) -> Vec<String> {
        self.schemes.clone()
    }
}

/// Translate a repository glob into an anchored regex.
///
/// `*` matches within a single path segment; every other character matches
/// literally.
fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::from("^");
    for part in glob.split('*') {
        if !pattern.ends_with('^') {
            pattern.push_str("[^/]*");
        }
        pattern.push_str(&regex::escape(part));
    }
    pattern.push('$');

    Regex::new(&pattern)
}
