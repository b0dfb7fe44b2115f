//! Asset objects produced by resolution.
//!
//! A resolved reference becomes either a single leaf [`Asset`], a lazily
//! expanded [`GlobAsset`] or, while variable values are still outstanding, a
//! [`DeferredAsset`] proxy. Collections group one node per input string.

mod deferred;
mod glob;

pub use deferred::{DeferredAsset, DeferredAssetCollection, DeferredAssetName};
pub use glob::GlobAsset;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{AssetError, AssetResult};
use crate::paths;
use crate::repository::{Repository, Resource};

/// Backing location of a resolved leaf asset.
#[derive(Clone)]
pub enum AssetSource {
    /// A repository path, fetched on load. Covers plain paths and URIs with a
    /// supported scheme.
    Repository {
        /// Repository handle used for the lookup.
        repo: Arc<dyn Repository>,
        /// Absolute repository path, possibly containing `{variable}` placeholders.
        path: String,
    },
    /// A repository resource captured at expansion time.
    Resource {
        /// The captured resource handle.
        resource: Resource,
    },
    /// A file on the local file system.
    File {
        /// Root the path is anchored at, when resolved through a configured root.
        root: Option<PathBuf>,
        /// Path relative to the root, or absolute when no root applies.
        path: String,
    },
    /// A remote HTTP asset. Content retrieval is left to the embedder.
    Http {
        /// The full URL, possibly containing `{variable}` placeholders.
        url: String,
    },
    /// A named reference resolved by the embedding asset manager.
    Reference {
        /// The referenced name, without the `@` prefix.
        name: String,
    },
}

impl fmt::Debug for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repository { path, .. } => {
                f.debug_struct("Repository").field("path", path).finish()
            }
            Self::Resource { resource } => f
                .debug_struct("Resource")
                .field("path", &resource.path())
                .finish(),
            Self::File { root, path } => f
                .debug_struct("File")
                .field("root", root)
                .field("path", path)
                .finish(),
            Self::Http { url } => f.debug_struct("Http").field("url", url).finish(),
            Self::Reference { name } => f.debug_struct("Reference").field("name", name).finish(),
        }
    }
}

/// A single resolved asset.
#[derive(Debug, Clone)]
pub struct Asset {
    source: AssetSource,
    vars: Vec<String>,
    values: BTreeMap<String, String>,
    filters: Vec<String>,
    content: Option<Vec<u8>>,
    target_path: Option<String>,
    loaded: bool,
}

impl Asset {
    pub(crate) fn new(
        source: AssetSource,
        vars: Vec<String>,
        values: BTreeMap<String, String>,
    ) -> Self {
        Self {
            source,
            vars,
            values,
            filters: Vec::new(),
            content: None,
            target_path: None,
            loaded: false,
        }
    }

    /// An asset with static in-memory content, mainly useful for testing.
    pub fn from_string(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        Self::new(
            AssetSource::Resource {
                resource: Resource::memory(path, content),
            },
            Vec::new(),
            BTreeMap::new(),
        )
    }

    /// Backing location of the asset.
    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    /// The source notation of the asset: a repository path, a root-relative or
    /// absolute file path, a URL, or an `@name` reference.
    pub fn source_path(&self) -> String {
        match &self.source {
            AssetSource::Repository { path, .. } => path.clone(),
            AssetSource::Resource { resource } => resource.path().to_string(),
            AssetSource::File { path, .. } => path.clone(),
            AssetSource::Http { url } => url.clone(),
            AssetSource::Reference { name } => format!("@{name}"),
        }
    }

    /// The configured root the asset was resolved under, when one applies.
    pub fn source_root(&self) -> Option<&Path> {
        match &self.source {
            AssetSource::File { root, .. } => root.as_deref(),
            _ => None,
        }
    }

    /// Variable names declared for this asset.
    pub fn vars(&self) -> &[String] {
        &self.vars
    }

    /// Current variable values.
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Replace the variable values.
    pub fn set_values(&mut self, values: BTreeMap<String, String>) -> AssetResult<()> {
        if self.loaded {
            return Err(AssetError::InvalidState(
                "the variable values must not be changed once the asset was loaded".into(),
            ));
        }

        self.values = values;
        Ok(())
    }

    /// Ordered filter names applied to this asset.
    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// Append a filter unless it is already present.
    pub fn ensure_filter(&mut self, filter: &str) {
        if !self.filters.iter().any(|f| f == filter) {
            self.filters.push(filter.to_string());
        }
    }

    /// Remove all filters.
    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    /// Content bytes, once loaded or preset.
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    /// Preset the content, skipping the source read on load.
    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) {
        self.content = Some(content.into());
        self.loaded = true;
    }

    /// Target output path of the asset.
    pub fn target_path(&self) -> Option<&str> {
        self.target_path.as_deref()
    }

    /// Set the target output path.
    ///
    /// The path must contain a `{variable}` placeholder for every declared
    /// variable; a missing placeholder fails immediately.
    pub fn set_target_path(&mut self, target_path: impl Into<String>) -> AssetResult<()> {
        let target_path = target_path.into();
        paths::validate_target_path(&target_path, &self.vars)?;
        self.target_path = Some(target_path);
        Ok(())
    }

    /// Read the asset content from its source, once.
    ///
    /// Preset content wins over the source. Loading twice is a no-op.
    pub fn load(&mut self) -> AssetResult<()> {
        if self.loaded {
            return Ok(());
        }

        let content = match &self.source {
            AssetSource::Repository { repo, path } => {
                let resolved = paths::substitute(path, &self.vars, &self.values)?;
                let resource = repo.get(&resolved)?;
                if !resource.is_file() {
                    return Err(AssetError::NotAFile { path: resolved });
                }
                resource.content()?
            }
            AssetSource::Resource { resource } => resource.content()?,
            AssetSource::File { root, path } => {
                let resolved = paths::substitute(path, &self.vars, &self.values)?;
                let file = match root {
                    Some(root) => paths::join_root(root, &resolved),
                    None => PathBuf::from(&resolved),
                };
                std::fs::read(&file).map_err(|err| AssetError::io(file.to_string_lossy(), err))?
            }
            AssetSource::Http { url } => {
                return Err(AssetError::InvalidState(format!(
                    "content for the remote asset {url:?} must be fetched by the embedder"
                )));
            }
            AssetSource::Reference { name } => {
                return Err(AssetError::InvalidState(format!(
                    "the reference \"@{name}\" must be resolved by the embedding asset manager"
                )));
            }
        };

        self.content = Some(content);
        self.loaded = true;
        Ok(())
    }

    /// Timestamp of the last modification of the underlying source.
    pub fn last_modified(&self) -> AssetResult<SystemTime> {
        match &self.source {
            AssetSource::Repository { repo, path } => {
                let resolved = paths::substitute(path, &self.vars, &self.values)?;
                repo.get(&resolved)?.last_modified()
            }
            AssetSource::Resource { resource } => resource.last_modified(),
            AssetSource::File { root, path } => {
                let resolved = paths::substitute(path, &self.vars, &self.values)?;
                let file = match root {
                    Some(root) => paths::join_root(root, &resolved),
                    None => PathBuf::from(&resolved),
                };
                std::fs::metadata(&file)
                    .and_then(|meta| meta.modified())
                    .map_err(|err| AssetError::io(file.to_string_lossy(), err))
            }
            AssetSource::Http { url } => Err(AssetError::InvalidState(format!(
                "the last modification time of the remote asset {url:?} is not known locally"
            ))),
            AssetSource::Reference { name } => Err(AssetError::InvalidState(format!(
                "the reference \"@{name}\" must be resolved by the embedding asset manager"
            ))),
        }
    }
}

/// One resolution result: a single leaf or a lazily expanded glob.
#[derive(Debug)]
pub enum ResolvedNode {
    /// A single resolved asset.
    Leaf(Asset),
    /// A glob expanding to zero or more leaf assets on first access.
    Glob(GlobAsset),
}

impl ResolvedNode {
    /// The source notation: the leaf path or the glob pattern.
    pub fn source_path(&self) -> String {
        match self {
            Self::Leaf(asset) => asset.source_path(),
            Self::Glob(glob) => glob.pattern().to_string(),
        }
    }

    pub(crate) fn ensure_filter(&mut self, filter: &str) {
        match self {
            Self::Leaf(asset) => asset.ensure_filter(filter),
            Self::Glob(glob) => glob.ensure_filter(filter),
        }
    }

    pub(crate) fn set_content(&mut self, content: Vec<u8>) -> AssetResult<()> {
        match self {
            Self::Leaf(asset) => {
                asset.set_content(content);
                Ok(())
            }
            Self::Glob(glob) => Err(AssetError::InvalidState(format!(
                "content cannot be preset on the glob asset {:?}",
                glob.pattern()
            ))),
        }
    }

    pub(crate) fn set_target_path(&mut self, target_path: String) -> AssetResult<()> {
        match self {
            Self::Leaf(asset) => asset.set_target_path(target_path),
            Self::Glob(glob) => Err(AssetError::InvalidState(format!(
                "a target path cannot be set on the glob asset {:?}",
                glob.pattern()
            ))),
        }
    }

    /// Load the leaf, or expand and load every glob match.
    pub fn load(&mut self) -> AssetResult<()> {
        match self {
            Self::Leaf(asset) => asset.load(),
            Self::Glob(glob) => glob.load(),
        }
    }
}

/// One entry of an [`AssetCollection`].
#[derive(Debug)]
pub enum AssetNode {
    /// A fully resolved node.
    Resolved(ResolvedNode),
    /// A node still waiting for variable values.
    Deferred(DeferredAsset),
}

impl AssetNode {
    /// The source notation of the node.
    pub fn source_path(&self) -> String {
        match self {
            Self::Resolved(node) => node.source_path(),
            Self::Deferred(deferred) => deferred.source_path(),
        }
    }

    /// Load the node, resolving deferred entries first.
    pub fn load(&mut self) -> AssetResult<()> {
        match self {
            Self::Resolved(node) => node.load(),
            Self::Deferred(deferred) => deferred.load(),
        }
    }

    fn set_values(&mut self, values: &BTreeMap<String, String>) -> AssetResult<()> {
        match self {
            Self::Resolved(ResolvedNode::Leaf(asset)) => {
                if asset.vars().is_empty() {
                    Ok(())
                } else {
                    asset.set_values(values.clone())
                }
            }
            // Glob leaves carry no variables; substitution happened at expansion.
            Self::Resolved(ResolvedNode::Glob(_)) => Ok(()),
            Self::Deferred(deferred) => deferred.set_values(values.clone()),
        }
    }

    fn ensure_filter(&mut self, filter: &str) {
        match self {
            Self::Resolved(node) => node.ensure_filter(filter),
            Self::Deferred(deferred) => deferred.ensure_filter(filter),
        }
    }

    fn collect_leaves<'a>(&'a mut self, out: &mut Vec<&'a mut Asset>) -> AssetResult<()> {
        match self {
            Self::Resolved(ResolvedNode::Leaf(asset)) => out.push(asset),
            Self::Resolved(ResolvedNode::Glob(glob)) => out.extend(glob.leaves_mut()?.iter_mut()),
            Self::Deferred(deferred) => deferred.collect_leaves(out)?,
        }
        Ok(())
    }
}

/// An ordered group of resolved asset nodes, one per input string.
#[derive(Debug)]
pub struct AssetCollection {
    name: String,
    nodes: Vec<AssetNode>,
    filters: Vec<String>,
    vars: Vec<String>,
    target_path: Option<String>,
}

impl AssetCollection {
    pub(crate) fn new(
        name: String,
        nodes: Vec<AssetNode>,
        filters: Vec<String>,
        vars: Vec<String>,
    ) -> Self {
        Self {
            name,
            nodes,
            filters,
            vars,
            target_path: None,
        }
    }

    /// Canonical name of the collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The nodes of the collection, one per input.
    pub fn nodes(&self) -> &[AssetNode] {
        &self.nodes
    }

    /// Mutable access to the nodes of the collection.
    pub fn nodes_mut(&mut self) -> &mut [AssetNode] {
        &mut self.nodes
    }

    /// Variable names declared for the collection.
    pub fn vars(&self) -> &[String] {
        &self.vars
    }

    /// Ordered filter names applied to the collection.
    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// Append a filter to the collection and every node.
    pub fn ensure_filter(&mut self, filter: &str) {
        if !self.filters.iter().any(|f| f == filter) {
            self.filters.push(filter.to_string());
        }
        for node in &mut self.nodes {
            node.ensure_filter(filter);
        }
    }

    /// Supply variable values to every node, resolving deferred entries.
    pub fn set_values(&mut self, values: BTreeMap<String, String>) -> AssetResult<()> {
        for node in &mut self.nodes {
            node.set_values(&values)?;
        }
        Ok(())
    }

    /// Every leaf asset of the collection, expanding globs and resolving
    /// deferred nodes as needed.
    pub fn leaves_mut(&mut self) -> AssetResult<Vec<&mut Asset>> {
        let mut leaves = Vec::new();
        for node in &mut self.nodes {
            node.collect_leaves(&mut leaves)?;
        }
        Ok(leaves)
    }

    /// Load every node of the collection.
    pub fn load(&mut self) -> AssetResult<()> {
        for node in &mut self.nodes {
            node.load()?;
        }
        Ok(())
    }

    /// Concatenated content of every leaf, loading as needed.
    pub fn content(&mut self) -> AssetResult<Vec<u8>> {
        self.load()?;
        let mut content = Vec::new();
        for leaf in self.leaves_mut()? {
            if let Some(bytes) = leaf.content() {
                content.extend_from_slice(bytes);
            }
        }
        Ok(content)
    }

    /// The most recent modification time across all leaves.
    pub fn last_modified(&mut self) -> AssetResult<SystemTime> {
        let mut latest: Option<SystemTime> = None;
        for leaf in self.leaves_mut()? {
            let modified = leaf.last_modified()?;
            latest = Some(match latest {
                Some(current) if current >= modified => current,
                _ => modified,
            });
        }

        latest.ok_or_else(|| AssetError::InvalidState("the collection has no leaves".into()))
    }

    /// Target output path of the collection.
    pub fn target_path(&self) -> Option<&str> {
        self.target_path.as_deref()
    }

    /// Set the target output path of the collection.
    pub fn set_target_path(&mut self, target_path: impl Into<String>) -> AssetResult<()> {
        let target_path = target_path.into();
        paths::validate_target_path(&target_path, &self.vars)?;
        self.target_path = Some(target_path);
        Ok(())
    }
}
