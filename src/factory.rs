//! The asset factory: deferred creation, candidate search and canonical naming.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::asset::{
    Asset, AssetCollection, AssetNode, AssetSource, DeferredAsset, DeferredAssetCollection,
    DeferredAssetName, GlobAsset, ResolvedNode,
};
use crate::config::RootLayout;
use crate::error::{AssetError, AssetResult};
use crate::paths::{self, InputKind};
use crate::repository::Repository;

/// Explicit name supplied with the asset options.
#[derive(Debug, Clone)]
pub enum AssetName {
    /// A fixed name, used verbatim.
    Fixed(String),
    /// A pregenerated deferred name, resolved before use.
    Deferred(Arc<DeferredAssetName>),
}

/// Per-asset resolution options.
#[derive(Debug, Clone, Default)]
pub struct AssetOptions {
    /// Variable names that may occur as `{variable}` placeholders in the inputs.
    pub vars: Vec<String>,
    /// Root directory searched before the configured roots.
    pub root: Option<PathBuf>,
    /// Explicit name override; when absent a canonical name is generated.
    pub name: Option<AssetName>,
    /// Target path pattern; `*` is replaced by the asset name.
    pub output: Option<String>,
}

/// Creates deferred assets and canonical names over a repository and a root
/// layout.
///
/// The factory is cheap to clone; clones share the repository handle and
/// layout.
#[derive(Clone)]
pub struct AssetFactory {
    inner: Arc<FactoryInner>,
}

struct FactoryInner {
    repo: Arc<dyn Repository>,
    layout: RootLayout,
}

impl fmt::Debug for AssetFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetFactory")
            .field("layout", &self.inner.layout)
            .finish_non_exhaustive()
    }
}

impl AssetFactory {
    /// Create a factory over a repository and a root layout.
    pub fn new(repo: Arc<dyn Repository>, layout: RootLayout) -> Self {
        Self {
            inner: Arc::new(FactoryInner { repo, layout }),
        }
    }

    /// The backing repository.
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.inner.repo
    }

    /// The configured root layout.
    pub fn layout(&self) -> &RootLayout {
        &self.inner.layout
    }

    /// Capture a set of asset references for deferred resolution.
    ///
    /// Nothing resolves here; the returned collection holds the raw inputs
    /// until its context is supplied.
    pub fn create_asset<I, S>(
        &self,
        inputs: I,
        filters: Vec<String>,
        options: AssetOptions,
    ) -> DeferredAssetCollection
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
        DeferredAssetCollection::new(self.clone(), inputs, filters, options)
    }

    /// Capture a set of asset references for deferred name generation.
    ///
    /// The same two-phase contract as [`create_asset`](Self::create_asset),
    /// name-only. The result is shared, so it can also be passed along in
    /// [`AssetOptions::name`].
    pub fn generate_asset_name<I, S>(
        &self,
        inputs: I,
        filters: Vec<String>,
        options: AssetOptions,
    ) -> Arc<DeferredAssetName>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
        Arc::new(DeferredAssetName::new(
            self.clone(),
            inputs,
            filters,
            options,
        ))
    }

    /// Resolve a set of inputs against a now-known base directory.
    pub(crate) fn create_for_base_dir(
        &self,
        base_dir: Option<&str>,
        inputs: &[String],
        filters: &[String],
        options: &AssetOptions,
    ) -> AssetResult<AssetCollection> {
        let name = match &options.name {
            Some(AssetName::Fixed(name)) => name.clone(),
            Some(AssetName::Deferred(deferred)) => {
                // A pregenerated name resolves with the same context.
                deferred.ensure_context(base_dir)?;
                match deferred.get() {
                    Some(name) => name.to_string(),
                    None => {
                        return Err(AssetError::InvalidState(
                            "the pregenerated name failed to resolve".into(),
                        ));
                    }
                }
            }
            None => self.generate_name_for_base_dir(base_dir, inputs, filters, options)?,
        };

        let output = self.output_pattern(options);

        let mut nodes = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            let mut node = self.parse_input(input, base_dir, options)?;
            self.assign_leaf_target(&mut node, &output, &name, input, index + 1)?;
            nodes.push(node);
        }

        let mut collection =
            AssetCollection::new(name.clone(), nodes, filters.to_vec(), options.vars.clone());

        let mut target = output.replace('*', &name);
        let first_input = inputs.first().map(String::as_str).unwrap_or_default();
        if let Some(extension) = extension_of(first_input) {
            target = format!("{target}.{extension}");
        }
        collection.set_target_path(target)?;

        debug!(name = %collection.name(), inputs = inputs.len(), "created asset collection");
        Ok(collection)
    }

    /// The output pattern with placeholders added for declared variables.
    fn output_pattern(&self, options: &AssetOptions) -> String {
        let mut output = options
            .output
            .clone()
            .unwrap_or_else(|| format!("{}/*", self.inner.layout.output_dir));

        let missing: Vec<String> = options
            .vars
            .iter()
            .filter(|var| !output.contains(&format!("{{{var}}}")))
            .map(|var| format!("{{{var}}}"))
            .collect();
        if !missing.is_empty() {
            output = output.replace('*', &format!("*.{}", missing.join(".")));
        }

        output
    }

    fn assign_leaf_target(
        &self,
        node: &mut AssetNode,
        output: &str,
        name: &str,
        input: &str,
        position: usize,
    ) -> AssetResult<()> {
        let Some(stem) = Path::new(input).file_stem().and_then(|stem| stem.to_str()) else {
            return Ok(());
        };
        if stem.contains('*') {
            return Ok(());
        }

        let mut target = output.replace('*', &format!("{name}_{stem}_{position}"));
        if let Some(extension) = extension_of(input) {
            target = format!("{target}.{extension}");
        }

        match node {
            AssetNode::Resolved(ResolvedNode::Leaf(asset)) => asset.set_target_path(target),
            AssetNode::Resolved(ResolvedNode::Glob(_)) => Ok(()),
            AssetNode::Deferred(deferred) => deferred.set_target_path(target),
        }
    }

    /// Generate the canonical name for a set of inputs and a base directory.
    pub(crate) fn generate_name_for_base_dir(
        &self,
        base_dir: Option<&str>,
        inputs: &[String],
        filters: &[String],
        options: &AssetOptions,
    ) -> AssetResult<String> {
        if let Some(name) = &options.name {
            match name {
                AssetName::Fixed(name) => return Ok(name.clone()),
                AssetName::Deferred(deferred) => {
                    deferred.ensure_context(base_dir)?;
                    if let Some(name) = deferred.get() {
                        return Ok(name.to_string());
                    }
                }
            }
        }

        let mut hasher = Sha256::new();
        for input in inputs {
            let normalized = self.normalize_for_identity(input, base_dir);
            hasher.update(normalized.as_bytes());
            hasher.update([0u8]);
        }
        for filter in filters {
            hasher.update(filter.as_bytes());
            hasher.update([1u8]);
        }
        for var in &options.vars {
            hasher.update(var.as_bytes());
            hasher.update([2u8]);
        }
        if let Some(root) = &options.root {
            hasher.update(root.to_string_lossy().as_bytes());
            hasher.update([3u8]);
        }
        if let Some(output) = &options.output {
            hasher.update(output.as_bytes());
            hasher.update([4u8]);
        }

        let digest = format!("{:x}", hasher.finalize());
        let length = self.inner.layout.name_length.min(digest.len());
        Ok(digest[..length].to_string())
    }

    /// Normalise an input for identity purposes only.
    ///
    /// The same physical resource, referenced by absolute repository path,
    /// base-directory-relative path or default-root-relative file path, must
    /// come out identical so the generated names match. Resolution never uses
    /// this form.
    fn normalize_for_identity(&self, input: &str, base_dir: Option<&str>) -> String {
        if input.starts_with('@') || input.starts_with("//") || input.contains("://") {
            return input.to_string();
        }

        let layout = &self.inner.layout;
        if let Some(relative) = paths::relative_to_root(Path::new(input), &layout.default_root) {
            return relative;
        }

        // Globs are opaque tokens for naming; never expand them.
        if input.contains('*') {
            return input.to_string();
        }

        let in_default_root = if paths::is_absolute(input) {
            PathBuf::from(input)
        } else {
            paths::join_root(&layout.default_root, input)
        };
        if in_default_root.is_file() {
            return input.to_string();
        }

        if base_dir.is_some() || paths::is_absolute(input) {
            let absolute = paths::make_absolute(input, base_dir.unwrap_or("/"));
            if let Ok(resource) = self.inner.repo.get(&absolute) {
                if let Some(fs_path) = resource.filesystem_path() {
                    if let Some(relative) = paths::relative_to_root(fs_path, &layout.default_root) {
                        return relative;
                    }
                }
                return resource.path().to_string();
            }
        }

        input.to_string()
    }

    /// Classify an input and either resolve it or defer until values arrive.
    pub(crate) fn parse_input(
        &self,
        input: &str,
        base_dir: Option<&str>,
        options: &AssetOptions,
    ) -> AssetResult<AssetNode> {
        let schemes = self.inner.repo.supported_schemes();
        match paths::classify(input, &schemes) {
            InputKind::RepositoryGlob | InputKind::RepositoryPath if !options.vars.is_empty() => {
                // Path candidates cannot be probed until the placeholders are
                // substituted; keep the reference and wait for the values.
                debug!(input, "deferring resolution until variable values are known");
                Ok(AssetNode::Deferred(DeferredAsset::new(
                    self.clone(),
                    input.to_string(),
                    base_dir,
                    options.clone(),
                )))
            }
            _ => self
                .parse_resolved(input, base_dir, options, &BTreeMap::new())
                .map(AssetNode::Resolved),
        }
    }

    /// Classify and resolve an input with all variable values known.
    pub(crate) fn parse_resolved(
        &self,
        input: &str,
        base_dir: Option<&str>,
        options: &AssetOptions,
        values: &BTreeMap<String, String>,
    ) -> AssetResult<ResolvedNode> {
        let schemes = self.inner.repo.supported_schemes();
        let leaf = |source| {
            ResolvedNode::Leaf(Asset::new(source, options.vars.clone(), values.clone()))
        };

        match paths::classify(input, &schemes) {
            InputKind::Reference(name) => {
                debug!(input, "classified as asset reference");
                Ok(leaf(AssetSource::Reference {
                    name: name.to_string(),
                }))
            }
            InputKind::Http => {
                debug!(input, "classified as HTTP asset");
                Ok(leaf(AssetSource::Http {
                    url: input.to_string(),
                }))
            }
            InputKind::SchemeUri(scheme) => {
                debug!(input, scheme, "classified as repository URI");
                Ok(leaf(AssetSource::Repository {
                    repo: self.inner.repo.clone(),
                    path: input.to_string(),
                }))
            }
            InputKind::FilesystemPath => {
                debug!(input, "classified as existing file");
                Ok(leaf(AssetSource::File {
                    root: None,
                    path: input.to_string(),
                }))
            }
            InputKind::RepositoryGlob => {
                let substituted = paths::substitute(input, &options.vars, values)?;
                let pattern = paths::make_absolute(&substituted, base_dir.unwrap_or("/"));
                debug!(input, pattern = %pattern, "classified as repository glob");
                Ok(ResolvedNode::Glob(GlobAsset::new(
                    self.inner.repo.clone(),
                    pattern,
                )))
            }
            InputKind::RepositoryPath => self.search_candidates(input, base_dir, options, values),
        }
    }

    /// Probe candidate locations for a path reference, in precedence order.
    fn search_candidates(
        &self,
        input: &str,
        base_dir: Option<&str>,
        options: &AssetOptions,
        values: &BTreeMap<String, String>,
    ) -> AssetResult<ResolvedNode> {
        let substituted = paths::substitute(input, &options.vars, values)?;
        let leaf = |source| {
            ResolvedNode::Leaf(Asset::new(source, options.vars.clone(), values.clone()))
        };
        let mut searched = Vec::new();

        if paths::is_absolute(&substituted) {
            for root in self.search_roots(options) {
                // Prefer the raw input for the stored path so placeholders survive
                // into the asset; the root prefix itself never contains them.
                if let Some(relative) = paths::relative_to_root(Path::new(input), &root)
                    .or_else(|| paths::relative_to_root(Path::new(&substituted), &root))
                {
                    trace!(input, root = %root.display(), "absolute path matched root");
                    return Ok(leaf(AssetSource::File {
                        root: Some(root),
                        path: relative,
                    }));
                }
                searched.push(root.display().to_string());
            }

            if Path::new(&substituted).is_file() {
                trace!(input, "absolute path exists on the file system");
                return Ok(leaf(AssetSource::File {
                    root: None,
                    path: input.to_string(),
                }));
            }

            if self.inner.repo.contains(&substituted) {
                trace!(input, "absolute path found in the repository");
                return Ok(leaf(AssetSource::Repository {
                    repo: self.inner.repo.clone(),
                    path: input.to_string(),
                }));
            }
            searched.push("repository".to_string());

            return Err(AssetError::NotFound {
                input: input.to_string(),
                searched,
            });
        }

        // Relative references prefer content colocated with the referencing
        // template over same-named files under the configured roots.
        if let Some(base) = base_dir {
            let absolute = paths::make_absolute(&substituted, base);
            if self.inner.repo.contains(&absolute) {
                trace!(input, base, "relative path found in the repository");
                return Ok(leaf(AssetSource::Repository {
                    repo: self.inner.repo.clone(),
                    path: paths::make_absolute(input, base),
                }));
            }
            searched.push(base.to_string());
        }

        for root in self.search_roots(options) {
            let candidate = paths::join_root(&root, &substituted);
            if candidate.is_file() {
                trace!(input, root = %root.display(), "relative path found under root");
                return Ok(leaf(AssetSource::File {
                    root: Some(root),
                    path: input.to_string(),
                }));
            }
            searched.push(root.display().to_string());
        }

        Err(AssetError::NotFound {
            input: input.to_string(),
            searched,
        })
    }

    /// Roots to search, in precedence order: the per-asset override, the
    /// configured extra roots, then the default root.
    fn search_roots(&self, options: &AssetOptions) -> Vec<PathBuf> {
        let layout = &self.inner.layout;
        options
            .root
            .iter()
            .chain(layout.extra_roots.iter())
            .chain(std::iter::once(&layout.default_root))
            .cloned()
            .collect()
    }
}

fn extension_of(input: &str) -> Option<String> {
    Path::new(input)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string)
}
