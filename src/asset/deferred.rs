//! Proxies for assets and names that resolve once their context arrives.
//!
//! A reference is captured before the base directory of the enclosing template
//! (and the values of any declared variables) are known. The proxies here hold
//! the raw reference until that context is supplied, resolve exactly once, and
//! forward everything else to the resolved inner object.
//!
//! Two contracts apply. The collection proxy is strict: any accessor used
//! before context was supplied fails with `InvalidState`. The single-asset
//! proxy stores its context at creation and resolves lazily on first access,
//! because its remaining blocker is variable values, not the base directory.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, OnceLock};
use std::time::SystemTime;

use tracing::debug;

use crate::asset::{Asset, AssetCollection, ResolvedNode};
use crate::error::{AssetError, AssetResult};
use crate::factory::{AssetFactory, AssetOptions};
use crate::paths;

const CONTEXT_REQUIRED: &str = "the resolution context must be supplied first";
const CONTEXT_ONCE: &str = "the resolution context must be supplied only once";

/// A single asset whose reference still contains `{variable}` placeholders.
///
/// The base directory is already known; resolution waits for the variable
/// values. [`set_values`](Self::set_values) resolves immediately, and any
/// accessor that needs the inner asset resolves with the values known so far.
#[derive(Debug)]
pub struct DeferredAsset {
    pending: Option<Box<PendingAsset>>,
    resolved: Option<ResolvedNode>,
}

#[derive(Debug)]
struct PendingAsset {
    factory: AssetFactory,
    input: String,
    base_dir: Option<String>,
    options: AssetOptions,
    values: BTreeMap<String, String>,
    filters: Vec<String>,
    content: Option<Vec<u8>>,
    target_path: Option<String>,
}

impl DeferredAsset {
    pub(crate) fn new(
        factory: AssetFactory,
        input: String,
        base_dir: Option<&str>,
        options: AssetOptions,
    ) -> Self {
        Self {
            pending: Some(Box::new(PendingAsset {
                factory,
                input,
                base_dir: base_dir.map(str::to_string),
                options,
                values: BTreeMap::new(),
                filters: Vec::new(),
                content: None,
                target_path: None,
            })),
            resolved: None,
        }
    }

    /// Returns `true` once the inner asset exists.
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// The raw reference before resolution, the resolved notation afterwards.
    pub fn source_path(&self) -> String {
        match (&self.resolved, &self.pending) {
            (Some(node), _) => node.source_path(),
            (None, Some(pending)) => pending.input.clone(),
            (None, None) => String::new(),
        }
    }

    /// Variable names declared for this asset.
    pub fn vars(&self) -> Vec<String> {
        match (&self.resolved, &self.pending) {
            (Some(ResolvedNode::Leaf(asset)), _) => asset.vars().to_vec(),
            (Some(ResolvedNode::Glob(_)), _) => Vec::new(),
            (None, Some(pending)) => pending.options.vars.clone(),
            (None, None) => Vec::new(),
        }
    }

    /// Current variable values.
    pub fn values(&self) -> BTreeMap<String, String> {
        match (&self.resolved, &self.pending) {
            (Some(ResolvedNode::Leaf(asset)), _) => asset.values().clone(),
            (None, Some(pending)) => pending.values.clone(),
            _ => BTreeMap::new(),
        }
    }

    /// Supply the variable values and resolve the inner asset.
    ///
    /// Fails with `InvalidState` once the inner asset exists.
    pub fn set_values(&mut self, values: BTreeMap<String, String>) -> AssetResult<()> {
        if self.resolved.is_some() {
            return Err(AssetError::InvalidState(
                "the variable values must not be changed once the inner asset was created".into(),
            ));
        }

        match &mut self.pending {
            Some(pending) => pending.values = values,
            None => return Err(AssetError::InvalidState(CONTEXT_REQUIRED.into())),
        }

        self.force()
    }

    /// Resolve the inner asset with the context known so far.
    fn force(&mut self) -> AssetResult<()> {
        if self.resolved.is_some() {
            return Ok(());
        }

        let Some(pending) = self.pending.take() else {
            return Err(AssetError::InvalidState(CONTEXT_REQUIRED.into()));
        };

        let result = pending.factory.parse_resolved(
            &pending.input,
            pending.base_dir.as_deref(),
            &pending.options,
            &pending.values,
        );

        let mut node = match result {
            Ok(node) => node,
            Err(err) => {
                // Resolution is idempotent on failure; keep the reference so a
                // later attempt reports the same error.
                self.pending = Some(pending);
                return Err(err);
            }
        };

        for filter in &pending.filters {
            node.ensure_filter(filter);
        }
        if let Some(content) = pending.content {
            node.set_content(content)?;
        }
        if let Some(target_path) = pending.target_path {
            node.set_target_path(target_path)?;
        }

        debug!(input = %pending.input, "resolved deferred asset");
        self.resolved = Some(node);
        Ok(())
    }

    /// The resolved inner node, if resolution already happened.
    pub fn resolved_node(&self) -> Option<&ResolvedNode> {
        self.resolved.as_ref()
    }

    /// Append a filter, staging it until the inner asset exists.
    pub fn ensure_filter(&mut self, filter: &str) {
        match (&mut self.resolved, &mut self.pending) {
            (Some(node), _) => node.ensure_filter(filter),
            (None, Some(pending)) => {
                if !pending.filters.iter().any(|f| f == filter) {
                    pending.filters.push(filter.to_string());
                }
            }
            (None, None) => {}
        }
    }

    /// Preset the content, staging it until the inner asset exists.
    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) -> AssetResult<()> {
        match (&mut self.resolved, &mut self.pending) {
            (Some(node), _) => node.set_content(content.into()),
            (None, Some(pending)) => {
                pending.content = Some(content.into());
                Ok(())
            }
            (None, None) => Err(AssetError::InvalidState(CONTEXT_REQUIRED.into())),
        }
    }

    /// Content bytes, once loaded or preset.
    pub fn content(&self) -> Option<&[u8]> {
        match (&self.resolved, &self.pending) {
            (Some(ResolvedNode::Leaf(asset)), _) => asset.content(),
            (None, Some(pending)) => pending.content.as_deref(),
            _ => None,
        }
    }

    /// Target output path, staged or resolved.
    pub fn target_path(&self) -> Option<&str> {
        match (&self.resolved, &self.pending) {
            (Some(ResolvedNode::Leaf(asset)), _) => asset.target_path(),
            (None, Some(pending)) => pending.target_path.as_deref(),
            _ => None,
        }
    }

    /// Set the target output path.
    ///
    /// The path must contain a placeholder for every declared variable; a
    /// missing placeholder fails here, before resolution.
    pub fn set_target_path(&mut self, target_path: impl Into<String>) -> AssetResult<()> {
        let target_path = target_path.into();
        match (&mut self.resolved, &mut self.pending) {
            (Some(node), _) => node.set_target_path(target_path),
            (None, Some(pending)) => {
                paths::validate_target_path(&target_path, &pending.options.vars)?;
                pending.target_path = Some(target_path);
                Ok(())
            }
            (None, None) => Err(AssetError::InvalidState(CONTEXT_REQUIRED.into())),
        }
    }

    /// Load the inner asset, resolving first when necessary.
    pub fn load(&mut self) -> AssetResult<()> {
        self.force()?;
        match &mut self.resolved {
            Some(node) => node.load(),
            None => Err(AssetError::InvalidState(CONTEXT_REQUIRED.into())),
        }
    }

    /// The last modification time of the inner asset, resolving first when
    /// necessary.
    pub fn last_modified(&mut self) -> AssetResult<SystemTime> {
        self.force()?;
        match &mut self.resolved {
            Some(ResolvedNode::Leaf(asset)) => asset.last_modified(),
            Some(ResolvedNode::Glob(glob)) => glob.last_modified(),
            None => Err(AssetError::InvalidState(CONTEXT_REQUIRED.into())),
        }
    }

    pub(crate) fn collect_leaves<'a>(
        &'a mut self,
        out: &mut Vec<&'a mut Asset>,
    ) -> AssetResult<()> {
        self.force()?;
        match &mut self.resolved {
            Some(ResolvedNode::Leaf(asset)) => out.push(asset),
            Some(ResolvedNode::Glob(glob)) => out.extend(glob.leaves_mut()?.iter_mut()),
            None => return Err(AssetError::InvalidState(CONTEXT_REQUIRED.into())),
        }
        Ok(())
    }
}

/// A collection of assets captured before the base directory is known.
///
/// The raw inputs are held until [`supply_context`](Self::supply_context)
/// provides the base directory; resolution then runs exactly once. Every
/// accessor fails with `InvalidState` while the context is outstanding.
#[derive(Debug)]
pub struct DeferredAssetCollection {
    pending: Option<Box<PendingCollection>>,
    inner: Option<AssetCollection>,
}

#[derive(Debug)]
struct PendingCollection {
    factory: AssetFactory,
    inputs: Vec<String>,
    filters: Vec<String>,
    options: AssetOptions,
}

impl DeferredAssetCollection {
    pub(crate) fn new(
        factory: AssetFactory,
        inputs: Vec<String>,
        filters: Vec<String>,
        options: AssetOptions,
    ) -> Self {
        Self {
            pending: Some(Box::new(PendingCollection {
                factory,
                inputs,
                filters,
                options,
            })),
            inner: None,
        }
    }

    /// Supply the base directory of the enclosing template and resolve.
    ///
    /// `None` means no template directory encloses the reference; relative
    /// inputs then skip the repository and go straight to the configured roots.
    /// Fails with `InvalidState` when called twice.
    pub fn supply_context(&mut self, base_dir: Option<&str>) -> AssetResult<()> {
        self.resolve(base_dir, None)
    }

    /// Supply the base directory together with variable values.
    ///
    /// Equivalent to [`supply_context`](Self::supply_context) followed by
    /// forwarding the values to every node.
    pub fn supply_context_with_values(
        &mut self,
        base_dir: Option<&str>,
        values: BTreeMap<String, String>,
    ) -> AssetResult<()> {
        self.resolve(base_dir, Some(values))
    }

    fn resolve(
        &mut self,
        base_dir: Option<&str>,
        values: Option<BTreeMap<String, String>>,
    ) -> AssetResult<()> {
        if self.inner.is_some() {
            return Err(AssetError::InvalidState(CONTEXT_ONCE.into()));
        }

        let Some(pending) = &self.pending else {
            return Err(AssetError::InvalidState(CONTEXT_ONCE.into()));
        };

        let mut collection = pending.factory.create_for_base_dir(
            base_dir,
            &pending.inputs,
            &pending.filters,
            &pending.options,
        )?;

        if let Some(values) = values {
            collection.set_values(values)?;
        }

        // The captured reference is no longer needed.
        self.pending = None;
        self.inner = Some(collection);
        Ok(())
    }

    /// Returns `true` once the context was supplied.
    pub fn is_resolved(&self) -> bool {
        self.inner.is_some()
    }

    /// The resolved collection.
    pub fn collection(&self) -> AssetResult<&AssetCollection> {
        self.inner
            .as_ref()
            .ok_or_else(|| AssetError::InvalidState(CONTEXT_REQUIRED.into()))
    }

    /// Mutable access to the resolved collection.
    pub fn collection_mut(&mut self) -> AssetResult<&mut AssetCollection> {
        self.inner
            .as_mut()
            .ok_or_else(|| AssetError::InvalidState(CONTEXT_REQUIRED.into()))
    }

    /// Canonical name of the resolved collection.
    pub fn name(&self) -> AssetResult<&str> {
        Ok(self.collection()?.name())
    }

    /// Target output path of the resolved collection.
    pub fn target_path(&self) -> AssetResult<Option<&str>> {
        Ok(self.collection()?.target_path())
    }

    /// Supply variable values to every node of the resolved collection.
    pub fn set_values(&mut self, values: BTreeMap<String, String>) -> AssetResult<()> {
        self.collection_mut()?.set_values(values)
    }

    /// Load every node of the resolved collection.
    pub fn load(&mut self) -> AssetResult<()> {
        self.collection_mut()?.load()
    }

    /// Concatenated content of the resolved collection.
    pub fn content(&mut self) -> AssetResult<Vec<u8>> {
        self.collection_mut()?.content()
    }

    /// The most recent modification time across the resolved collection.
    pub fn last_modified(&mut self) -> AssetResult<SystemTime> {
        self.collection_mut()?.last_modified()
    }
}

/// A canonical name captured before the base directory is known.
///
/// Shared between the caller and any asset options referencing it, hence the
/// interior one-shot cell. Resolution runs exactly once; a second explicit
/// [`supply_context`](Self::supply_context) fails with `InvalidState`.
pub struct DeferredAssetName {
    pending: Mutex<Option<PendingName>>,
    name: OnceLock<String>,
}

struct PendingName {
    factory: AssetFactory,
    inputs: Vec<String>,
    filters: Vec<String>,
    options: AssetOptions,
}

impl fmt::Debug for DeferredAssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredAssetName")
            .field("name", &self.name.get())
            .finish()
    }
}

impl DeferredAssetName {
    pub(crate) fn new(
        factory: AssetFactory,
        inputs: Vec<String>,
        filters: Vec<String>,
        options: AssetOptions,
    ) -> Self {
        Self {
            pending: Mutex::new(Some(PendingName {
                factory,
                inputs,
                filters,
                options,
            })),
            name: OnceLock::new(),
        }
    }

    /// Supply the base directory and generate the name.
    ///
    /// Fails with `InvalidState` when the name was already generated.
    pub fn supply_context(&self, base_dir: Option<&str>) -> AssetResult<()> {
        if self.name.get().is_some() {
            return Err(AssetError::InvalidState(CONTEXT_ONCE.into()));
        }
        self.resolve(base_dir)
    }

    /// Generate the name unless it already exists.
    pub(crate) fn ensure_context(&self, base_dir: Option<&str>) -> AssetResult<()> {
        if self.name.get().is_some() {
            return Ok(());
        }
        self.resolve(base_dir)
    }

    fn resolve(&self, base_dir: Option<&str>) -> AssetResult<()> {
        let mut guard = self
            .pending
            .lock()
            .map_err(|_| AssetError::InvalidState("the deferred name state is poisoned".into()))?;

        let Some(pending) = guard.take() else {
            return Err(AssetError::InvalidState(CONTEXT_ONCE.into()));
        };

        match pending.factory.generate_name_for_base_dir(
            base_dir,
            &pending.inputs,
            &pending.filters,
            &pending.options,
        ) {
            Ok(name) => {
                let _ = self.name.set(name);
                Ok(())
            }
            Err(err) => {
                *guard = Some(pending);
                Err(err)
            }
        }
    }

    /// The generated name, once the context was supplied.
    pub fn get(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }
}

impl fmt::Display for DeferredAssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.get() {
            Some(name) => f.write_str(name),
            None => Ok(()),
        }
    }
}
