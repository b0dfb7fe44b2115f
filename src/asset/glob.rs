//! Lazy expansion of wildcard references.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use crate::asset::{Asset, AssetSource};
use crate::error::{AssetError, AssetResult};
use crate::repository::Repository;

/// A wildcard reference expanding to the matching repository files.
///
/// Expansion runs at most once per instance and is memoized; any `{variable}`
/// placeholders were already substituted into the pattern before the glob was
/// created, so the produced leaves carry no variables of their own.
pub struct GlobAsset {
    repo: Arc<dyn Repository>,
    pattern: String,
    filters: Vec<String>,
    expanded: Option<Vec<Asset>>,
}

impl fmt::Debug for GlobAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobAsset")
            .field("pattern", &self.pattern)
            .field("expanded", &self.expanded.is_some())
            .finish()
    }
}

impl GlobAsset {
    pub(crate) fn new(repo: Arc<dyn Repository>, pattern: String) -> Self {
        Self {
            repo,
            pattern,
            filters: Vec::new(),
            expanded: None,
        }
    }

    /// The absolute, fully substituted glob pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns `true` once the glob has been expanded.
    pub fn is_expanded(&self) -> bool {
        self.expanded.is_some()
    }

    /// Append a filter, forwarding to already expanded leaves.
    pub fn ensure_filter(&mut self, filter: &str) {
        if !self.filters.iter().any(|f| f == filter) {
            self.filters.push(filter.to_string());
        }
        if let Some(leaves) = &mut self.expanded {
            for leaf in leaves {
                leaf.ensure_filter(filter);
            }
        }
    }

    fn ensure_expanded(&mut self) {
        if self.expanded.is_some() {
            return;
        }

        // Non-file matches carry no content and are skipped.
        let mut leaves = Vec::new();
        for resource in self.repo.find(&self.pattern) {
            if !resource.is_file() {
                continue;
            }

            let mut leaf = Asset::new(
                AssetSource::Resource { resource },
                Vec::new(),
                BTreeMap::new(),
            );
            for filter in &self.filters {
                leaf.ensure_filter(filter);
            }
            leaves.push(leaf);
        }

        debug!(pattern = %self.pattern, leaves = leaves.len(), "expanded glob");
        self.expanded = Some(leaves);
    }

    /// The leaf assets matching the pattern, expanding on first access.
    pub fn leaves_mut(&mut self) -> AssetResult<&mut Vec<Asset>> {
        self.ensure_expanded();
        Ok(self.expanded.get_or_insert_with(Vec::new))
    }

    /// Load every matching leaf.
    pub fn load(&mut self) -> AssetResult<()> {
        for leaf in self.leaves_mut()? {
            leaf.load()?;
        }
        Ok(())
    }

    /// The most recent modification time across all matches.
    pub fn last_modified(&mut self) -> AssetResult<SystemTime> {
        let pattern = self.pattern.clone();
        let mut latest: Option<SystemTime> = None;
        for leaf in self.leaves_mut()? {
            let modified = leaf.last_modified()?;
            latest = Some(match latest {
                Some(current) if current >= modified => current,
                _ => modified,
            });
        }

        latest.ok_or(AssetError::NotFound {
            input: pattern,
            searched: vec!["repository".to_string()],
        })
    }
}
