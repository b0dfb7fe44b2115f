//! Project configuration loader describing the resolver's root layout.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "assets.config.json";

/// Discoverable project configuration describing root directories and naming output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Directory relative references fall back to when no other candidate matches.
    pub default_root: String,
    /// Additional root directories searched, in order, before the default root.
    pub extra_roots: Vec<String>,
    /// Output directory prefix used when deriving target paths.
    pub output_dir: String,
    /// Length of generated canonical names, in hex characters.
    pub name_length: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_root: ".".into(),
            extra_roots: Vec::new(),
            output_dir: "assets".into(),
            name_length: 8,
        }
    }
}

impl ResolverConfig {
    /// Attempt to load configuration from the provided directory.
    ///
    /// When the configuration file does not exist or fails to parse we fallback to default
    /// values so downstream callers can continue operating with sensible assumptions.
    pub fn discover(project_dir: &Path) -> Self {
        let candidate = project_dir.join(DEFAULT_CONFIG_FILE);
        Self::from_path(&candidate).unwrap_or_default()
    }

    /// Read configuration from a specific JSON file.
    pub fn from_path(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Convert the configuration into an owned layout anchored at a project directory.
    pub fn into_layout(self, project_dir: &Path) -> RootLayout {
        RootLayout {
            default_root: project_dir.join(&self.default_root),
            extra_roots: self
                .extra_roots
                .iter()
                .map(|root| project_dir.join(root))
                .collect(),
            output_dir: self.output_dir,
            name_length: self.name_length,
        }
    }
}

/// Resolved root layout used by the asset factory at runtime.
#[derive(Debug, Clone)]
pub struct RootLayout {
    /// Directory searched last for relative references, and the anchor for
    /// canonical (identity) paths.
    pub default_root: PathBuf,
    /// Additional roots searched before the default root, in listed order.
    pub extra_roots: Vec<PathBuf>,
    /// Output directory prefix used when deriving target paths.
    pub output_dir: String,
    /// Length of generated canonical names, in hex characters.
    pub name_length: usize,
}

impl RootLayout {
    /// Layout rooted at a single default directory with standard naming options.
    pub fn new(default_root: impl Into<PathBuf>) -> Self {
        Self {
            default_root: default_root.into(),
            extra_roots: Vec::new(),
            output_dir: "assets".into(),
            name_length: 8,
        }
    }

    /// Add an extra root searched before the default root.
    pub fn with_extra_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.extra_roots.push(root.into());
        self
    }
}
