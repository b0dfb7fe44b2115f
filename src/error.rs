//! Error taxonomy for asset classification, resolution and naming.

use thiserror::Error;

/// Generic result type used across the crate.
pub type AssetResult<T> = Result<T, AssetError>;

/// Errors surfaced while resolving or loading assets.
///
/// All errors are synchronous and local. Resolution is idempotent on
/// failure, so none of these variants warrant a retry.
#[derive(Debug, Error)]
pub enum AssetError {
    /// No candidate location satisfied the reference.
    #[error("no asset found for {input:?} (searched: {})", .searched.join(", "))]
    NotFound {
        /// The reference that failed to resolve.
        input: String,
        /// Every directory probed, in precedence order.
        searched: Vec<String>,
    },
    /// A one-shot operation ran twice, or an accessor ran too early.
    #[error("{0}")]
    InvalidState(String),
    /// A target path is missing the placeholder for a declared variable.
    #[error("the target path {target_path:?} must contain the variable {{{var}}}")]
    MissingPlaceholder {
        /// The offending target path.
        target_path: String,
        /// The declared variable lacking a placeholder.
        var: String,
    },
    /// A declared variable has no value in the supplied context.
    #[error("no value was supplied for the variable {{{name}}} in {input:?}")]
    MissingVariable {
        /// The reference containing the placeholder.
        input: String,
        /// The unsatisfied variable name.
        name: String,
    },
    /// A URI carries a scheme the repository does not support.
    #[error("the scheme {scheme:?} is not supported by the repository")]
    UnknownScheme {
        /// The unsupported scheme.
        scheme: String,
    },
    /// The repository holds nothing at the given path.
    #[error("no resource exists at repository path {path:?}")]
    ResourceNotFound {
        /// The missing repository path.
        path: String,
    },
    /// A content-bearing resource was expected but not found.
    #[error("the resource at {path:?} is not a file")]
    NotAFile {
        /// The repository path of the non-file resource.
        path: String,
    },
    /// Reading an asset from disk failed.
    #[error("failed to read {path:?}")]
    Io {
        /// The file system path that caused the error.
        path: String,
        /// Source I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl AssetError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
