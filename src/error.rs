//! Error types for the substitution pipeline.

use thiserror::Error;

use crate::dom::{DomError, NodeId};
use crate::selector::SelectorError;

/// Boxed error returned by pluggable collaborators (renderers, rasterizers,
/// output documents). Kept boxed so the triggering error can be downcast by
/// the caller instead of being flattened into a string.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`ResourceLoader`](crate::gate::ResourceLoader).
///
/// Cloneable so a single in-flight load can hand the same outcome to every
/// caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The resource could not be fetched.
    #[error("could not fetch {url}: {message}")]
    Network { url: String, message: String },

    /// The resource was fetched but its contents are unusable.
    #[error("could not parse {url}: {message}")]
    Parse { url: String, message: String },
}

/// Errors that abort a generation call.
#[derive(Error, Debug)]
pub enum Error {
    /// A required engine resource failed to load.
    #[error("failed to load resource `{resource}`: {source}")]
    ResourceLoad {
        resource: String,
        #[source]
        source: LoadError,
    },

    /// A sub-element could not be captured to an image.
    #[error("failed to rasterize element {element}")]
    Rasterization {
        element: NodeId,
        #[source]
        source: BoxError,
    },

    /// The text-layout renderer failed on the modified document.
    #[error("text renderer failed")]
    Render(#[source] BoxError),

    /// The output document rejected a captured image.
    #[error("output document rejected an image")]
    Output(#[source] BoxError),

    /// The output document could not be finalized.
    #[error("failed to save `{filename}`")]
    Save {
        filename: String,
        #[source]
        source: BoxError,
    },

    /// Layout computation failed.
    #[error("layout failed: {0}")]
    Layout(String),

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Dom(#[from] DomError),

    /// The requested root is not an element of the document.
    #[error("node {0} is not an element")]
    InvalidRoot(NodeId),

    /// Options or manifest JSON could not be parsed.
    #[error("invalid options: {0}")]
    Options(String),
}
