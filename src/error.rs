use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when reading or parsing a feed document
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed feed XML at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Feed ended before <{name}> was closed")]
    UnclosedElement { name: String },

    #[error("Found </{name}> without a matching open element")]
    UnexpectedClose { name: String },

    #[error("Feed contains no root element")]
    MissingRoot,

    #[error("Found a second root element <{name}>")]
    MultipleRoots { name: String },

    #[error("Found text outside the root element")]
    TextOutsideRoot,

    #[error("Feed nesting exceeds the maximum depth of {limit} elements")]
    TooDeep { limit: usize },

    #[error("Feed is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Errors reported by a chapter generation model.
///
/// These never reach callers of [`crate::ModelExtractor`], which maps every
/// failure to an empty result.
#[derive(Error, Debug, Clone)]
pub enum ModelError {
    #[error("Chapter model is unavailable: {0}")]
    Unavailable(String),

    #[error("Chapter generation failed: {0}")]
    Generation(String),
}
