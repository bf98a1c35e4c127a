use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParfindError {
    // Traversal
    #[error("access denied")]
    AccessDenied(PathBuf),

    #[error("path too long")]
    PathTooLong(PathBuf),

    #[error("path not found")]
    NotFound(PathBuf),

    // Config
    #[error("invalid root")]
    InvalidRoot(PathBuf),

    #[error("no search root configured")]
    MissingRoot,

    #[error("expected exactly one search root")]
    SingleRootRequired,

    #[error("invalid pattern")]
    InvalidPattern(String),

    // Runtime
    #[error("search canceled")]
    Canceled,

    #[error("session already started")]
    AlreadyStarted,

    #[error("IO error")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Subscriber extensibility
    #[error("handler error")]
    Handler(String),
}

impl ParfindError {
    /// The path this error occurred at, if applicable.
    /// Callers use this to present "Skipped: <path>" without pattern matching on variants.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::AccessDenied(p)
            | Self::PathTooLong(p)
            | Self::NotFound(p)
            | Self::InvalidRoot(p)
            | Self::Io { path: p, .. } => Some(p),
            _ => None,
        }
    }

    /// Whether a traversal branch may be abandoned quietly after this error.
    ///
    /// Transient errors (access denied, overlong paths, vanished directories,
    /// listing IO failures) terminate only the affected branch — sibling
    /// branches keep walking and the search still completes.
    ///
    /// Everything else is a configuration or session-level failure and is
    /// surfaced to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::AccessDenied(_) | Self::PathTooLong(_) | Self::NotFound(_) | Self::Io { .. }
        )
    }
}
