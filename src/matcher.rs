use std::fmt;
use std::sync::Arc;

use globset::Glob;

use crate::entry::Entry;
use crate::error::ParfindError;

// ---------------------------------------------------------------------------
// SearchTarget
// ---------------------------------------------------------------------------

/// Which side of a directory listing the matcher is applied to.
///
/// File and directory searches share one traversal algorithm; the target only
/// selects the candidate set at each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchTarget {
    /// Match the files (and other non-directory entries) of each level.
    #[default]
    Files,

    /// Match the subdirectories of each level.
    Directories,
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// Decides whether one entry belongs in the results.
///
/// A matcher is either a glob pattern or a predicate — the two forms are
/// mutually exclusive. Patterns are evaluated against the entry *name*
/// (the final path component), the way a shell matches `*.txt` inside one
/// directory; predicates receive the whole [`Entry`] and may inspect the path
/// or stat the file themselves.
///
/// Matchers are shared across branches and called concurrently, so predicates
/// must be `Send + Sync`.
///
/// # Example
///
/// ```rust
/// use parfind::{Entry, Matcher};
///
/// let by_name = Matcher::pattern("*.txt").unwrap();
/// let by_len = Matcher::predicate(|entry: &Entry| entry.name.len() > 8);
/// ```
pub struct Matcher(MatcherKind);

enum MatcherKind {
    Pattern(globset::GlobMatcher),
    Predicate(Arc<dyn Fn(&Entry) -> bool + Send + Sync>),
}

impl Matcher {
    /// Compile a glob pattern matcher.
    ///
    /// # Errors
    ///
    /// Returns [`ParfindError::InvalidPattern`] for an empty or malformed
    /// pattern. Compilation happens here, never mid-walk.
    pub fn pattern(pattern: impl AsRef<str>) -> Result<Self, ParfindError> {
        let pattern = pattern.as_ref();

        if pattern.is_empty() {
            return Err(ParfindError::InvalidPattern(pattern.to_string()));
        }

        let glob = Glob::new(pattern)
            .map_err(|_| ParfindError::InvalidPattern(pattern.to_string()))?;

        Ok(Matcher(MatcherKind::Pattern(glob.compile_matcher())))
    }

    /// Wrap a predicate matcher.
    pub fn predicate(is_valid: impl Fn(&Entry) -> bool + Send + Sync + 'static) -> Self {
        Matcher(MatcherKind::Predicate(Arc::new(is_valid)))
    }

    pub(crate) fn is_match(&self, entry: &Entry) -> bool {
        match &self.0 {
            MatcherKind::Pattern(glob) => glob.is_match(&entry.name),
            MatcherKind::Predicate(is_valid) => is_valid(entry),
        }
    }
}

impl Clone for Matcher {
    fn clone(&self) -> Self {
        match &self.0 {
            MatcherKind::Pattern(glob) => Matcher(MatcherKind::Pattern(glob.clone())),
            MatcherKind::Predicate(is_valid) => {
                Matcher(MatcherKind::Predicate(Arc::clone(is_valid)))
            }
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            MatcherKind::Pattern(glob) => f.debug_tuple("Pattern").field(&glob.glob()).finish(),
            MatcherKind::Predicate(_) => f.write_str("Predicate"),
        }
    }
}
