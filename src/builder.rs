use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::dispatch::DispatchMode;
use crate::entry::Entry;
use crate::error::ParfindError;
use crate::events::{FoundBatch, SearchOutcome};
use crate::matcher::{Matcher, SearchTarget};
use crate::session::{MultiRootSession, SearchSession, SessionConfig};
use crate::source::{EntrySource, FsEntrySource};

// ---------------------------------------------------------------------------
// SearchBuilder
// ---------------------------------------------------------------------------

/// Entry point for configuring a search session.
///
/// Created via [`parfind::search()`](crate::search). Configure with chained
/// setters, then call [`build()`](SearchBuilder::build) for a single-root
/// [`SearchSession`] or [`build_multi()`](SearchBuilder::build_multi) for a
/// [`MultiRootSession`]. All validation — root existence, pattern
/// compilation — happens at build time, never mid-walk.
///
/// Subscription is single-owner and happens here, before the session exists;
/// there is no way to add or remove handlers once a search is running.
///
/// # Example
///
/// ```rust,ignore
/// let session = parfind::search()
///     .root("/data")
///     .pattern("*.csv")
///     .dispatch(DispatchMode::Deferred)
///     .on_found(|batch| { ingest(batch); Ok(()) })
///     .on_completed(|outcome| println!("{outcome:?}"))
///     .build()?;
/// ```
pub struct SearchBuilder {
    roots: Vec<PathBuf>,
    matcher: Option<MatcherSpec>,
    target: SearchTarget,
    dispatch: DispatchMode,
    suppress_cancellation: bool,
    cancel: Option<CancelToken>,
    on_found: Option<crate::dispatch::FoundHandler>,
    on_completed: Option<crate::dispatch::CompletedHandler>,
    source: Option<Arc<dyn EntrySource>>,
}

/// Pattern strings are kept raw until `build()` so compilation errors land
/// there, with the rest of the validation.
enum MatcherSpec {
    Built(Matcher),
    Pattern(String),
}

impl Default for SearchBuilder {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            matcher: None,
            target: SearchTarget::Files,
            dispatch: DispatchMode::Inline,
            suppress_cancellation: true,
            cancel: None,
            on_found: None,
            on_completed: None,
            source: None,
        }
    }
}

impl SearchBuilder {
    // ── Roots ─────────────────────────────────────────────────────────────

    /// Add one root directory to search beneath.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Add several root directories. Roots are searched independently;
    /// matches under overlapping roots are not deduplicated.
    pub fn roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.roots.extend(roots.into_iter().map(Into::into));
        self
    }

    // ── Matcher ───────────────────────────────────────────────────────────

    /// Match entry names against a glob pattern, e.g. `*.txt`.
    ///
    /// Replaces any previously configured matcher — pattern and predicate are
    /// mutually exclusive. Without either, everything matches (pattern `*`).
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.matcher = Some(MatcherSpec::Pattern(pattern.into()));
        self
    }

    /// Match entries with a predicate.
    ///
    /// Replaces any previously configured matcher. The predicate is called
    /// concurrently from multiple branches.
    pub fn predicate(mut self, is_valid: impl Fn(&Entry) -> bool + Send + Sync + 'static) -> Self {
        self.matcher = Some(MatcherSpec::Built(Matcher::predicate(is_valid)));
        self
    }

    /// Set a prebuilt [`Matcher`]. Replaces any previously configured one.
    pub fn matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = Some(MatcherSpec::Built(matcher));
        self
    }

    // ── Options ───────────────────────────────────────────────────────────

    /// Search for files (the default) or for directories.
    pub fn target(mut self, target: SearchTarget) -> Self {
        self.target = target;
        self
    }

    /// Where handlers run: inline on the discovering branch (the default) or
    /// deferred onto the worker pool behind a completion barrier.
    pub fn dispatch(mut self, mode: DispatchMode) -> Self {
        self.dispatch = mode;
        self
    }

    /// Whether a canceled run is reported as `Ok(SearchOutcome::Canceled)`
    /// (`true`, the default) or re-raised as `Err(ParfindError::Canceled)`
    /// from `start()` (`false`).
    pub fn suppress_cancellation(mut self, yes: bool) -> Self {
        self.suppress_cancellation = yes;
        self
    }

    /// Attach a cancel token, making the session cancellable.
    ///
    /// Keep a clone to cancel from anywhere; `stop()` on the session sets the
    /// same token. Without a token the walk skips its cancellation
    /// checkpoints entirely.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    // ── Subscribers ───────────────────────────────────────────────────────

    /// Register the found-batch handler.
    ///
    /// Invoked once per non-empty batch, possibly concurrently from several
    /// branches. Return `Err(ParfindError::Canceled)` to have the failure
    /// treated as a cancellation; any other error is fatal to the session.
    pub fn on_found(
        mut self,
        handler: impl Fn(FoundBatch) -> Result<(), ParfindError> + Send + Sync + 'static,
    ) -> Self {
        self.on_found = Some(Arc::new(handler));
        self
    }

    /// Register the completion handler, invoked exactly once with the
    /// terminal outcome — after every branch and every deferred delivery has
    /// finished.
    pub fn on_completed(mut self, handler: impl Fn(SearchOutcome) + Send + Sync + 'static) -> Self {
        self.on_completed = Some(Arc::new(handler));
        self
    }

    /// Replace the default filesystem lister with a custom [`EntrySource`].
    ///
    /// With a custom source the builder skips its root-existence check — the
    /// source defines its own namespace.
    pub fn source(mut self, source: impl EntrySource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    // ── Build ─────────────────────────────────────────────────────────────

    /// Validate the configuration and produce a single-root session.
    ///
    /// # Errors
    ///
    /// [`ParfindError::MissingRoot`] with no root configured,
    /// [`ParfindError::SingleRootRequired`] with more than one (use
    /// [`build_multi()`](SearchBuilder::build_multi)),
    /// [`ParfindError::InvalidRoot`] when the root is not an existing
    /// directory, [`ParfindError::InvalidPattern`] when the glob does not
    /// compile.
    pub fn build(self) -> Result<SearchSession, ParfindError> {
        let SearchBuilder {
            mut roots,
            matcher,
            target,
            dispatch,
            suppress_cancellation,
            cancel,
            on_found,
            on_completed,
            source,
        } = self;

        let root = match roots.len() {
            0 => return Err(ParfindError::MissingRoot),
            1 => roots.remove(0),
            _ => return Err(ParfindError::SingleRootRequired),
        };

        if source.is_none() {
            check_root(&root)?;
        }

        Ok(SearchSession::new(SessionConfig {
            root,
            source: source.unwrap_or_else(|| Arc::new(FsEntrySource)),
            matcher: compile_matcher(matcher)?,
            target,
            dispatch,
            suppress_cancellation,
            cancel,
            on_found,
            on_completed,
        }))
    }

    /// Validate the configuration and produce a multi-root session.
    ///
    /// Multi-root searches are always cancellable: a fresh [`CancelToken`] is
    /// created when none was supplied. Each root becomes an inner session
    /// sharing the token and the found handler; the aggregate owns the single
    /// completion handler.
    pub fn build_multi(self) -> Result<MultiRootSession, ParfindError> {
        let SearchBuilder {
            roots,
            matcher,
            target,
            dispatch,
            suppress_cancellation,
            cancel,
            on_found,
            on_completed,
            source,
        } = self;

        if roots.is_empty() {
            return Err(ParfindError::MissingRoot);
        }

        if source.is_none() {
            for root in &roots {
                check_root(root)?;
            }
        }

        let source = source.unwrap_or_else(|| Arc::new(FsEntrySource));
        let matcher = compile_matcher(matcher)?;
        let cancel = cancel.unwrap_or_default();

        let sessions = roots
            .into_iter()
            .map(|root| {
                SearchSession::new(SessionConfig {
                    root,
                    source: Arc::clone(&source),
                    matcher: matcher.clone(),
                    target,
                    dispatch,
                    // Inner cancellations must surface so the aggregate can
                    // stop the remaining roots; the aggregate applies the
                    // caller's suppression itself.
                    suppress_cancellation: false,
                    cancel: Some(cancel.clone()),
                    on_found: on_found.clone(),
                    on_completed: None,
                })
            })
            .collect();

        Ok(MultiRootSession::new(
            sessions,
            cancel,
            suppress_cancellation,
            on_completed,
        ))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_root(root: &Path) -> Result<(), ParfindError> {
    if root.as_os_str().is_empty() || !root.is_dir() {
        return Err(ParfindError::InvalidRoot(root.to_path_buf()));
    }
    Ok(())
}

/// Default matcher: match everything, like a bare `*` pattern.
fn compile_matcher(spec: Option<MatcherSpec>) -> Result<Matcher, ParfindError> {
    match spec {
        None => Matcher::pattern("*"),
        Some(MatcherSpec::Pattern(pattern)) => Matcher::pattern(pattern),
        Some(MatcherSpec::Built(matcher)) => Ok(matcher),
    }
}
