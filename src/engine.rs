use std::path::Path;

use log::debug;

use crate::cancel::CancelToken;
use crate::dispatch::Dispatcher;
use crate::entry::Entry;
use crate::error::ParfindError;
use crate::events::FoundBatch;
use crate::matcher::{Matcher, SearchTarget};
use crate::source::{EntrySource, Listing};

// ---------------------------------------------------------------------------
// Interrupt
// ---------------------------------------------------------------------------

/// Why a branch stopped before exhausting its subtree.
///
/// Cancellation travels as a value, not a panic: every recursive call and
/// every fan-out task returns it through `Result`, and only the session
/// boundary converts it into a caller-visible error.
pub(crate) enum Interrupt {
    /// The cancel token was observed set at a checkpoint.
    Canceled,

    /// An inline-dispatched handler reported a non-cancellation failure.
    Fault(ParfindError),
}

// ---------------------------------------------------------------------------
// WalkContext
// ---------------------------------------------------------------------------

/// The capability set one search run threads through its traversal:
/// a lister, a matcher, a target side, an optional cancel token, and the
/// dispatcher receiving batches.
///
/// Borrowed by every branch; all fields must outlive the whole fan-out, which
/// the blocking `start()` call guarantees by scope.
pub(crate) struct WalkContext<'a> {
    pub source: &'a dyn EntrySource,
    pub matcher: &'a Matcher,
    pub target: SearchTarget,
    pub cancel: Option<&'a CancelToken>,
    pub dispatcher: &'a Dispatcher,
}

impl WalkContext<'_> {
    /// Fail fast if cancellation has been requested. Never blocks.
    ///
    /// Checked at four points: before listing a level, after listing, before
    /// recursing into each child, and before emitting a batch. A session built
    /// without a token skips the read entirely.
    fn checkpoint(&self) -> Result<(), Interrupt> {
        match self.cancel {
            Some(token) if token.is_canceled() => Err(Interrupt::Canceled),
            _ => Ok(()),
        }
    }

    fn level_candidates<'l>(&self, listing: &'l Listing) -> &'l [Entry] {
        match self.target {
            SearchTarget::Files => &listing.files,
            SearchTarget::Directories => &listing.dirs,
        }
    }

    /// Match this level's candidates and emit one batch if any matched.
    /// Empty levels emit nothing.
    fn emit_level(&self, listing: &Listing) -> Result<(), Interrupt> {
        let hits: Vec<Entry> = self
            .level_candidates(listing)
            .iter()
            .filter(|entry| self.matcher.is_match(entry))
            .cloned()
            .collect();

        if hits.is_empty() {
            return Ok(());
        }

        self.checkpoint()?;

        self.dispatcher.emit(FoundBatch { entries: hits })
    }

    // ── walk ──────────────────────────────────────────────────────────────

    /// Recursive depth-first traversal of one branch.
    ///
    /// Emission is post-order: every child subtree is walked (sequentially —
    /// parallelism is introduced only at the fan-out seam in the session, not
    /// here) before the containing level's own batch goes out. A listing
    /// failure ends the branch with no batch and no propagation.
    pub fn walk(&self, dir: &Path) -> Result<(), Interrupt> {
        self.checkpoint()?;

        let listing = match self.source.list_children(dir) {
            Ok(listing) => listing,
            Err(err) => {
                debug!("branch ended at {}: {}", dir.display(), err);
                return Ok(());
            }
        };

        self.checkpoint()?;

        if listing.dirs.is_empty() {
            return self.emit_level(&listing);
        }

        for child in &listing.dirs {
            self.checkpoint()?;
            self.walk(&child.path)?;
        }

        self.emit_level(&listing)
    }

    // ── seed ──────────────────────────────────────────────────────────────

    /// Start-level partitioner: descend from `dir` until a level with more
    /// than one child directory (the fan-out seeds) or none (a leaf).
    ///
    /// Single-child chains are walked down rather than fanned out, and every
    /// level visited on the way — branching, leaf, or chain link — has its
    /// matches emitted exactly once here; the seeds themselves are later
    /// consumed by [`walk`](WalkContext::walk).
    pub fn seed(&self, dir: &Path) -> Result<Vec<Entry>, Interrupt> {
        self.checkpoint()?;

        let listing = match self.source.list_children(dir) {
            Ok(listing) => listing,
            Err(err) => {
                debug!("seed stopped at {}: {}", dir.display(), err);
                return Ok(Vec::new());
            }
        };

        self.emit_level(&listing)?;

        match listing.dirs.len() {
            0 => Ok(Vec::new()),
            1 => self.seed(&listing.dirs[0].path),
            _ => Ok(listing.dirs),
        }
    }
}
