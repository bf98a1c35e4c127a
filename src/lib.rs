//! # parfind
//!
//! Parallel recursive file and directory search with cooperative cancellation.
//!
//! parfind walks one or more directory trees, fanning independent subtrees out
//! across a shared worker pool, and reports matches *as they are discovered* —
//! one non-empty [`FoundBatch`] per directory level, followed by exactly one
//! terminal [`SearchOutcome`]. A search can be stopped mid-flight through a
//! [`CancelToken`]; cancellation is cooperative, observed at well-defined
//! checkpoints in the walk rather than preemptively.
//!
//! Notifications are delivered under one of two [`DispatchMode`]s: `Inline`
//! (on the discovering branch's thread) or `Deferred` (each batch as its own
//! pooled task, reconciled by a completion barrier before the outcome is
//! signaled).
//!
//! # Quick Start
//!
//! ```rust
//! use std::fs;
//! use std::sync::{Arc, Mutex};
//!
//! let dir = tempfile::tempdir().unwrap();
//! fs::write(dir.path().join("invoice_jan.txt"), "").unwrap();
//! fs::write(dir.path().join("invoice_feb.txt"), "").unwrap();
//! fs::write(dir.path().join("report.md"), "").unwrap();
//!
//! let found = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&found);
//!
//! let session = parfind::search()
//!     .root(dir.path())
//!     .pattern("*.txt")
//!     .on_found(move |batch| {
//!         sink.lock().unwrap().extend(batch.entries);
//!         Ok(())
//!     })
//!     .build()
//!     .unwrap();
//!
//! let outcome = session.start().unwrap();
//! assert_eq!(outcome, parfind::SearchOutcome::Completed);
//! assert_eq!(found.lock().unwrap().len(), 2);
//! ```
//!
//! # Cancellation
//!
//! Attach a [`CancelToken`] and keep a clone; setting it from any thread ends
//! the search at the next checkpoint. By default a canceled run reports
//! `Ok(SearchOutcome::Canceled)`; opt into `suppress_cancellation(false)` to
//! receive `Err(ParfindError::Canceled)` instead.
//!
//! ```rust,ignore
//! let token = CancelToken::new();
//! let session = parfind::search()
//!     .root("/big/tree")
//!     .pattern("*.iso")
//!     .cancel_token(token.clone())
//!     .on_found(|batch| { consume(batch); Ok(()) })
//!     .build()?;
//!
//! // elsewhere: token.cancel();
//! let outcome = session.start()?;   // SearchOutcome::Canceled
//! ```
//!
//! # Custom Sources and Matchers
//!
//! Traversal is generic over an [`EntrySource`] (what lists a directory's
//! children) and a [`Matcher`] (a glob pattern or a predicate):
//!
//! ```rust,ignore
//! struct ArchiveSource { /* ... */ }
//!
//! impl EntrySource for ArchiveSource {
//!     fn list_children(&self, dir: &Path) -> Result<Listing, ParfindError> {
//!         // list one archive directory's immediate children
//!     }
//! }
//!
//! let session = parfind::search()
//!     .root("/")
//!     .source(ArchiveSource { /* ... */ })
//!     .predicate(|entry| entry.name.starts_with("core."))
//!     .build()?;
//! ```

#![forbid(unsafe_code)]

mod builder;
mod cancel;
mod dispatch;
mod engine;
mod entry;
mod error;
mod events;
mod matcher;
mod session;
mod source;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use builder::SearchBuilder;
pub use cancel::CancelToken;
pub use dispatch::DispatchMode;
pub use entry::{Entry, EntryKind};
pub use error::ParfindError;
pub use events::{FoundBatch, SearchOutcome};
pub use matcher::{Matcher, SearchTarget};
pub use session::{MultiRootSession, SearchSession, SessionState};
pub use source::{EntrySource, FsEntrySource, Listing};

use std::path::Path;
use std::sync::{Arc, Mutex};

// ── Entry point ───────────────────────────────────────────────────────────────

/// Create a new [`SearchBuilder`] to configure and run a search.
///
/// # Example
///
/// ```rust
/// use std::fs;
///
/// let dir = tempfile::tempdir().unwrap();
/// fs::write(dir.path().join("keep.txt"), "").unwrap();
///
/// let session = parfind::search()
///     .root(dir.path())
///     .pattern("*.txt")
///     .build()
///     .unwrap();
///
/// assert_eq!(session.start().unwrap(), parfind::SearchOutcome::Completed);
/// ```
pub fn search() -> SearchBuilder {
    SearchBuilder::default()
}

// ── One-shot conveniences ─────────────────────────────────────────────────────

/// Search `root` for files matching `pattern`, blocking until done, and
/// return every match as one collection.
///
/// A thin composition over [`search()`]: an inline session with an
/// accumulating handler, run to completion.
///
/// # Example
///
/// ```rust
/// use std::fs;
///
/// let dir = tempfile::tempdir().unwrap();
/// fs::write(dir.path().join("a.txt"), "").unwrap();
/// fs::write(dir.path().join("b.log"), "").unwrap();
///
/// let hits = parfind::find_files(dir.path(), "*.txt").unwrap();
/// assert_eq!(hits.len(), 1);
/// ```
pub fn find_files(root: impl AsRef<Path>, pattern: &str) -> Result<Vec<Entry>, ParfindError> {
    run_and_collect(search().root(root.as_ref()).pattern(pattern))
}

/// Search `root` for directories whose names match `pattern`, blocking until
/// done, and return every match as one collection.
pub fn find_directories(
    root: impl AsRef<Path>,
    pattern: &str,
) -> Result<Vec<Entry>, ParfindError> {
    run_and_collect(
        search()
            .root(root.as_ref())
            .pattern(pattern)
            .target(SearchTarget::Directories),
    )
}

fn run_and_collect(builder: SearchBuilder) -> Result<Vec<Entry>, ParfindError> {
    let found = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&found);

    let session = builder
        .on_found(move |batch| {
            let mut entries = sink
                .lock()
                .map_err(|_| ParfindError::Handler("collector mutex poisoned".into()))?;
            entries.extend(batch.entries);
            Ok(())
        })
        .build()?;

    session.start()?;

    // The session holds the only other clone of the accumulator.
    drop(session);

    Ok(Arc::try_unwrap(found)
        .unwrap_or_default()
        .into_inner()
        .unwrap_or_default())
}
