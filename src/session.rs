use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use log::debug;
use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::dispatch::{CompletedHandler, Dispatcher, DispatchMode, FoundHandler};
use crate::engine::{Interrupt, WalkContext};
use crate::error::ParfindError;
use crate::events::SearchOutcome;
use crate::matcher::{Matcher, SearchTarget};
use crate::source::EntrySource;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle of a [`SearchSession`]: `Idle → Running → {Completed, Canceled}`.
/// Terminal states are final — no retries, no resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Canceled,
}

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const CANCELED: u8 = 3;

fn state_from_raw(raw: u8) -> SessionState {
    match raw {
        IDLE => SessionState::Idle,
        RUNNING => SessionState::Running,
        COMPLETED => SessionState::Completed,
        _ => SessionState::Canceled,
    }
}

// ---------------------------------------------------------------------------
// SearchSession
// ---------------------------------------------------------------------------

/// One run's immutable configuration, assembled by the builder.
pub(crate) struct SessionConfig {
    pub root: PathBuf,
    pub source: Arc<dyn EntrySource>,
    pub matcher: Matcher,
    pub target: SearchTarget,
    pub dispatch: DispatchMode,
    pub suppress_cancellation: bool,
    pub cancel: Option<CancelToken>,
    pub on_found: Option<FoundHandler>,
    pub on_completed: Option<CompletedHandler>,
}

/// One logical search over one root.
///
/// Created by [`SearchBuilder::build`](crate::SearchBuilder::build), started
/// at most once. [`start`](SearchSession::start) blocks until the outcome;
/// call [`stop`](SearchSession::stop) from another thread (or cancel a shared
/// [`CancelToken`]) to end the run early.
///
/// # Example
///
/// ```rust,ignore
/// let session = parfind::search()
///     .root("/var/log")
///     .pattern("*.log")
///     .on_found(|batch| {
///         for entry in &batch.entries {
///             println!("{}", entry.path.display());
///         }
///         Ok(())
///     })
///     .cancel_token(token.clone())
///     .build()?;
///
/// let outcome = session.start()?;
/// ```
pub struct SearchSession {
    config: SessionConfig,
    state: AtomicU8,
}

impl SearchSession {
    pub(crate) fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(IDLE),
        }
    }

    /// Run the search to its terminal outcome. Blocking.
    ///
    /// Seeds the fan-out from the root, walks every branch on the shared
    /// worker pool, then drains deferred notifications before the completion
    /// handler observes the outcome. Under [`DispatchMode::Deferred`] do not
    /// call this from inside the pool itself — the completion barrier blocks.
    ///
    /// # Errors
    ///
    /// - [`ParfindError::AlreadyStarted`] if the session left `Idle` before.
    /// - [`ParfindError::Canceled`] if the run was canceled and the session
    ///   was built with `suppress_cancellation(false)`; with suppression the
    ///   same situation returns `Ok(SearchOutcome::Canceled)`.
    /// - Any non-cancellation error a found handler returned, re-raised after
    ///   the barrier drained. The completion handler is not invoked then.
    pub fn start(&self) -> Result<SearchOutcome, ParfindError> {
        self.state
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ParfindError::AlreadyStarted)?;

        debug!("search started at {}", self.config.root.display());

        let dispatcher = Dispatcher::new(
            self.config.dispatch,
            self.config.on_found.clone(),
            self.config.on_completed.clone(),
            self.config.cancel.clone(),
        );

        let ctx = WalkContext {
            source: self.config.source.as_ref(),
            matcher: &self.config.matcher,
            target: self.config.target,
            cancel: self.config.cancel.as_ref(),
            dispatcher: &dispatcher,
        };

        match run_branches(&ctx, &self.config.root) {
            Ok(()) => {
                // Walks exhausted; a deferred unit may still fold to Canceled.
                let outcome = dispatcher.finish(SearchOutcome::Completed)?;
                self.store_terminal(outcome);
                debug!("search at {} finished: {:?}", self.config.root.display(), outcome);
                Ok(outcome)
            }
            Err(Interrupt::Canceled) => {
                debug!("search canceled at {}", self.config.root.display());
                let outcome = dispatcher.finish(SearchOutcome::Canceled)?;
                self.store_terminal(outcome);
                if self.config.suppress_cancellation {
                    Ok(outcome)
                } else {
                    Err(ParfindError::Canceled)
                }
            }
            Err(Interrupt::Fault(err)) => Err(err),
        }
    }

    /// Request cancellation and return immediately — does not wait for the
    /// walk to unwind. Idempotent; calling it again, or after the session
    /// reached a terminal state, has no further effect. On a session built
    /// without a cancel token this is a no-op.
    pub fn stop(&self) {
        match &self.config.cancel {
            Some(token) => token.cancel(),
            None => debug!("stop() on a session without a cancel token; ignored"),
        }
    }

    /// The session's current lifecycle state.
    pub fn state(&self) -> SessionState {
        state_from_raw(self.state.load(Ordering::SeqCst))
    }

    /// The cancel token this session observes, if it was built with one.
    pub fn cancel_token(&self) -> Option<CancelToken> {
        self.config.cancel.clone()
    }

    fn store_terminal(&self, outcome: SearchOutcome) {
        let raw = match outcome {
            SearchOutcome::Completed => COMPLETED,
            SearchOutcome::Canceled => CANCELED,
        };
        self.state.store(raw, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// Two-level fan-out: seed the root, then in parallel seed each level-1
/// branch, then in parallel walk each level-2 seed. `try_for_each`
/// short-circuits, so once one branch reports cancellation, untaken branches
/// are never started.
fn run_branches(ctx: &WalkContext<'_>, root: &Path) -> Result<(), Interrupt> {
    let level_one = ctx.seed(root)?;
    debug!(
        "fan-out at {}: {} level-1 branches",
        root.display(),
        level_one.len()
    );

    level_one.par_iter().try_for_each(|branch| {
        let level_two = ctx.seed(&branch.path)?;
        level_two
            .par_iter()
            .try_for_each(|sub| ctx.walk(&sub.path))
    })
}

// ---------------------------------------------------------------------------
// MultiRootSession
// ---------------------------------------------------------------------------

/// Independent searches over several roots, aggregated into one outcome.
///
/// Roots run one after another, each as its own [`SearchSession`] sharing one
/// cancel token and the same found handler; the aggregate fires a single
/// completion. Cancellation of any root marks the whole aggregate
/// [`SearchOutcome::Canceled`] — batches already delivered by roots that
/// finished stay valid. Matches are not deduplicated across overlapping
/// roots.
pub struct MultiRootSession {
    sessions: Vec<SearchSession>,
    cancel: CancelToken,
    suppress_cancellation: bool,
    on_completed: Option<CompletedHandler>,
}

impl MultiRootSession {
    pub(crate) fn new(
        sessions: Vec<SearchSession>,
        cancel: CancelToken,
        suppress_cancellation: bool,
        on_completed: Option<CompletedHandler>,
    ) -> Self {
        Self {
            sessions,
            cancel,
            suppress_cancellation,
            on_completed,
        }
    }

    /// Run every root to its outcome. Blocking.
    ///
    /// A cancellation observed in any root stops the remaining roots (they
    /// share the token) and the aggregate completes as Canceled. A fatal
    /// handler fault propagates immediately without firing the aggregate
    /// completion.
    pub fn start(&self) -> Result<SearchOutcome, ParfindError> {
        let mut canceled = false;

        for session in &self.sessions {
            match session.start() {
                Ok(SearchOutcome::Completed) => {}
                Ok(SearchOutcome::Canceled) => canceled = true,
                Err(ParfindError::Canceled) => {
                    canceled = true;
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        let outcome = if canceled {
            SearchOutcome::Canceled
        } else {
            SearchOutcome::Completed
        };

        if let Some(handler) = &self.on_completed {
            handler(outcome);
        }

        if canceled && !self.suppress_cancellation {
            return Err(ParfindError::Canceled);
        }
        Ok(outcome)
    }

    /// Request cancellation of every root. Asynchronous and idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// The shared token all roots observe.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}
