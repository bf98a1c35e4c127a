use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;

use crate::cancel::CancelToken;
use crate::engine::Interrupt;
use crate::error::ParfindError;
use crate::events::{FoundBatch, SearchOutcome};

// ---------------------------------------------------------------------------
// DispatchMode
// ---------------------------------------------------------------------------

/// Where found-batch and completion handlers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// The discovering branch invokes handlers directly, on its own thread.
    /// Handlers must tolerate concurrent invocation from sibling branches.
    #[default]
    Inline,

    /// Each batch becomes an independent unit of pooled work. The session's
    /// completion barrier waits for every unit before the outcome is
    /// delivered.
    Deferred,
}

// ---------------------------------------------------------------------------
// Handler types
// ---------------------------------------------------------------------------

/// Found-batch subscriber. Fallible so a subscriber fault is a typed value:
/// `Err(ParfindError::Canceled)` is treated as cancellation, anything else as
/// a fatal fault per [`Dispatcher::finish`].
pub(crate) type FoundHandler = Arc<dyn Fn(FoundBatch) -> Result<(), ParfindError> + Send + Sync>;

/// Completion subscriber, invoked with the terminal outcome exactly once.
pub(crate) type CompletedHandler = Arc<dyn Fn(SearchOutcome) + Send + Sync>;

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Delivers notifications under one of the two policies, selected at
/// construction. One dispatcher lives for exactly one run: built when the
/// session starts, consumed by [`finish`](Dispatcher::finish).
pub(crate) enum Dispatcher {
    Inline {
        on_found: Option<FoundHandler>,
        on_completed: Option<CompletedHandler>,
    },
    Deferred {
        on_found: Option<FoundHandler>,
        on_completed: Option<CompletedHandler>,
        cancel: Option<CancelToken>,
        /// Cloned into every pooled unit; dropping the last clone closes the
        /// channel, which is what lets the barrier drain to disconnect.
        done_tx: Sender<Result<(), ParfindError>>,
        done_rx: Receiver<Result<(), ParfindError>>,
    },
}

impl Dispatcher {
    pub(crate) fn new(
        mode: DispatchMode,
        on_found: Option<FoundHandler>,
        on_completed: Option<CompletedHandler>,
        cancel: Option<CancelToken>,
    ) -> Self {
        match mode {
            DispatchMode::Inline => Dispatcher::Inline {
                on_found,
                on_completed,
            },
            DispatchMode::Deferred => {
                let (done_tx, done_rx) = unbounded();
                Dispatcher::Deferred {
                    on_found,
                    on_completed,
                    cancel,
                    done_tx,
                    done_rx,
                }
            }
        }
    }

    /// Deliver one batch under the configured policy.
    ///
    /// Inline: the handler runs here, on the discovering branch's thread, and
    /// its failure interrupts that branch. Deferred: the batch is handed to
    /// the worker pool and any failure is reconciled later at the barrier;
    /// this call itself cannot fail.
    pub(crate) fn emit(&self, batch: FoundBatch) -> Result<(), Interrupt> {
        match self {
            Dispatcher::Inline { on_found, .. } => match on_found {
                None => Ok(()),
                Some(handler) => match handler(batch) {
                    Ok(()) => Ok(()),
                    Err(ParfindError::Canceled) => Err(Interrupt::Canceled),
                    Err(err) => Err(Interrupt::Fault(err)),
                },
            },
            Dispatcher::Deferred {
                on_found,
                cancel,
                done_tx,
                ..
            } => {
                if let Some(handler) = on_found {
                    let handler = Arc::clone(handler);
                    let token = cancel.clone();
                    let done = done_tx.clone();

                    rayon::spawn(move || {
                        // A unit that finds the token already set reports
                        // cancellation without invoking the handler at all.
                        let delivered = match token {
                            Some(token) if token.is_canceled() => Err(ParfindError::Canceled),
                            _ => handler(batch),
                        };
                        let _ = done.send(delivered);
                    });
                }
                Ok(())
            }
        }
    }

    /// The completion barrier.
    ///
    /// Under deferred dispatch this blocks until every pooled unit has
    /// finished, then reconciles their results: cancellation-class failures
    /// fold the outcome to [`SearchOutcome::Canceled`]; the first other
    /// failure is re-raised and the completion handler is *not* invoked.
    ///
    /// The completion handler observes the final outcome exactly once, after
    /// which no further batch can be delivered.
    pub(crate) fn finish(self, outcome: SearchOutcome) -> Result<SearchOutcome, ParfindError> {
        match self {
            Dispatcher::Inline { on_completed, .. } => {
                if let Some(handler) = on_completed {
                    handler(outcome);
                }
                Ok(outcome)
            }
            Dispatcher::Deferred {
                on_completed,
                done_tx,
                done_rx,
                ..
            } => {
                drop(done_tx);

                let mut outcome = outcome;
                let mut fault = None;

                while let Ok(delivered) = done_rx.recv() {
                    match delivered {
                        Ok(()) => {}
                        Err(ParfindError::Canceled) => outcome = SearchOutcome::Canceled,
                        Err(err) => {
                            debug!("deferred handler fault: {}", err);
                            if fault.is_none() {
                                fault = Some(err);
                            }
                        }
                    }
                }

                if let Some(err) = fault {
                    return Err(err);
                }

                if let Some(handler) = on_completed {
                    handler(outcome);
                }
                Ok(outcome)
            }
        }
    }
}
