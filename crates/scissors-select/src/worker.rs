//! Background execution of path searches.
//!
//! [`SearchTask`] runs one [`shortest_paths`] call on a dedicated thread and
//! hands progress and the finished [`ShortestPaths`] back to the foreground
//! through a channel. Only the worker thread writes to the predecessor map
//! while it is being built; the foreground receives it whole.
//!
//! Every task carries a `generation` stamp that is echoed in its messages,
//! so the owner can recognise results from a search it has since replaced.
//! Cancelling a task sets its [`CancelToken`] and joins the thread, so once
//! [`SearchTask::cancel`] returns the search has observably stopped.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::cost::CostModel;
use crate::search::{CancelToken, SearchWindow, ShortestPaths, shortest_paths};
use crate::types::{Point, SelectionError};

/// A message from a running search.
#[derive(Debug)]
pub enum SearchMessage {
    /// Percentage of the search window settled so far.
    Progress {
        /// Stamp of the task that sent this message.
        generation: u64,
        /// `0..=100`.
        percent: u8,
    },
    /// The search ended. This is the last message a task sends.
    Finished {
        /// Stamp of the task that sent this message.
        generation: u64,
        /// The finished maps, or why there are none.
        result: Result<ShortestPaths, SelectionError>,
    },
}

/// Parameters for one background search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Link costs over the source image.
    pub cost: Arc<CostModel>,
    /// Root of the search.
    pub seed: Point,
    /// Optional bound on the explored region.
    pub window: Option<SearchWindow>,
    /// Minimum percentage increase between progress messages.
    pub progress_step: u8,
    /// Stamp echoed in every message.
    pub generation: u64,
}

/// A path search running on its own thread.
#[derive(Debug)]
pub struct SearchTask {
    generation: u64,
    seed: Point,
    cancel: CancelToken,
    receiver: Receiver<SearchMessage>,
    handle: Option<JoinHandle<()>>,
}

impl SearchTask {
    /// Start searching on a new thread.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::Io`] if the thread cannot be spawned.
    pub fn spawn(request: SearchRequest) -> Result<Self, SelectionError> {
        let SearchRequest {
            cost,
            seed,
            window,
            progress_step,
            generation,
        } = request;
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let (sender, receiver) = mpsc::channel();

        let handle = thread::Builder::new()
            .name(format!("scissors-search-{generation}"))
            .spawn(move || {
                let step = progress_step.max(1);
                let mut last_sent = 0_u8;
                let result = shortest_paths(cost.as_ref(), seed, window, &token, |percent| {
                    if percent == 100 || percent >= last_sent.saturating_add(step) {
                        last_sent = percent;
                        sender
                            .send(SearchMessage::Progress {
                                generation,
                                percent,
                            })
                            .ok();
                    }
                });
                // The receiver may already be gone if the owner cancelled.
                sender
                    .send(SearchMessage::Finished { generation, result })
                    .ok();
            })?;

        log::debug!("spawned search {generation} from {seed}");
        Ok(Self {
            generation,
            seed,
            cancel,
            receiver,
            handle: Some(handle),
        })
    }

    /// Stamp given at spawn time.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Root of the search.
    #[must_use]
    pub const fn seed(&self) -> Point {
        self.seed
    }

    /// The next pending message, without blocking.
    ///
    /// Returns `None` when nothing is pending or the task has ended.
    #[must_use]
    pub fn try_message(&self) -> Option<SearchMessage> {
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// The next message, blocking until one arrives.
    ///
    /// Returns `None` once the task has sent everything it will send.
    #[must_use]
    pub fn wait_message(&self) -> Option<SearchMessage> {
        self.receiver.recv().ok()
    }

    /// Ask the search to stop and wait until its thread has exited.
    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("search {} panicked", self.generation);
            } else {
                log::debug!("search {} stopped", self.generation);
            }
        }
    }
}

impl Drop for SearchTask {
    fn drop(&mut self) {
        self.stop();
    }
}
