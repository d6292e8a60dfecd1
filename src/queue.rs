//! Ordered audio clip playback queue
//!
//! Clips arrive as handles from independent, retryable fetches but must
//! play strictly in enqueue order. A single worker task owns the queue
//! and drives at most one fetch or playback at a time; commands from the
//! session are applied between entries, so a clear can never interrupt
//! mid-playback audio.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::client::{ClipFetch, ClipStore};
use crate::voice::AudioSink;

/// What the queue is doing right now
///
/// Published on every transition for UI indicators; this is an
/// observation channel, not a control input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing queued or in flight
    #[default]
    Idle,
    /// Fetching the next clip (possibly retrying a not-ready response)
    Fetching,
    /// A clip is playing
    Playing,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching => write!(f, "fetching"),
            Self::Playing => write!(f, "playing"),
        }
    }
}

/// A queued clip reference
#[derive(Debug, Clone)]
struct QueueEntry {
    handle: String,
    enqueue_order: u64,
}

/// Commands from the session to the queue worker
#[derive(Debug)]
enum QueueCommand {
    Enqueue(String),
    Clear,
}

/// Caller-side handle to a running playback queue
#[derive(Debug, Clone)]
pub struct QueueHandle {
    commands: mpsc::UnboundedSender<QueueCommand>,
    state: watch::Receiver<PlaybackState>,
}

impl QueueHandle {
    /// Append a clip to the tail of the queue
    pub fn enqueue(&self, handle: impl Into<String>) {
        if self.commands.send(QueueCommand::Enqueue(handle.into())).is_err() {
            tracing::warn!("playback queue is gone; dropping clip");
        }
    }

    /// Discard every queued-but-unstarted clip
    ///
    /// Each discarded handle gets a best-effort cancellation; anything
    /// already fetching or playing finishes naturally.
    pub fn clear(&self) {
        if self.commands.send(QueueCommand::Clear).is_err() {
            tracing::warn!("playback queue is gone; clear ignored");
        }
    }

    /// Current playback state
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        *self.state.borrow()
    }

    /// Subscribe to playback state transitions
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }
}

/// The queue worker
pub struct PlaybackQueue<S, A> {
    entries: VecDeque<QueueEntry>,
    store: S,
    sink: A,
    state: PlaybackState,
    state_tx: watch::Sender<PlaybackState>,
    retry_delay: Duration,
    next_order: u64,
}

impl<S, A> PlaybackQueue<S, A>
where
    S: ClipStore + 'static,
    A: AudioSink + 'static,
{
    /// Spawn a queue worker, returning the caller handle and the worker task
    #[must_use]
    pub fn spawn(store: S, sink: A, retry_delay: Duration) -> (QueueHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PlaybackState::Idle);

        let queue = Self {
            entries: VecDeque::new(),
            store,
            sink,
            state: PlaybackState::Idle,
            state_tx,
            retry_delay,
            next_order: 0,
        };

        let worker = tokio::spawn(queue.run(commands_rx));

        (
            QueueHandle {
                commands: commands_tx,
                state: state_rx,
            },
            worker,
        )
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<QueueCommand>) {
        loop {
            if self.entries.is_empty() {
                let Some(command) = commands.recv().await else {
                    break;
                };
                self.apply(command).await;
                continue;
            }

            // apply whatever arrived while the previous clip was playing
            // before committing to the next entry
            while let Ok(command) = commands.try_recv() {
                self.apply(command).await;
            }

            if let Some(entry) = self.entries.pop_front() {
                self.play_entry(entry).await;
            }
        }

        tracing::debug!("playback queue stopped");
    }

    async fn apply(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::Enqueue(handle) => {
                let entry = QueueEntry {
                    handle,
                    enqueue_order: self.next_order,
                };
                self.next_order += 1;

                tracing::debug!(
                    handle = %entry.handle,
                    order = entry.enqueue_order,
                    queued = self.entries.len() + 1,
                    "clip enqueued"
                );
                self.entries.push_back(entry);
            }
            QueueCommand::Clear => {
                let discarded = std::mem::take(&mut self.entries);
                tracing::debug!(discarded = discarded.len(), "playback queue cleared");

                for entry in discarded {
                    self.store.cancel(&entry.handle).await;
                }
            }
        }
    }

    /// Fetch and play one entry, always advancing past it
    async fn play_entry(&mut self, entry: QueueEntry) {
        self.set_state(PlaybackState::Fetching);

        let clip = loop {
            match self.store.fetch(&entry.handle).await {
                Ok(ClipFetch::Ready(bytes)) => break Some(bytes),
                Ok(ClipFetch::NotReady) => {
                    tracing::trace!(handle = %entry.handle, "clip not ready, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    // fatal for this clip only; the queue must not stall
                    tracing::warn!(
                        handle = %entry.handle,
                        order = entry.enqueue_order,
                        error = %e,
                        "dropping clip after fetch error"
                    );
                    break None;
                }
            }
        };

        if let Some(bytes) = clip {
            self.set_state(PlaybackState::Playing);
            if let Err(e) = self.sink.play(&bytes).await {
                tracing::warn!(handle = %entry.handle, error = %e, "clip playback failed");
            }
        }

        self.set_state(PlaybackState::Idle);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            tracing::debug!(from = %self.state, to = %state, "playback state");
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }
}
