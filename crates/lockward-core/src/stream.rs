// ── Reactive presented-state stream ──
//
// Subscription handle over an engine's owned state cache.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::PresentedState;

/// A subscription to one engine's presented state.
///
/// Provides point-in-time access plus change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`.
pub struct PresentedStateStream {
    current: PresentedState,
    receiver: watch::Receiver<PresentedState>,
}

impl PresentedStateStream {
    pub(crate) fn new(receiver: watch::Receiver<PresentedState>) -> Self {
        let current = *receiver.borrow();
        Self { current, receiver }
    }

    /// The state captured at creation or at the last `changed()`.
    pub fn current(&self) -> PresentedState {
        self.current
    }

    /// The latest state (may have moved on since `current`).
    pub fn latest(&self) -> PresentedState {
        *self.receiver.borrow()
    }

    /// Wait for the next commit, returning the new state.
    /// Returns `None` once the engine has been dropped.
    pub async fn changed(&mut self) -> Option<PresentedState> {
        self.receiver.changed().await.ok()?;
        let state = *self.receiver.borrow_and_update();
        self.current = state;
        Some(state)
    }

    /// Convert into a `Stream` that yields the current state, then every
    /// subsequent commit.
    pub fn into_stream(self) -> PresentedWatchStream {
        PresentedWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct PresentedWatchStream {
    inner: WatchStream<PresentedState>,
}

impl Stream for PresentedWatchStream {
    type Item = PresentedState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
