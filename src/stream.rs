//! Session snapshots as a `Stream`.
//!
//! [`crate::session::SessionController::subscribe`] hands out a `watch`
//! receiver; this wraps it so callers can drive a UI or a progress bar with
//! `StreamExt` combinators. Like any `watch` subscriber, a slow consumer sees
//! the latest snapshot rather than every intermediate one.

use crate::session::SessionSnapshot;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// A boxed stream of session snapshots.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = SessionSnapshot> + Send>>;

/// Yields the current snapshot immediately, then every later change.
///
/// Ends when the controller is dropped.
pub struct SessionStream {
    inner: WatchStream<SessionSnapshot>,
}

impl SessionStream {
    pub fn new(rx: watch::Receiver<SessionSnapshot>) -> Self {
        Self {
            inner: WatchStream::new(rx),
        }
    }

    /// Stop after the first settled snapshot (completed or failed), which is
    /// included.
    pub fn until_settled(self) -> SnapshotStream {
        stream::unfold((self, false), |(mut s, done)| async move {
            if done {
                return None;
            }
            let snapshot = s.next().await?;
            let settled = snapshot.is_settled();
            Some((snapshot, (s, settled)))
        })
        .boxed()
    }
}

impl Stream for SessionStream {
    type Item = SessionSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
