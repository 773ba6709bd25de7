//! Caller-facing price stream

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::domain::price::PricePoint;
use crate::shared::errors::PollError;

/// Item delivered on a policy stream. An `Err` is always the last item.
pub type StreamItem = Result<PricePoint, PollError>;

/// Why a stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The policy was removed, the monitor shut down, or the poller stopped
    Cancelled,
    /// The poller died on an upstream failure
    Failed(PollError),
}

/// Bounded stream of newly observed price points for one policy.
///
/// Points arrive in non-decreasing timestamp order and at most once.
/// Cancellation is observed by the poller between cycles, so after
/// `remove_policy` the stream may take up to one poll interval plus one
/// query round-trip to end.
pub struct PriceStream {
    inner: ReceiverStream<StreamItem>,
    failure: Option<PollError>,
    exhausted: bool,
}

impl PriceStream {
    pub(crate) fn channel(capacity: usize) -> (mpsc::Sender<StreamItem>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stream = Self {
            inner: ReceiverStream::new(rx),
            failure: None,
            exhausted: false,
        };
        (tx, stream)
    }

    /// Next item, or `None` once the stream is closed
    pub async fn recv(&mut self) -> Option<StreamItem> {
        self.next().await
    }

    /// Reason the stream ended, `None` while it is still open
    pub fn close_reason(&self) -> Option<CloseReason> {
        if !self.exhausted {
            return None;
        }
        Some(match &self.failure {
            Some(err) => CloseReason::Failed(err.clone()),
            None => CloseReason::Cancelled,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.exhausted
    }
}

impl Stream for PriceStream {
    type Item = StreamItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.exhausted {
            return Poll::Ready(None);
        }

        let item = match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(item) => item,
            Poll::Pending => return Poll::Pending,
        };

        match &item {
            Some(Err(err)) => this.failure = Some(err.clone()),
            None => this.exhausted = true,
            Some(Ok(_)) => {}
        }
        Poll::Ready(item)
    }
}
