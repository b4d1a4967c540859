//! Stream throttling utilities

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep, sleep_until};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Emit at most once per `period`.
    ///
    /// Uses "latest-wins" semantics: items arriving while the period is still
    /// running replace each other and only the newest is emitted. The first
    /// item goes out immediately. When the inner stream ends, any held item is
    /// flushed before the throttled stream ends.
    fn throttle(self, period: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, period)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// A stream combinator that throttles emission rate
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        period: Duration,
        // Created lazily so constructing a Throttle does not need a runtime.
        delay: Option<Pin<Box<Sleep>>>,
        pending: Option<S::Item>,
        finished: bool,
    }
}

impl<S: Stream> Throttle<S> {
    pub fn new(stream: S, period: Duration) -> Self {
        Self { stream, period, delay: None, pending: None, finished: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        while !*this.finished {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.pending = Some(item),
                Poll::Ready(None) => *this.finished = true,
                Poll::Pending => break,
            }
        }

        if *this.finished {
            return Poll::Ready(this.pending.take());
        }
        if this.pending.is_none() {
            return Poll::Pending;
        }

        if let Some(delay) = this.delay.as_mut() {
            ready!(delay.as_mut().poll(cx));
        }

        let next = Instant::now() + *this.period;
        match this.delay.as_mut() {
            Some(delay) => delay.as_mut().reset(next),
            None => *this.delay = Some(Box::pin(sleep_until(next))),
        }
        Poll::Ready(this.pending.take())
    }
}
