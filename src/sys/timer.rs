//! A cancelable single-shot timer for use inside `tokio::select!`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::time::{Instant, Sleep, sleep_until};

/// Fires once per arming. Re-arming replaces the previous deadline in place,
/// so an old deadline can never fire after a new one has been set.
#[derive(Debug, Default)]
pub struct Timer {
    sleep: Option<Pin<Box<Sleep>>>,
    armed: bool,
}

impl Timer {
    /// Creates a disarmed timer.
    pub fn manual() -> Self { Self::default() }

    pub fn set_next_fire(&mut self, after: Duration) { self.set_deadline(Instant::now() + after); }

    pub fn set_deadline(&mut self, deadline: Instant) {
        match &mut self.sleep {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.sleep = Some(Box::pin(sleep_until(deadline))),
        }
        self.armed = true;
    }

    pub fn cancel(&mut self) { self.armed = false; }

    pub fn is_armed(&self) -> bool { self.armed }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.then(|| self.sleep.as_ref().map(|s| s.deadline())).flatten()
    }
}

impl Future for Timer {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if !self.armed {
            return Poll::Pending;
        }
        let Some(sleep) = self.sleep.as_mut() else {
            return Poll::Pending;
        };
        match sleep.as_mut().poll(cx) {
            Poll::Ready(()) => {
                self.armed = false;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_once() {
        let mut timer = Timer::manual();
        timer.set_next_fire(Duration::from_millis(100));
        (&mut timer).await;
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_deadline() {
        let start = Instant::now();
        let mut timer = Timer::manual();
        timer.set_next_fire(Duration::from_millis(100));
        timer.set_next_fire(Duration::from_millis(300));
        (&mut timer).await;
        assert!(start.elapsed() >= Duration::from_millis(300));

        let fired_again =
            tokio::time::timeout(Duration::from_secs(1), &mut timer).await.is_ok();
        assert!(!fired_again);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_disarms() {
        let mut timer = Timer::manual();
        timer.set_next_fire(Duration::from_millis(10));
        timer.cancel();
        assert_eq!(timer.deadline(), None);
        let fired = tokio::time::timeout(Duration::from_millis(50), &mut timer).await.is_ok();
        assert!(!fired);
    }
}
