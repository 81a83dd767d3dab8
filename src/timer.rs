//! Cancellable one-shot timer
//!
//! `schedule` arms a single delayed event and hands back a handle that can
//! revoke it before it goes off. Dropping the handle does not cancel; the
//! timer then runs to completion like a plain delay.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{self, Instant};

pub struct OneShotTimer {
    deadline: Instant,
    cancel: oneshot::Receiver<()>,
}

pub struct TimerHandle {
    cancel: Option<oneshot::Sender<()>>,
}

impl TimerHandle {
    /// Revoke the timer. Returns true if this call revoked it, false if it
    /// was already cancelled or has already run.
    pub fn cancel(&mut self) -> bool {
        match self.cancel.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

impl OneShotTimer {
    pub fn schedule(delay: Duration) -> (Self, TimerHandle) {
        let (tx, rx) = oneshot::channel();
        let timer = Self {
            deadline: Instant::now() + delay,
            cancel: rx,
        };
        (timer, TimerHandle { cancel: Some(tx) })
    }

    /// Wait for the timer. Resolves `true` once the delay has elapsed, or
    /// `false` as soon as the handle cancels it.
    pub async fn fired(mut self) -> bool {
        let sleep = time::sleep_until(self.deadline);
        tokio::pin!(sleep);
        let mut cancel_open = true;
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                res = &mut self.cancel, if cancel_open => {
                    if res.is_ok() {
                        return false;
                    }
                    // Handle dropped without cancelling; keep waiting.
                    cancel_open = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_no_earlier_than_the_delay() {
        let (timer, _handle) = OneShotTimer::schedule(Duration::from_millis(1000));
        let fired = timer.fired();
        tokio::pin!(fired);

        // Just short of the deadline: still pending.
        let early = time::timeout(Duration::from_millis(999), &mut fired).await;
        assert!(early.is_err(), "timer fired before its delay elapsed");

        assert!(fired.await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let (timer, mut handle) = OneShotTimer::schedule(Duration::from_millis(1000));
        assert!(handle.cancel());
        assert!(!timer.fired().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_cancel_is_a_no_op() {
        let (timer, mut handle) = OneShotTimer::schedule(Duration::from_millis(1000));
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(!timer.fired().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_handle_does_not_cancel() {
        let (timer, handle) = OneShotTimer::schedule(Duration::from_millis(100));
        drop(handle);
        assert!(timer.fired().await);
    }
}
