//! The demo itself: claim a well-known name, release it on a timer, stop
//! the run loop when the daemon reports the loss.

use std::ops::ControlFlow;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::bus::{BusClient, ReleaseReply, RequestFlags, RequestReply};
use crate::error::BusError;
use crate::timer::OneShotTimer;

/// Lifecycle of a single run, logged at each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connected,
    NameRequested,
    Running,
    NameReleased,
    Stopped,
}

/// Whether a NameLost payload should stop the run loop
fn name_lost_action(claimed: &str, lost: &str) -> ControlFlow<()> {
    if lost == claimed {
        ControlFlow::Break(())
    } else {
        ControlFlow::Continue(())
    }
}

pub struct App {
    bus: BusClient,
    name: String,
    release_after: Duration,
    phase: Phase,
}

impl App {
    pub fn new(bus: BusClient, name: impl Into<String>, release_after: Duration) -> Self {
        Self {
            bus,
            name: name.into(),
            release_after,
            phase: Phase::Connected,
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Handler for the daemon's NameLost broadcast
    fn on_name_lost(&self, lost: &str) -> ControlFlow<()> {
        let action = name_lost_action(&self.name, lost);
        match action {
            ControlFlow::Break(()) => info!("!!! We lost our Name !!!"),
            ControlFlow::Continue(()) => debug!("NameLost for unrelated name {}, ignoring", lost),
        }
        action
    }

    /// The scheduled release. Failure here is logged but not escalated: the
    /// loss broadcast is what ends the loop, and an unowned name simply never
    /// produces one.
    async fn release(&mut self) {
        match self.bus.release_name(&self.name).await {
            Ok(ReleaseReply::Released) => {
                info!("Name {} was released successfully", self.name);
                self.enter(Phase::NameReleased);
            }
            Ok(ReleaseReply::NotOwner) => {
                warn!("Name {} is not owned by this process!", self.name);
            }
            Ok(ReleaseReply::NonExistent) => {
                warn!("Name {} does not exist!", self.name);
            }
            Err(err @ BusError::UnknownReplyCode(_)) => {
                warn!("ReleaseName: {}", err);
            }
            Err(err) => {
                warn!("{}", err);
                warn!("This program may not terminate...");
            }
        }
    }

    /// Run to completion: request the name, arm the release timer, dispatch
    /// timer and signal events one at a time until the loss arrives.
    pub async fn run(mut self) -> Result<()> {
        // Subscribe before requesting, so the loss broadcast cannot race the
        // subscription.
        let mut lost_signals = self
            .bus
            .name_lost_signals()
            .await
            .context("Failed to subscribe to the NameLost signal")?;

        // Fail fast on a failed request. The original logged and carried on,
        // which left the loop waiting forever for a broadcast that could
        // never come.
        let reply = self
            .bus
            .request_name(&self.name, RequestFlags::ALLOW_REPLACEMENT)
            .await
            .with_context(|| format!("Name request for {} failed", self.name))?;
        self.enter(Phase::NameRequested);
        match reply {
            RequestReply::PrimaryOwner => info!("We now own the name {}!", self.name),
            RequestReply::InQueue => info!("We are standing in queue for {}!", self.name),
            RequestReply::Exists => warn!("The name {} already exists!", self.name),
            RequestReply::AlreadyOwner => warn!("Eh? We already own {}!", self.name),
        }

        let (timer, mut release_handle) = OneShotTimer::schedule(self.release_after);
        let fired = timer.fired();
        tokio::pin!(fired);
        let mut timer_armed = true;

        self.enter(Phase::Running);
        info!(
            "Entering the run loop as {:?}; releasing {} in {:?}",
            self.bus.unique_name(),
            self.name,
            self.release_after
        );

        loop {
            tokio::select! {
                went_off = &mut fired, if timer_armed => {
                    timer_armed = false;
                    if went_off {
                        self.release().await;
                    }
                }
                signal = lost_signals.next() => {
                    let Some(signal) = signal else {
                        anyhow::bail!("Lost the bus connection while waiting for NameLost");
                    };
                    let args = signal.args().context("Malformed NameLost payload")?;
                    if self.on_name_lost(args.name).is_break() {
                        if timer_armed && release_handle.cancel() {
                            debug!("Cancelled the pending release; the name is already gone");
                        }
                        break;
                    }
                }
            }
        }

        self.enter(Phase::Stopped);
        info!("Run loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lost_stops_only_for_the_claimed_name() {
        assert!(name_lost_action("org.DBusTest.SignalTest", "org.DBusTest.SignalTest").is_break());
        assert!(
            name_lost_action("org.DBusTest.SignalTest", "org.freedesktop.Other").is_continue()
        );
    }

    // End-to-end pass over a live bus: claim, wait for the scheduled release,
    // observe NameLost, exit the loop.
    #[tokio::test]
    #[ignore = "requires a running session bus"]
    async fn test_claim_release_and_observe_name_lost() {
        let bus = BusClient::connect().await.unwrap();
        let app = App::new(bus, "org.DBusTest.SignalTest", Duration::from_millis(100));
        app.run().await.unwrap();
    }
}
