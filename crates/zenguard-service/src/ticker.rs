//! One-second tick sources.
//!
//! Each armed countdown gets its own tokio task that posts
//! [`EngineMessage::Tick`] into the engine queue. The task only holds a weak
//! sender, so it never keeps a finished engine alive, and ticks still queued
//! after a cancel are rejected by chain id in the controller.

use std::time::Duration;

use tokio::{sync::mpsc, task::JoinHandle};
use zenguard_core::{TickChain, env::Environment};

use crate::engine::EngineMessage;

/// Running tick source. Dropping the handle stops it.
#[derive(Debug)]
pub struct TickerHandle {
    chain: TickChain,
    task: JoinHandle<()>,
}

impl TickerHandle {
    /// Chain the ticks carry.
    pub fn chain(&self) -> TickChain {
        self.chain
    }

    /// Stop the tick source.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a tick source for `chain`, ticking every `interval`.
///
/// Ticks are paced against the chain's start rather than the previous tick,
/// so a slow queue does not stretch the session.
pub fn spawn_tick_chain<E: Environment>(
    env: E,
    chain: TickChain,
    interval: Duration,
    queue: mpsc::WeakSender<EngineMessage>,
) -> TickerHandle {
    let task = tokio::spawn(async move {
        let origin = env.now();
        let mut ticks: u32 = 0;

        loop {
            ticks = ticks.saturating_add(1);
            let due = interval.saturating_mul(ticks);
            let elapsed = env.now() - origin;
            env.sleep(due.saturating_sub(elapsed)).await;

            let Some(queue) = queue.upgrade() else {
                break;
            };
            if queue.send(EngineMessage::Tick(chain)).await.is_err() {
                break;
            }
        }

        tracing::trace!(%chain, ticks, "tick source finished");
    });

    TickerHandle { chain, task }
}
