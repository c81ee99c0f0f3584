//! Cancellable periodic rounds.
//!
//! Each recurring activity is a loop that sleeps for a freshly drawn delay,
//! then runs one round. The sleep races a shutdown signal; the round does not.
//! A round already running when shutdown arrives finishes, and no further
//! round starts.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Jitter bounds applied to the base gossip interval.
pub const GOSSIP_JITTER: (f64, f64) = (0.9, 1.1);

/// Delay before the next gossip round: `base` scaled by a factor in [0.9, 1.1].
///
/// Saturates at `Duration::MAX`.
pub fn gossip_delay<R: Rng + ?Sized>(base: Duration, rng: &mut R) -> Duration {
    scale(base, rng.random_range(GOSSIP_JITTER.0..=GOSSIP_JITTER.1))
}

/// Delay before the next directory round: uniform in `[minimum, minimum + window)`.
///
/// Saturates at `Duration::MAX`.
pub fn directory_delay<R: Rng + ?Sized>(minimum: Duration, window: Duration, rng: &mut R) -> Duration {
    minimum
        .checked_add(scale(window, rng.random_range(0.0..1.0)))
        .unwrap_or(Duration::MAX)
}

fn scale(duration: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// Sending half of the shutdown signal.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// A receiver for a periodic task.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Signal every subscribed task. Pending sleeps end immediately.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `round` repeatedly until `shutdown` fires.
///
/// `next_delay` is called before every sleep, so each round gets its own draw.
/// The flag is checked again after waking, before the round starts.
pub async fn run_periodic<D, F, Fut>(
    name: &'static str,
    mut shutdown: watch::Receiver<bool>,
    mut next_delay: D,
    mut round: F,
) where
    D: FnMut() -> Duration,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let delay = next_delay();
        debug!("{} round scheduled in {:?}", name, delay);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.wait_for(|stopped| *stopped) => break,
        }

        if *shutdown.borrow() {
            break;
        }

        round().await;
    }

    debug!("{} rounds stopped", name);
}
