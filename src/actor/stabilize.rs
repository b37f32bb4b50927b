//! Polls a snapshot until it stops changing.
//!
//! Snapshots are taken on the blocking pool and reduced to a hash; a run
//! settles once the same hash has been seen `stable_samples` times in a row.
//! Every run takes a new generation number, and a run that notices a newer
//! generation gives up with [`ProbeOutcome::Superseded`].

use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxBuildHasher;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace, warn};

use crate::common::config::StabilizationSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Stable { samples: u32 },
    /// The snapshot kept changing until the timeout. Callers proceed with
    /// whatever state they see.
    TimedOut,
    Superseded,
}

#[derive(Clone)]
pub struct StabilizationProbe {
    settings: StabilizationSettings,
    generation: Arc<AtomicU64>,
}

impl StabilizationProbe {
    pub fn new(settings: StabilizationSettings) -> Self {
        Self {
            settings,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Makes every run in flight report `Superseded` on its next tick.
    pub fn supersede(&self) { self.generation.fetch_add(1, Ordering::SeqCst); }

    pub async fn wait_until_stable<F, S>(&self, snapshot: F) -> ProbeOutcome
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Hash,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let deadline = Instant::now() + self.settings.timeout();
        let threshold = self.settings.stable_samples.max(1);
        let snapshot = Arc::new(snapshot);

        let mut last: Option<u64> = None;
        let mut stable = 0;
        loop {
            if self.is_stale(generation) {
                return ProbeOutcome::Superseded;
            }

            let take = snapshot.clone();
            let signature =
                match tokio::task::spawn_blocking(move || FxBuildHasher.hash_one(take())).await {
                    Ok(sig) => Some(sig),
                    Err(err) => {
                        warn!(%err, "snapshot failed");
                        None
                    }
                };

            if self.is_stale(generation) {
                return ProbeOutcome::Superseded;
            }

            stable = match (signature, last) {
                (Some(sig), Some(prev)) if sig == prev => stable + 1,
                _ => 1,
            };
            last = signature;
            trace!(generation, stable, "probe sample");

            if stable >= threshold {
                debug!(generation, samples = stable, "settled");
                return ProbeOutcome::Stable { samples: stable };
            }
            if Instant::now() >= deadline {
                warn!(generation, stable, "did not settle before timeout, proceeding");
                return ProbeOutcome::TimedOut;
            }

            sleep(self.settings.interval()).await;
        }
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    fn probe() -> StabilizationProbe { StabilizationProbe::new(StabilizationSettings::default()) }

    /// Returns the values of `seq` in turn, repeating the last one.
    fn sequence(seq: Vec<u32>) -> impl Fn() -> u32 + Send + Sync + 'static {
        let calls = AtomicUsize::new(0);
        move || {
            let i = calls.fetch_add(1, Ordering::SeqCst);
            seq[i.min(seq.len() - 1)]
        }
    }

    #[tokio::test(start_paused = true)]
    async fn settles_after_repeated_snapshots() {
        let start = Instant::now();
        let outcome = probe().wait_until_stable(sequence(vec![1, 2, 2, 2])).await;
        assert_eq!(outcome, ProbeOutcome::Stable { samples: 3 });
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(start.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn change_resets_the_streak() {
        let outcome = probe().wait_until_stable(sequence(vec![1, 1, 2, 2, 2])).await;
        assert_eq!(outcome, ProbeOutcome::Stable { samples: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_never_stable() {
        let counter = AtomicUsize::new(0);
        let outcome = probe()
            .wait_until_stable(move || counter.fetch_add(1, Ordering::SeqCst))
            .await;
        assert_eq!(outcome, ProbeOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_run_supersedes_older() {
        let probe = probe();
        let first = {
            let probe = probe.clone();
            tokio::spawn(async move {
                let counter = AtomicUsize::new(0);
                probe.wait_until_stable(move || counter.fetch_add(1, Ordering::SeqCst)).await
            })
        };
        sleep(Duration::from_millis(250)).await;
        let second = probe.wait_until_stable(|| 7u8).await;

        assert_eq!(first.await.unwrap(), ProbeOutcome::Superseded);
        assert_eq!(second, ProbeOutcome::Stable { samples: 3 });
    }
}
