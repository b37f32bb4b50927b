//! Sequences reflow requests on a single worker task.
//!
//! Queued drops always run before the one coalesced full reflow. Before
//! running anything the worker waits for the user to stop dragging or
//! resizing, lets the window set settle, and checks again for a gesture.

pub mod executor;

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::actuator::ApplyReport;
use super::reactor::GestureActivity;
use super::stabilize::{ProbeOutcome, StabilizationProbe};
use crate::common::collections::VecDeque;
use crate::layout_engine::DropError;
use crate::model::{DisplayId, Point, WindowId, WorkspaceId};

#[derive(Debug, Clone, PartialEq)]
pub enum ReflowRequest {
    Drop {
        point: Point,
        window: WindowId,
        hovered_slot: Option<usize>,
    },
    Full {
        reason: String,
    },
}

/// Drops in arrival order, plus at most one full reflow which runs after
/// all of them.
#[derive(Debug, Default)]
pub struct ReflowQueue {
    drops: VecDeque<ReflowRequest>,
    full: Option<String>,
}

impl ReflowQueue {
    pub fn push(&mut self, request: ReflowRequest) {
        match request {
            ReflowRequest::Drop { .. } => self.drops.push_back(request),
            ReflowRequest::Full { reason } => {
                if let Some(previous) = self.full.replace(reason) {
                    trace!(%previous, "coalesced full reflow");
                }
            }
        }
    }

    pub fn pop(&mut self) -> Option<ReflowRequest> {
        self.drops
            .pop_front()
            .or_else(|| self.full.take().map(|reason| ReflowRequest::Full { reason }))
    }

    pub fn clear(&mut self) {
        self.drops.clear();
        self.full = None;
    }

    pub fn len(&self) -> usize { self.drops.len() + usize::from(self.full.is_some()) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[derive(Debug, Error)]
pub enum ReflowError {
    #[error(transparent)]
    Drop(#[from] DropError),
    #[error("reflow task panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReflowReport {
    pub plans: usize,
    /// Plans whose windows were already in place.
    pub skipped: usize,
    pub apply: ApplyReport,
}

/// Does the blocking work behind a request. Called from the blocking pool.
pub trait ReflowExecutor: Send + Sync + 'static {
    /// What the settle probe compares between samples.
    fn settle_snapshot(&self) -> Vec<(WindowId, DisplayId, Option<WorkspaceId>)>;

    fn execute(&self, request: &ReflowRequest) -> Result<ReflowReport, ReflowError>;
}

#[derive(Default)]
struct Shared {
    queue: Mutex<ReflowQueue>,
    notify: Notify,
}

pub struct ReflowScheduler {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    probe: StabilizationProbe,
}

impl ReflowScheduler {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn<E: ReflowExecutor>(
        executor: E,
        probe: StabilizationProbe,
        activity: watch::Receiver<GestureActivity>,
    ) -> Self {
        let shared = Arc::new(Shared::default());
        let cancel = CancellationToken::new();
        let worker = Worker {
            shared: shared.clone(),
            executor: Arc::new(executor),
            probe: probe.clone(),
            activity,
        };
        tokio::spawn(worker.run(cancel.clone()));
        Self { shared, cancel, probe }
    }

    pub fn enqueue(&self, request: ReflowRequest) {
        if self.cancel.is_cancelled() {
            debug!(?request, "scheduler stopped, dropping request");
            return;
        }
        debug!(?request, "reflow requested");
        self.shared.queue.lock().push(request);
        self.shared.notify.notify_one();
    }

    pub fn clear(&self) { self.shared.queue.lock().clear(); }

    /// Cancels the worker, forgets queued requests and abandons any settle
    /// probe in flight.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.clear();
        self.probe.supersede();
    }

    pub fn pending(&self) -> usize { self.shared.queue.lock().len() }
}

impl Drop for ReflowScheduler {
    fn drop(&mut self) { self.cancel.cancel(); }
}

struct Worker<E> {
    shared: Arc<Shared>,
    executor: Arc<E>,
    probe: StabilizationProbe,
    activity: watch::Receiver<GestureActivity>,
}

impl<E: ReflowExecutor> Worker<E> {
    async fn run(mut self, cancel: CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = self.process() => {}
        }
        debug!("reflow worker stopped");
    }

    async fn process(&mut self) {
        loop {
            let empty = self.shared.queue.lock().is_empty();
            if empty {
                self.shared.notify.notified().await;
                continue;
            }

            if !self.wait_for_idle().await {
                return;
            }
            let executor = self.executor.clone();
            match self.probe.wait_until_stable(move || executor.settle_snapshot()).await {
                ProbeOutcome::Stable { samples } => trace!(samples, "settled"),
                ProbeOutcome::TimedOut => debug!("proceeding unsettled"),
                ProbeOutcome::Superseded => continue,
            }
            if !self.wait_for_idle().await {
                return;
            }

            let next = self.shared.queue.lock().pop();
            if let Some(request) = next {
                self.execute(request).await;
            }
        }
    }

    /// Returns false once the gesture source is gone.
    async fn wait_for_idle(&mut self) -> bool {
        if self.activity.borrow().is_active() {
            trace!("waiting for gesture to finish");
        }
        self.activity.wait_for(|a| !a.is_active()).await.is_ok()
    }

    #[instrument(skip(self))]
    async fn execute(&self, request: ReflowRequest) {
        match self.run_blocking(request).await {
            Ok(report) => log_report(&report),
            Err(ReflowError::Drop(err)) => {
                warn!(%err, "drop could not be resolved, falling back to a full reflow");
                let fallback = ReflowRequest::Full {
                    reason: "drop fallback".into(),
                };
                match self.run_blocking(fallback).await {
                    Ok(report) => log_report(&report),
                    Err(err) => warn!(%err, "fallback reflow failed"),
                }
            }
            Err(err) => warn!(%err, "reflow failed"),
        }
    }

    async fn run_blocking(&self, request: ReflowRequest) -> Result<ReflowReport, ReflowError> {
        let executor = self.executor.clone();
        match tokio::task::spawn_blocking(move || executor.execute(&request)).await {
            Ok(result) => result,
            Err(err) => Err(ReflowError::Panicked(err.to_string())),
        }
    }
}

fn log_report(report: &ReflowReport) {
    info!(
        plans = report.plans,
        skipped = report.skipped,
        applied = report.apply.applied.len(),
        failed = report.apply.failed.len(),
        clamped = report.apply.clamped.len(),
        "reflow done"
    );
}
