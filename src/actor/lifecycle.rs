//! Watches processes for window changes and turns bursts of notifications
//! into a single debounced [`reactor::Event::WindowsChanged`].
//!
//! The subscription table is owned by the actor task, so launches and
//! terminations reported from different sources are applied in the order
//! they arrive in the mailbox.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use super::reactor;
use crate::actor;
use crate::common::collections::{HashMap, HashSet};
use crate::model::pid_t;
use crate::platform::{ProcessObserver, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEventKind {
    Created,
    Destroyed,
    Resized,
    Minimized,
    Deminiaturized,
}

/// What a debounced burst contained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Only resize notifications; usually our own frame writes echoing back.
    GeometryOnly,
    Structural,
}

impl ChangeKind {
    fn merge(self, other: ChangeKind) -> ChangeKind {
        match (self, other) {
            (ChangeKind::GeometryOnly, ChangeKind::GeometryOnly) => ChangeKind::GeometryOnly,
            _ => ChangeKind::Structural,
        }
    }
}

#[derive(Debug)]
pub enum Request {
    ProcessLaunched(pid_t),
    ProcessTerminated(pid_t),
    /// The full list of running processes; subscriptions are reconciled
    /// against it.
    SyncProcesses(Vec<pid_t>),
    WindowEvent(pid_t, WindowEventKind),
    WorkspaceChanged,
    Stop,
}

pub type Sender = actor::Sender<Request>;
pub type Receiver = actor::Receiver<Request>;

/// Handed to [`ProcessObserver`]s so notifications land in the monitor's
/// mailbox.
#[derive(Clone)]
pub struct WindowEventSender(Sender);

impl WindowEventSender {
    pub fn send(&self, pid: pid_t, kind: WindowEventKind) {
        self.0.send(Request::WindowEvent(pid, kind));
    }
}

pub struct LifecycleMonitor {
    observer: Arc<dyn ProcessObserver>,
    debounce: Duration,
    events_tx: reactor::Sender,
    own_tx: Sender,
    rx: Receiver,
    subscriptions: HashMap<pid_t, Box<dyn Subscription>>,
}

enum Flow {
    Continue,
    Changed(ChangeKind),
    Stop,
}

impl LifecycleMonitor {
    pub fn new(
        observer: Arc<dyn ProcessObserver>,
        debounce: Duration,
        events_tx: reactor::Sender,
    ) -> (Self, Sender) {
        let (tx, rx) = actor::channel();
        let monitor = LifecycleMonitor {
            observer,
            debounce,
            events_tx,
            own_tx: tx.clone(),
            rx,
            subscriptions: HashMap::default(),
        };
        (monitor, tx)
    }

    pub async fn run(mut self) {
        let mut pending: Option<(Instant, ChangeKind)> = None;
        loop {
            let next = match pending {
                None => self.rx.recv().await,
                Some((deadline, kind)) => {
                    tokio::select! {
                        msg = self.rx.recv() => msg,
                        _ = sleep_until(deadline) => {
                            pending = None;
                            debug!(?kind, "windows changed");
                            self.events_tx.send(reactor::Event::WindowsChanged(kind));
                            continue;
                        }
                    }
                }
            };
            let Some((span, request)) = next else { break };

            match span.in_scope(|| self.handle_request(request)) {
                Flow::Continue => {}
                Flow::Changed(kind) => {
                    let kind = pending.map_or(kind, |(_, prev)| prev.merge(kind));
                    pending = Some((Instant::now() + self.debounce, kind));
                }
                Flow::Stop => break,
            }
        }
        info!(subscriptions = self.subscriptions.len(), "lifecycle monitor stopped");
        self.subscriptions.clear();
    }

    fn handle_request(&mut self, request: Request) -> Flow {
        trace!(?request, "lifecycle request");
        match request {
            Request::ProcessLaunched(pid) => {
                self.subscribe(pid);
                Flow::Changed(ChangeKind::Structural)
            }
            Request::ProcessTerminated(pid) => {
                if self.subscriptions.remove(&pid).is_some() {
                    debug!(pid, "unsubscribed");
                }
                Flow::Changed(ChangeKind::Structural)
            }
            Request::SyncProcesses(pids) => {
                let live: HashSet<pid_t> = pids.iter().copied().collect();
                let before = self.subscriptions.len();
                self.subscriptions.retain(|pid, _| live.contains(pid));
                let mut changed = before != self.subscriptions.len();
                for pid in pids {
                    if !self.subscriptions.contains_key(&pid) {
                        changed |= self.subscribe(pid);
                    }
                }
                if changed {
                    Flow::Changed(ChangeKind::Structural)
                } else {
                    Flow::Continue
                }
            }
            Request::WindowEvent(_, WindowEventKind::Resized) => {
                Flow::Changed(ChangeKind::GeometryOnly)
            }
            Request::WindowEvent(..) | Request::WorkspaceChanged => {
                Flow::Changed(ChangeKind::Structural)
            }
            Request::Stop => Flow::Stop,
        }
    }

    /// Returns whether a new subscription was added.
    fn subscribe(&mut self, pid: pid_t) -> bool {
        if self.subscriptions.contains_key(&pid) {
            return false;
        }
        let events = WindowEventSender(self.own_tx.clone());
        match self.observer.observe(pid, events) {
            Ok(subscription) => {
                debug!(pid, "subscribed");
                self.subscriptions.insert(pid, subscription);
                true
            }
            Err(err) => {
                warn!(%err, "could not observe process");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::platform::testing::FakeObserver;

    const DEBOUNCE: Duration = Duration::from_millis(180);

    fn start(observer: &FakeObserver) -> (Sender, reactor::Receiver, tokio::task::JoinHandle<()>) {
        let (events_tx, events_rx) = actor::channel();
        let (monitor, tx) = LifecycleMonitor::new(Arc::new(observer.clone()), DEBOUNCE, events_tx);
        let task = tokio::spawn(monitor.run());
        (tx, events_rx, task)
    }

    fn drain(rx: &mut reactor::Receiver) -> Vec<ChangeKind> {
        let mut out = vec![];
        while let Ok((_, event)) = rx.try_recv() {
            if let reactor::Event::WindowsChanged(kind) = event {
                out.push(kind);
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_debounced_into_one_signal() {
        let observer = FakeObserver::default();
        let (tx, mut rx, _task) = start(&observer);
        tx.send(Request::ProcessLaunched(10));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(drain(&mut rx), vec![ChangeKind::Structural]);

        let events = observer.sender(10).unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            events.send(10, WindowEventKind::Created);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let last = Instant::now();
        assert_eq!(last - start, Duration::from_millis(50));

        // The last event went out 10ms ago; stop just short of its deadline.
        tokio::time::sleep(DEBOUNCE - Duration::from_millis(11)).await;
        assert!(drain(&mut rx).is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(drain(&mut rx), vec![ChangeKind::Structural]);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resize_only_bursts_are_geometry_only() {
        let observer = FakeObserver::default();
        let (tx, mut rx, _task) = start(&observer);
        tx.send(Request::WindowEvent(1, WindowEventKind::Resized));
        tx.send(Request::WindowEvent(1, WindowEventKind::Resized));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(drain(&mut rx), vec![ChangeKind::GeometryOnly]);

        tx.send(Request::WindowEvent(1, WindowEventKind::Resized));
        tx.send(Request::WindowEvent(1, WindowEventKind::Minimized));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(drain(&mut rx), vec![ChangeKind::Structural]);
    }

    #[tokio::test(start_paused = true)]
    async fn subscriptions_follow_process_lifecycle() {
        let observer = FakeObserver::default();
        observer.refuse.lock().insert(30);
        let (tx, _rx, task) = start(&observer);

        tx.send(Request::SyncProcesses(vec![10, 20, 30]));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(observer.subscribed(), vec![10, 20]);

        tx.send(Request::ProcessTerminated(10));
        tx.send(Request::ProcessLaunched(40));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(observer.subscribed(), vec![20, 40]);

        tx.send(Request::SyncProcesses(vec![40]));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(observer.subscribed(), vec![40]);

        tx.send(Request::Stop);
        task.await.unwrap();
        assert!(observer.subscribed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_pending_signal() {
        let observer = FakeObserver::default();
        let (tx, mut rx, task) = start(&observer);
        tx.send(Request::WorkspaceChanged);
        tx.send(Request::Stop);
        task.await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(drain(&mut rx).is_empty());
    }
}
