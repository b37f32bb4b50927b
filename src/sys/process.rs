//! Reports application launches and terminations to the lifecycle monitor
//! by diffing the running application list between main loop ticks.

use tracing::debug;

use super::discovery::running_apps;
use crate::actor::lifecycle::{self, Request};
use crate::common::collections::BTreeSet;
use crate::model::pid_t;

pub struct ProcessPoller {
    known: Option<BTreeSet<pid_t>>,
    lifecycle_tx: lifecycle::Sender,
}

impl ProcessPoller {
    pub fn new(lifecycle_tx: lifecycle::Sender) -> Self {
        Self { known: None, lifecycle_tx }
    }

    pub fn poll(&mut self) {
        let current = running_apps().into_iter().map(|app| app.pid).collect();
        for request in self.diff(current) {
            self.lifecycle_tx.send(request);
        }
    }

    /// The first call reports the whole list; later calls only the changes.
    fn diff(&mut self, current: BTreeSet<pid_t>) -> Vec<Request> {
        let Some(known) = self.known.replace(current.clone()) else {
            debug!(count = current.len(), "initial process list");
            return vec![Request::SyncProcesses(current.into_iter().collect())];
        };
        let launched = current.difference(&known).map(|&pid| Request::ProcessLaunched(pid));
        let terminated = known.difference(&current).map(|&pid| Request::ProcessTerminated(pid));
        launched.chain(terminated).collect()
    }
}
