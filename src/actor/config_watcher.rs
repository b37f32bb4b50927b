use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use super::reactor;
use crate::common::config::ConfigRules;

/// Reloads the `[rules]` table when the config file changes on disk and
/// asks the reactor for a full reflow.
pub struct ConfigWatcher {
    file: PathBuf,
    rules: Arc<ConfigRules>,
    events_tx: reactor::Sender,
    poll_interval: Duration,
}

impl ConfigWatcher {
    pub fn new(file: PathBuf, rules: Arc<ConfigRules>, events_tx: reactor::Sender) -> Self {
        Self {
            file,
            rules,
            events_tx,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                warn!("config-watcher: error: {e:?}");
            }
        })
    }

    async fn run(self) -> notify::Result<()> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher = PollWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            NotifyConfig::default()
                .with_poll_interval(self.poll_interval)
                .with_compare_contents(true),
        )?;
        watcher.watch(&self.file, RecursiveMode::NonRecursive)?;
        info!("watching {:?}", self.file);

        while let Some(res) = rx.recv().await {
            match res {
                Ok(event) if self.is_relevant(&event) => {
                    debug!("change detected: {:?}", event.kind);
                    self.reload();
                }
                Ok(event) => debug!("ignoring unrelated event: {:?}", event.kind),
                Err(e) => warn!("watch error: {e:?}"),
            }
            if self.events_tx.is_closed() {
                break;
            }
        }
        debug!("config watcher exiting");
        Ok(())
    }

    fn is_relevant(&self, event: &Event) -> bool {
        match event.kind {
            EventKind::Modify(_) | EventKind::Create(_) => event
                .paths
                .iter()
                .any(|p| p == &self.file || p.file_name() == self.file.file_name()),
            _ => false,
        }
    }

    fn reload(&self) {
        match self.rules.reload(&self.file) {
            Ok(()) => {
                info!("rules reloaded");
                self.events_tx.send(reactor::Event::RulesChanged);
            }
            Err(e) => warn!("keeping previous rules, config did not load: {e:#}"),
        }
    }
}
