use std::time::Instant;

use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_tree::HierarchicalLayer;
use tracing_tree::time::Uptime;

const DEFAULT_FILTER: &str = "info";

pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let tree = HierarchicalLayer::default()
        .with_writer(std::io::stderr)
        .with_indent_amount(2)
        .with_indent_lines(true)
        .with_targets(true)
        .with_bracketed_fields(true)
        .with_timer(Uptime::default());
    if tracing_subscriber::registry().with(filter).with(tree).try_init().is_err() {
        // Another subscriber is already installed (tests, embedding hosts).
        debug!("tracing subscriber already initialised");
    }
}

/// Runs `f` and logs how long it took at trace level.
pub fn timed<T>(what: &'static str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    tracing::trace!(what, elapsed = ?start.elapsed(), "timed");
    out
}
