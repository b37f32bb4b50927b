use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tessera_wm::common::config::{Config, config_file};
use tessera_wm::common::log;
use tracing::{info, warn};

#[derive(Parser)]
#[command(version, about = "Drag windows onto each other to tile them.")]
struct Cli {
    /// Config file to use instead of ~/.tessera.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Load and validate the config file, then exit.
    #[arg(long)]
    validate: bool,

    /// Start with tiling paused.
    #[arg(long)]
    disabled: bool,
}

fn main() -> anyhow::Result<()> {
    let opt: Cli = Parser::parse();
    log::init_logging();

    let path = opt.config.clone().unwrap_or_else(config_file);
    let mut config = load_config(&path)?;

    if opt.validate {
        let issues = config.validate();
        if issues.is_empty() {
            println!("{}: ok", path.display());
            return Ok(());
        }
        for issue in &issues {
            println!("{}: {issue}", path.display());
        }
        anyhow::bail!("{} configuration issue(s) found", issues.len());
    }

    for issue in config.validate() {
        warn!("config: {issue}");
    }
    let fixed = config.auto_fix_values();
    if fixed > 0 {
        warn!(fixed, "out-of-range config values were clamped");
    }
    config.settings.enabled &= !opt.disabled;

    run(path, config)
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        Config::read(path).with_context(|| format!("could not load {}", path.display()))
    } else {
        info!("{} not found, using built-in defaults", path.display());
        Ok(Config::default())
    }
}

#[cfg(not(target_os = "macos"))]
fn run(_path: PathBuf, _config: Config) -> anyhow::Result<()> {
    anyhow::bail!("tessera moves windows through the macOS accessibility API and only runs on macOS")
}

#[cfg(target_os = "macos")]
fn run(path: PathBuf, config: Config) -> anyhow::Result<()> {
    use std::sync::Arc;
    use std::time::Duration;

    use objc2_foundation::MainThreadMarker;
    use parking_lot::Mutex;
    use tessera_wm::actor::config_watcher::ConfigWatcher;
    use tessera_wm::actor::lifecycle::{self, LifecycleMonitor};
    use tessera_wm::actor::reactor::{self, Reactor};
    use tessera_wm::actor;
    use tessera_wm::common::config::ConfigRules;
    use tessera_wm::layout_engine::TilingState;
    use tessera_wm::platform::{Services, TracingOverlay};
    use tessera_wm::sys::accessibility;
    use tessera_wm::sys::automation::AxAutomation;
    use tessera_wm::sys::discovery::AxDiscovery;
    use tessera_wm::sys::event_tap::MouseTap;
    use tessera_wm::sys::observer::AxProcessObserver;
    use tessera_wm::sys::process::ProcessPoller;
    use tessera_wm::sys::run_loop::MainLoop;
    use tessera_wm::sys::screen::ScreenService;
    use tokio_util::sync::CancellationToken;

    const MAIN_LOOP_SLICE: Duration = Duration::from_millis(250);

    let mtm = MainThreadMarker::new().context("tessera must be started on the main thread")?;
    if !accessibility::ensure_permission() {
        anyhow::bail!(
            "accessibility permission was not granted; enable it in System Settings > \
             Privacy & Security > Accessibility, then restart tessera"
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tessera-worker")
        .build()?;

    let screens = Arc::new(ScreenService::new(mtm));
    let rules = Arc::new(ConfigRules::new(config.rules.clone()));
    let services = Services {
        discovery: Arc::new(AxDiscovery::new(screens.clone())),
        displays: screens.clone(),
        rules: rules.clone(),
        automation: Arc::new(AxAutomation::new()),
    };
    let state = Arc::new(Mutex::new(TilingState::new(&config.settings)));
    let (events_tx, events_rx) = actor::channel();
    let cancel = CancellationToken::new();

    let lifecycle_tx = {
        let _guard = runtime.enter();
        let (monitor, lifecycle_tx) = LifecycleMonitor::new(
            Arc::new(AxProcessObserver::new()),
            config.settings.lifecycle.debounce(),
            events_tx.clone(),
        );
        let reactor = Reactor::new(services, state, Arc::new(TracingOverlay), &config.settings)
            .with_lifecycle(lifecycle_tx.clone());

        runtime.spawn(monitor.run());
        let reactor_task = runtime.spawn(reactor.run(events_rx));
        ConfigWatcher::new(path, rules, events_tx.clone()).spawn();

        let stop_tx = events_tx.clone();
        runtime.spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(%err, "could not listen for ctrl-c");
                return;
            }
            info!("interrupted, shutting down");
            stop_tx.send(reactor::Event::Stop);
        });
        let main_cancel = cancel.clone();
        runtime.spawn(async move {
            _ = reactor_task.await;
            main_cancel.cancel();
        });
        lifecycle_tx
    };

    let tap = MouseTap::install(events_tx.clone()).context("could not install the mouse event tap")?;
    let mut poller = ProcessPoller::new(lifecycle_tx.clone());
    info!("tessera running");
    MainLoop::new(mtm, MAIN_LOOP_SLICE).run(&cancel, |mtm| {
        tap.ensure_enabled();
        poller.poll();
        if screens.refresh(mtm) {
            lifecycle_tx.send(lifecycle::Request::WorkspaceChanged);
        }
    });

    drop(tap);
    runtime.shutdown_timeout(Duration::from_secs(2));
    Ok(())
}
