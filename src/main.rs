use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use rust_photo_screensaver::config::{Configuration, MemorySettings, Settings, YamlSettingsStore};
use rust_photo_screensaver::events::{
    BatteryStatus, Catalog, DeviceOrientation, EngineEvent, GestureCommand, HostCommand,
    PointerEvent, StopReason,
};
use rust_photo_screensaver::gesture::{self, GestureRouter};
use rust_photo_screensaver::platform::battery::{self, ThresholdGate};
use rust_photo_screensaver::platform::headless::HeadlessSurfaces;
use rust_photo_screensaver::platform::{NoFeedback, ScreenSize, SettingsStore};
use rust_photo_screensaver::playlist::PlaylistEngine;
use rust_photo_screensaver::tasks::catalog::{self, FsTimestamps};
use rust_photo_screensaver::tasks::loader::ImageLoader;
use rust_photo_screensaver::tasks::{console, slideshow};

const BATTERY_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrientationArg {
    Landscape,
    Portrait,
}

impl From<OrientationArg> for DeviceOrientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::Landscape => DeviceOrientation::Landscape,
            OrientationArg::Portrait => DeviceOrientation::Portrait,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "photo-screensaver",
    version,
    about = "ambient photo slideshow screensaver"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Device orientation at session start
    #[arg(long, value_enum, default_value = "landscape")]
    orientation: OrientationArg,
    /// Linux power-supply directory to read battery state from (e.g. /sys/class/power_supply/BAT0)
    #[arg(long = "battery-dir", value_name = "DIR")]
    battery_dir: Option<PathBuf>,
    /// Print the planned playlist order for N advances without starting the slideshow
    #[arg(long = "playlist-dry-run", value_name = "ITERATIONS")]
    playlist_dry_run: Option<usize>,
    /// Deterministic RNG seed for random ordering (overrides shuffle-seed)
    #[arg(long = "playlist-seed", value_name = "SEED")]
    playlist_seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // init tracing (RUST_LOG controls level, default = info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let Args {
        config,
        orientation,
        battery_dir,
        playlist_dry_run,
        playlist_seed,
    } = Args::parse();
    let orientation = DeviceOrientation::from(orientation);

    let cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::info!(
        "Loaded configuration from {}:\n{:#?}",
        config.display(),
        cfg
    );
    let seed = playlist_seed.or(cfg.shuffle_seed);

    let settings: Arc<dyn SettingsStore> = match &cfg.settings_path {
        Some(path) => Arc::new(YamlSettingsStore::new(path, cfg.settings.clone())),
        None => Arc::new(MemorySettings::new(cfg.settings.clone())),
    };

    let catalog = catalog::scan_library(cfg.photo_library_path.clone(), cfg.max_catalog_size)
        .await
        .context("failed to scan photo library")?;
    if catalog.meta.truncated {
        tracing::warn!(
            kept = catalog.photos.len(),
            found = catalog.meta.total_found,
            "photo library exceeds max-catalog-size; catalog truncated"
        );
    }

    if let Some(iterations) = playlist_dry_run {
        run_playlist_dry_run(&catalog, &settings.load(), orientation, iterations, seed);
        return Ok(());
    }

    let battery_status = match &battery_dir {
        Some(dir) => battery::read_power_supply(dir).unwrap_or_else(|err| {
            tracing::warn!("battery read failed, assuming mains power: {err:#}");
            BatteryStatus::default()
        }),
        None => BatteryStatus::default(),
    };

    // Channels (small/bounded)
    let (command_tx, command_rx) = mpsc::channel::<HostCommand>(32); // Host/Gestures -> Slideshow
    let (event_tx, mut event_rx) = mpsc::channel::<EngineEvent>(32); // Slideshow -> Host
    let (pointer_tx, pointer_rx) = mpsc::channel::<PointerEvent>(64); // Touch input -> Gestures

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        let control = command_tx.clone();
        tokio::spawn(async move {
            match signal(SignalKind::user_defined1()) {
                Ok(mut sigusr1) => loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = sigusr1.recv() => {
                            if received.is_none() {
                                break;
                            }
                            tracing::info!("SIGUSR1 received; toggling pause");
                            let toggle = HostCommand::Gesture(GestureCommand::PauseToggle);
                            if let Err(err) = control.send(toggle).await {
                                tracing::warn!("failed to forward pause toggle: {err}");
                                break;
                            }
                        }
                    }
                },
                Err(err) => tracing::warn!("failed to register SIGUSR1 handler: {err}"),
            }
        });
    }

    let screen = ScreenSize {
        width: cfg.screen.width,
        height: cfg.screen.height,
    };
    let mut tasks = JoinSet::new();

    // Slideshow engine
    tasks.spawn({
        let collaborators = slideshow::Collaborators {
            surfaces: Box::new(HeadlessSurfaces::new(screen.width, screen.height)),
            decoder: Arc::new(ImageLoader::new(cfg.loader_backdrop_sigma)),
            timestamps: Arc::new(FsTimestamps),
            settings: Arc::clone(&settings),
            gate: Arc::new(ThresholdGate::new(cfg.battery_threshold_percent)),
            shuffle_seed: seed,
        };
        let cancel = cancel.clone();
        async move {
            slideshow::run(collaborators, command_rx, event_tx, cancel)
                .await
                .context("slideshow task failed")
        }
    });

    // Gesture router
    tasks.spawn({
        let router = GestureRouter::new(cfg.gestures.clone(), screen, Box::new(NoFeedback));
        let command_tx = command_tx.clone();
        let cancel = cancel.clone();
        async move {
            gesture::run(router, pointer_rx, command_tx, cancel)
                .await
                .context("gesture task failed")
        }
    });

    // Console commands; Ctrl-D cancels the pipeline
    if io::stdin().is_terminal() {
        let command_tx = command_tx.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let input = BufReader::new(tokio::io::stdin());
            console::run(input, command_tx, pointer_tx, screen, cancel)
                .await
                .context("console task failed")
        });
        tracing::info!("{}", console::HELP);
    } else {
        tracing::debug!("stdin is not a terminal; console disabled");
    }

    // Battery monitor
    if let Some(dir) = battery_dir {
        let command_tx = command_tx.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            battery::watch(dir, BATTERY_POLL_INTERVAL, battery_status, command_tx, cancel)
                .await
                .context("battery task failed")
        });
    }

    command_tx
        .send(HostCommand::StartSession {
            catalog: catalog.photos,
            orientation,
            battery: battery_status,
        })
        .await
        .context("slideshow task exited before the session started")?;
    drop(command_tx);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = event_rx.recv() => match event {
                Some(EngineEvent::Stopped(reason)) => {
                    log_stop(&reason);
                    cancel.cancel();
                    break;
                }
                Some(event) => tracing::debug!(?event, "engine event"),
                None => break,
            },
        }
    }
    // Unblock the engine if it is still emitting while shutting down
    drop(event_rx);
    cancel.cancel();

    // Drain JoinSet (wait for other tasks to complete)
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}

fn log_stop(reason: &StopReason) {
    match reason.error() {
        Some(err) => tracing::warn!("slideshow ended: {}", err.user_message()),
        None => tracing::info!(?reason, "slideshow ended"),
    }
}

fn run_playlist_dry_run(
    catalog: &Catalog,
    settings: &Settings,
    orientation: DeviceOrientation,
    iterations: usize,
    seed: Option<u64>,
) {
    let mut engine = PlaylistEngine::new(Arc::new(FsTimestamps), seed);
    let mut playlist = engine.build(catalog.photos.clone(), settings, orientation);

    println!(
        "# playlist dry run\n# source: {}\n# photos: {} of {} ({} after filtering)\n# orientation: {:?}\n# ordering: {:?}\n# iterations: {}\n# seed: {}\n",
        catalog.meta.source_name,
        catalog.photos.len(),
        catalog.meta.total_found,
        playlist.len(),
        orientation,
        settings.ordering,
        iterations,
        seed.map_or_else(|| "(random)".to_string(), |s| s.to_string())
    );

    if playlist.is_empty() {
        println!("(playlist empty)");
        return;
    }

    println!("# planned order:");
    for step in 1..=iterations {
        if step > 1 && playlist.next().is_err() {
            break;
        }
        if let Some(photo) = playlist.current() {
            println!("  {:>4}: {}", step, photo.id);
        }
    }
}
