use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{Sleep, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::EngineError;
use crate::events::{
    BatteryStatus, DeviceOrientation, EngineEvent, GestureCommand, HostCommand, PhotoRecord,
    StopReason,
};
use crate::platform::{AdvanceGate, DisplaySurfaces, ImageDecoder, SettingsStore, TimestampLookup};
use crate::playlist::{OrientationOutcome, PlaylistEngine, PlaylistState};
use crate::transition::{
    Direction, TransitionCoordinator, TransitionDone, TransitionMode, TransitionRequest,
    TransitionStep,
};
use crate::zoom::ZoomScheduler;

/// Everything the slideshow engine talks to on the host side.
pub struct Collaborators {
    pub surfaces: Box<dyn DisplaySurfaces>,
    pub decoder: Arc<dyn ImageDecoder>,
    pub timestamps: Arc<dyn TimestampLookup>,
    pub settings: Arc<dyn SettingsStore>,
    pub gate: Arc<dyn AdvanceGate>,
    /// Pins random ordering for reproducible playlists.
    pub shuffle_seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Running,
    Paused,
}

struct SlideshowEngine {
    surfaces: Box<dyn DisplaySurfaces>,
    decoder: Arc<dyn ImageDecoder>,
    settings: Arc<dyn SettingsStore>,
    gate: Arc<dyn AdvanceGate>,
    playlists: PlaylistEngine,
    playlist: PlaylistState,
    coordinator: TransitionCoordinator,
    zoom: ZoomScheduler,
    state: PlaybackState,
    battery: BatteryStatus,
    orientation: DeviceOrientation,
    /// Rotation that arrived mid-transition; applied once the swap settles.
    pending_orientation: Option<DeviceOrientation>,
    timer: Option<Pin<Box<Sleep>>>,
    events: Sender<EngineEvent>,
}

/// Runs one slideshow engine until `cancel` fires or the command channel closes.
///
/// All playback state lives on this task. Host lifecycle calls and gesture
/// commands arrive on `commands`; progress is reported on `events`.
pub async fn run(
    collaborators: Collaborators,
    mut commands: Receiver<HostCommand>,
    events: Sender<EngineEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut engine = SlideshowEngine::new(collaborators, events);

    loop {
        select! {
            _ = cancel.cancelled() => {
                engine.stop(StopReason::Shutdown).await;
                break;
            }

            command = commands.recv() => match command {
                Some(command) => engine.handle_command(command).await,
                None => {
                    debug!("host command channel closed");
                    engine.stop(StopReason::Shutdown).await;
                    break;
                }
            },

            _ = advance_due(&mut engine.timer), if engine.timer.is_some() => {
                engine.timer = None;
                engine.on_advance_timer().await;
            }

            step = engine.coordinator.next_step(), if !engine.coordinator.is_idle() => {
                engine.on_transition_step(step).await;
            }

            Some(finished) = engine.zoom.next_finished(), if engine.zoom.has_in_flight() => {
                engine.zoom.on_finished(finished);
            }
        }
    }

    info!("slideshow task stopped");
    Ok(())
}

async fn advance_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}

impl SlideshowEngine {
    fn new(collaborators: Collaborators, events: Sender<EngineEvent>) -> Self {
        let Collaborators {
            surfaces,
            decoder,
            timestamps,
            settings,
            gate,
            shuffle_seed,
        } = collaborators;
        Self {
            surfaces,
            decoder,
            settings,
            gate,
            playlists: PlaylistEngine::new(timestamps, shuffle_seed),
            playlist: PlaylistState::default(),
            coordinator: TransitionCoordinator::new(),
            zoom: ZoomScheduler::new(),
            state: PlaybackState::Stopped,
            battery: BatteryStatus::default(),
            orientation: DeviceOrientation::Landscape,
            pending_orientation: None,
            timer: None,
            events,
        }
    }

    async fn handle_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::StartSession {
                catalog,
                orientation,
                battery,
            } => self.start(catalog, orientation, battery).await,
            HostCommand::EndSession => self.stop(StopReason::EndRequested).await,
            HostCommand::ExternalExitRequested => self.stop(StopReason::ExternalExit).await,
            HostCommand::OrientationChanged(orientation) => {
                self.on_orientation_changed(orientation).await
            }
            HostCommand::BatteryChanged(status) => self.on_battery_changed(status).await,
            HostCommand::Gesture(gesture) => self.on_gesture(gesture).await,
        }
    }

    async fn start(
        &mut self,
        catalog: Vec<PhotoRecord>,
        orientation: DeviceOrientation,
        battery: BatteryStatus,
    ) {
        if self.state != PlaybackState::Stopped {
            debug!(state = ?self.state, "start ignored; session already active");
            return;
        }
        self.orientation = orientation;
        self.battery = battery;

        let settings = self.settings.load();
        self.playlist = self.playlists.build(catalog, &settings, orientation);
        if self.playlist.is_empty() {
            self.refuse_start(EngineError::EmptyPlaylist).await;
            return;
        }
        if let Err(err) = self.check_gate(&settings) {
            self.refuse_start(err).await;
            return;
        }

        self.state = PlaybackState::Running;
        info!(
            photos = self.playlist.len(),
            ?orientation,
            level = battery.level,
            charging = battery.charging,
            "slideshow session started"
        );
        self.emit(EngineEvent::SessionStarted {
            photos: self.playlist.len(),
        })
        .await;
        self.present_current(&settings, TransitionMode::Immediate, Direction::Fade);
    }

    async fn refuse_start(&mut self, err: EngineError) {
        warn!(error = %err, "slideshow session not started");
        self.emit(EngineEvent::Stopped(StopReason::Failed(err))).await;
    }

    /// Cancels the timer, cleans up zoom and abandons any transition. Safe to
    /// call repeatedly; only the first call on an active session emits `Stopped`.
    async fn stop(&mut self, reason: StopReason) {
        let was_active = self.state != PlaybackState::Stopped;
        self.timer = None;
        self.pending_orientation = None;
        self.zoom.cleanup();
        self.coordinator.abandon();
        self.state = PlaybackState::Stopped;

        if was_active {
            match reason.error() {
                Some(err) => warn!(error = %err, "slideshow stopped"),
                None => info!(?reason, "slideshow stopped"),
            }
            self.emit(EngineEvent::Stopped(reason)).await;
        } else {
            debug!(?reason, "stop ignored; already stopped");
        }
    }

    async fn on_advance_timer(&mut self) {
        if self.state != PlaybackState::Running {
            return;
        }
        let settings = self.settings.load();
        if let Err(err) = self.check_gate(&settings) {
            self.stop(StopReason::Failed(err)).await;
            return;
        }
        if !self.coordinator.is_idle() {
            debug!("auto-advance skipped; transition in flight");
            return;
        }
        if let Err(err) = self.playlist.next() {
            self.stop(StopReason::Failed(err)).await;
            return;
        }
        debug!(cursor = self.playlist.cursor(), "auto-advance");
        self.present_current(
            &settings,
            TransitionMode::Normal,
            Direction::from(settings.transition_style),
        );
    }

    async fn on_transition_step(&mut self, step: TransitionStep) {
        let settings = self.settings.load();
        let done = self
            .coordinator
            .on_step(step, &settings, &mut *self.surfaces, &mut self.zoom);
        if let Some(done) = done {
            self.on_transition_done(done, &settings).await;
        }
    }

    async fn on_transition_done(&mut self, done: TransitionDone, settings: &Settings) {
        info!(id = %done.id, index = done.index, mode = ?done.mode, "photo shown");
        self.emit(EngineEvent::PhotoShown {
            id: done.id,
            index: done.index,
        })
        .await;

        if let Some(orientation) = self.pending_orientation.take() {
            debug!(?orientation, "applying deferred orientation change");
            self.apply_orientation(orientation).await;
            return;
        }
        if self.state == PlaybackState::Running {
            self.arm_timer(settings.slide_duration);
        }
    }

    async fn on_gesture(&mut self, gesture: GestureCommand) {
        if self.state == PlaybackState::Stopped {
            debug!(?gesture, "gesture ignored; slideshow stopped");
            return;
        }
        match gesture {
            GestureCommand::Next(swipe) | GestureCommand::Previous(swipe) => {
                if !self.coordinator.is_idle() {
                    debug!(?gesture, "navigation dropped; transition in flight");
                    return;
                }
                self.timer = None;
                let settings = self.settings.load();
                if let Err(err) = self.check_gate(&settings) {
                    self.stop(StopReason::Failed(err)).await;
                    return;
                }
                let moved = match gesture {
                    GestureCommand::Previous(_) => self.playlist.previous().map(|_| ()),
                    _ => self.playlist.next().map(|_| ()),
                };
                if let Err(err) = moved {
                    self.stop(StopReason::Failed(err)).await;
                    return;
                }
                self.present_current(&settings, TransitionMode::Fast, Direction::from(swipe));
            }
            GestureCommand::PauseToggle => self.toggle_pause().await,
            GestureCommand::BrightnessDelta(delta) => {
                let mut settings = self.settings.load();
                settings.brightness = (settings.brightness + delta).clamp(0.0, 1.0);
                self.settings.save(&settings);
                debug!(brightness = settings.brightness, delta, "brightness adjusted");
                self.emit(EngineEvent::BrightnessChanged(settings.brightness))
                    .await;
            }
            GestureCommand::Exit => self.stop(StopReason::UserExit).await,
        }
    }

    async fn toggle_pause(&mut self) {
        match self.state {
            PlaybackState::Running => {
                self.state = PlaybackState::Paused;
                self.timer = None;
                self.zoom.pause();
                info!("slideshow paused");
                self.emit(EngineEvent::Paused).await;
            }
            PlaybackState::Paused => {
                self.state = PlaybackState::Running;
                self.zoom.resume();
                if self.coordinator.is_idle() {
                    let settings = self.settings.load();
                    self.arm_timer(settings.slide_duration);
                }
                info!("slideshow resumed");
                self.emit(EngineEvent::Resumed).await;
            }
            PlaybackState::Stopped => {}
        }
    }

    async fn on_orientation_changed(&mut self, orientation: DeviceOrientation) {
        if orientation == self.orientation && self.state != PlaybackState::Stopped {
            debug!(?orientation, "orientation unchanged");
            return;
        }
        self.orientation = orientation;
        if self.state == PlaybackState::Stopped {
            return;
        }
        if !self.coordinator.is_idle() {
            debug!(?orientation, "orientation change deferred until transition settles");
            self.pending_orientation = Some(orientation);
            return;
        }
        self.apply_orientation(orientation).await;
    }

    async fn apply_orientation(&mut self, orientation: DeviceOrientation) {
        let settings = self.settings.load();
        match self
            .playlists
            .on_orientation_changed(&mut self.playlist, &settings, orientation)
        {
            OrientationOutcome::BecameEmpty => {
                self.stop(StopReason::Failed(EngineError::EmptyPlaylist))
                    .await;
            }
            OrientationOutcome::Ready => {
                self.timer = None;
                self.present_current(&settings, TransitionMode::Immediate, Direction::Fade);
            }
        }
    }

    async fn on_battery_changed(&mut self, status: BatteryStatus) {
        self.battery = status;
        if self.state == PlaybackState::Stopped {
            return;
        }
        let settings = self.settings.load();
        if let Err(err) = self.check_gate(&settings) {
            self.stop(StopReason::Failed(err)).await;
        }
    }

    fn check_gate(&self, settings: &Settings) -> Result<(), EngineError> {
        self.gate
            .check(settings.battery_mode, self.battery)
            .map_err(EngineError::GateFailed)
    }

    fn present_current(&mut self, settings: &Settings, mode: TransitionMode, direction: Direction) {
        let Some(photo) = self.playlist.current().cloned() else {
            return;
        };
        let request = TransitionRequest {
            photo,
            index: self.playlist.cursor(),
            mode,
            direction,
        };
        // Rejections are logged by the coordinator.
        let _ = self.coordinator.begin(
            request,
            settings,
            &*self.decoder,
            &mut *self.surfaces,
            &mut self.zoom,
        );
    }

    /// Replaces any previous deadline.
    fn arm_timer(&mut self, after: Duration) {
        debug!(after_ms = after.as_millis() as u64, "auto-advance armed");
        self.timer = Some(Box::pin(sleep(after)));
    }

    async fn emit(&mut self, event: EngineEvent) {
        if self.events.send(event).await.is_err() {
            debug!("engine event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySettings;
    use crate::platform::battery::ThresholdGate;
    use crate::platform::headless::HeadlessSurfaces;
    use crate::testkit::{FixedTimestamps, StaticDecoder};
    use tokio::sync::mpsc;

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn engine_task_can_be_spawned_on_the_runtime() {
        let collaborators = Collaborators {
            surfaces: Box::new(HeadlessSurfaces::new(640.0, 480.0)),
            decoder: Arc::new(StaticDecoder::default()),
            timestamps: Arc::new(FixedTimestamps::default()),
            settings: Arc::new(MemorySettings::new(Settings::default())),
            gate: Arc::new(ThresholdGate::new(50)),
            shuffle_seed: None,
        };
        let (_command_tx, command_rx) = mpsc::channel(1);
        let (event_tx, _event_rx) = mpsc::channel(1);
        let task = run(collaborators, command_rx, event_tx, CancellationToken::new());
        assert_send(&task);
    }
}
