use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::GestureConfig;
use crate::events::{GestureCommand, HostCommand, PointerEvent, PointerPhase, SwipeDirection};
use crate::platform::{GestureFeedback, ScreenSize};

/// `paused` mirrors the engine's Running/Paused state as last toggled by a tap;
/// `last_accepted_at` is the debounce clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GestureState {
    pub paused: bool,
    pub last_accepted_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy)]
struct TouchStart {
    x: f32,
    y: f32,
    second_tap: bool,
}

/// Turns raw pointer samples into slideshow commands.
///
/// A tap is only reported as [`GestureCommand::PauseToggle`] once the
/// double-tap window has passed without a second tap; the owner drives that
/// through [`GestureRouter::handle_timeout`].
pub struct GestureRouter {
    config: GestureConfig,
    screen: ScreenSize,
    state: GestureState,
    touch: Option<TouchStart>,
    pending_tap: Option<Instant>,
    hint_dismissed: bool,
    feedback: Box<dyn GestureFeedback>,
}

impl GestureRouter {
    pub fn new(config: GestureConfig, screen: ScreenSize, feedback: Box<dyn GestureFeedback>) -> Self {
        Self {
            config,
            screen,
            state: GestureState::default(),
            touch: None,
            pending_tap: None,
            hint_dismissed: false,
            feedback,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn on_pointer(&mut self, event: PointerEvent) -> Option<GestureCommand> {
        match event.phase {
            PointerPhase::Down => {
                self.on_down(event);
                None
            }
            PointerPhase::Move => None,
            PointerPhase::Up => self.on_up(event),
        }
    }

    fn on_down(&mut self, event: PointerEvent) {
        let margin = self.config.edge_margin_px;
        if event.x < margin || event.x > self.screen.width - margin {
            debug!(x = event.x, margin, "touch started at screen edge; ignored");
            self.touch = None;
            return;
        }
        let second_tap = self
            .pending_tap
            .is_some_and(|deadline| event.at <= deadline);
        self.touch = Some(TouchStart {
            x: event.x,
            y: event.y,
            second_tap,
        });
    }

    fn on_up(&mut self, event: PointerEvent) -> Option<GestureCommand> {
        let start = self.touch.take()?;
        let dx = event.x - start.x;
        let dy = event.y - start.y;
        let slop = self.config.tap_slop_px;

        if dx.abs() <= slop && dy.abs() <= slop {
            if start.second_tap {
                self.pending_tap = None;
                return self.accept(GestureCommand::Exit, event.at);
            }
            self.pending_tap = Some(event.at + self.config.double_tap_window());
            return None;
        }

        if dx.abs() > dy.abs() {
            if dx.abs() > self.config.fling_min_distance_px
                && event.velocity_x.abs() > self.config.fling_min_velocity_px_per_s
            {
                let command = if dx < 0.0 {
                    GestureCommand::Next(SwipeDirection::Left)
                } else {
                    GestureCommand::Previous(SwipeDirection::Right)
                };
                return self.accept(command, event.at);
            }
            debug!(dx, vx = event.velocity_x, "horizontal swipe below fling thresholds");
            return None;
        }

        if start.x < self.screen.width / 2.0 && self.screen.height > 0.0 {
            return self.accept(GestureCommand::BrightnessDelta(-dy / self.screen.height), event.at);
        }
        debug!(x = start.x, dy, "vertical drag outside brightness area");
        None
    }

    /// Confirms a pending single tap once its double-tap window has passed.
    pub fn handle_timeout(&mut self, now: Instant) -> Option<GestureCommand> {
        match self.pending_tap {
            Some(deadline) if now >= deadline => {
                self.pending_tap = None;
                self.accept(GestureCommand::PauseToggle, now)
            }
            _ => None,
        }
    }

    pub fn time_until_deadline(&self, now: Instant) -> Option<Duration> {
        self.pending_tap
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    fn accept(&mut self, command: GestureCommand, now: Instant) -> Option<GestureCommand> {
        if let Some(last) = self.state.last_accepted_at {
            if now.saturating_duration_since(last) < self.config.debounce() {
                debug!(?command, "debounced gesture");
                return None;
            }
        }
        self.state.last_accepted_at = Some(now);
        if command == GestureCommand::PauseToggle {
            self.state.paused = !self.state.paused;
        }

        self.feedback.haptic_pulse();
        if !self.hint_dismissed {
            self.feedback.dismiss_hint();
            self.hint_dismissed = true;
        }
        debug!(?command, "gesture accepted");
        Some(command)
    }
}

/// Feeds pointer events through `router` and forwards the resulting commands
/// to the slideshow engine until cancelled or either channel closes.
pub async fn run(
    mut router: GestureRouter,
    mut pointer_rx: Receiver<PointerEvent>,
    commands: Sender<HostCommand>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let wait = router.time_until_deadline(now());
        let tap_deadline = async move {
            match wait {
                Some(delay) => tokio::time::sleep(delay).await,
                None => std::future::pending().await,
            }
        };

        let command = select! {
            _ = cancel.cancelled() => break,
            event = pointer_rx.recv() => match event {
                Some(event) => router.on_pointer(event),
                None => {
                    debug!("pointer channel closed");
                    break;
                }
            },
            _ = tap_deadline => router.handle_timeout(now()),
        };

        if let Some(command) = command {
            if commands.send(HostCommand::Gesture(command)).await.is_err() {
                debug!("slideshow command channel closed");
                break;
            }
        }
    }
    info!("gesture task stopped");
    Ok(())
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
