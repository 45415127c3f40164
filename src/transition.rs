use std::time::Duration;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::{Settings, TransitionStyle, ZoomStyle};
use crate::error::DecodeError;
use crate::events::{PhotoId, PhotoRecord, SwipeDirection};
use crate::platform::{
    AnimatedProperty, Animation, DecodedImage, DisplaySurfaces, Easing, ImageDecoder, ScreenSize,
    SurfacePair, SurfaceSlot,
};
use crate::zoom::ZoomScheduler;

pub const NORMAL_DURATION: Duration = Duration::from_millis(500);
pub const FAST_DURATION: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    Preparing,
    Animating,
    Settling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionMode {
    /// No animation: decode, then settle straight away.
    Immediate,
    Normal,
    /// Gesture navigation.
    Fast,
}

impl TransitionMode {
    pub fn duration(self) -> Duration {
        match self {
            TransitionMode::Immediate => Duration::ZERO,
            TransitionMode::Normal => NORMAL_DURATION,
            TransitionMode::Fast => FAST_DURATION,
        }
    }
}

/// Which way the incoming photo enters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Fade,
    Left,
    Right,
    Up,
    Down,
}

impl From<TransitionStyle> for Direction {
    fn from(style: TransitionStyle) -> Self {
        match style {
            TransitionStyle::Fade => Direction::Fade,
            TransitionStyle::SlideLeft => Direction::Left,
            TransitionStyle::SlideRight => Direction::Right,
            TransitionStyle::SlideUp => Direction::Up,
            TransitionStyle::SlideDown => Direction::Down,
        }
    }
}

impl From<SwipeDirection> for Direction {
    fn from(swipe: SwipeDirection) -> Self {
        match swipe {
            SwipeDirection::Left => Direction::Left,
            SwipeDirection::Right => Direction::Right,
            SwipeDirection::Up => Direction::Up,
            SwipeDirection::Down => Direction::Down,
        }
    }
}

/// Starting state of the staged surface before its enter animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagedProps {
    pub opacity: f32,
    pub translation: (f32, f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub incoming_start: StagedProps,
    pub outgoing: Animation,
    pub incoming: Animation,
}

/// Animation plan for one surface swap.
///
/// A fade cross-fades opacity linearly. Slides move the outgoing photo off one
/// edge while the incoming one enters from the opposite edge, with
/// accelerate-decelerate easing.
pub fn plan_for(direction: Direction, duration: Duration, screen: ScreenSize) -> TransitionPlan {
    let slide = |property: AnimatedProperty, distance: f32| {
        let start = match property {
            AnimatedProperty::TranslationY => (0.0, -distance),
            _ => (-distance, 0.0),
        };
        TransitionPlan {
            incoming_start: StagedProps {
                opacity: 1.0,
                translation: start,
            },
            outgoing: Animation::new(
                property,
                0.0,
                distance,
                duration,
                Easing::AccelerateDecelerate,
            ),
            incoming: Animation::new(
                property,
                -distance,
                0.0,
                duration,
                Easing::AccelerateDecelerate,
            ),
        }
    };

    match direction {
        Direction::Fade => TransitionPlan {
            incoming_start: StagedProps {
                opacity: 0.0,
                translation: (0.0, 0.0),
            },
            outgoing: Animation::new(AnimatedProperty::Opacity, 1.0, 0.0, duration, Easing::Linear),
            incoming: Animation::new(AnimatedProperty::Opacity, 0.0, 1.0, duration, Easing::Linear),
        },
        Direction::Left => slide(AnimatedProperty::TranslationX, -screen.width),
        Direction::Right => slide(AnimatedProperty::TranslationX, screen.width),
        Direction::Up => slide(AnimatedProperty::TranslationY, -screen.height),
        Direction::Down => slide(AnimatedProperty::TranslationY, screen.height),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub photo: PhotoRecord,
    /// Position of `photo` in the filtered playlist; drives sine-wave alternation.
    pub index: usize,
    pub mode: TransitionMode,
    pub direction: Direction,
}

/// Result of the coordinator's in-flight asynchronous step.
#[derive(Debug)]
pub enum TransitionStep {
    Decoded(Result<DecodedImage, DecodeError>),
    Animated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionDone {
    pub id: PhotoId,
    pub index: usize,
    pub slot: SurfaceSlot,
    pub mode: TransitionMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("transition requested while {phase:?}")]
pub struct InvalidTransitionRequest {
    pub phase: TransitionPhase,
}

#[derive(Debug)]
struct ActiveTransition {
    request: TransitionRequest,
    staged: SurfaceSlot,
    skip_animation: bool,
}

/// Swaps photos between the two display surfaces, one transition at a time.
///
/// The coordinator never awaits anything itself: it hands out the pending step
/// through [`TransitionCoordinator::next_step`] and the owner feeds the result
/// back into [`TransitionCoordinator::on_step`].
pub struct TransitionCoordinator {
    phase: TransitionPhase,
    pair: SurfacePair,
    presented: bool,
    active: Option<ActiveTransition>,
    step: Option<BoxFuture<'static, TransitionStep>>,
    cancel: CancellationToken,
}

impl Default for TransitionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionCoordinator {
    pub fn new() -> Self {
        Self {
            phase: TransitionPhase::Idle,
            pair: SurfacePair::default(),
            presented: false,
            active: None,
            step: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == TransitionPhase::Idle
    }

    pub fn current_slot(&self) -> SurfaceSlot {
        self.pair.current()
    }

    pub fn has_presented(&self) -> bool {
        self.presented
    }

    /// Enters `Preparing`: stages the inactive surface and starts decoding.
    pub fn begin(
        &mut self,
        request: TransitionRequest,
        settings: &Settings,
        decoder: &dyn ImageDecoder,
        surfaces: &mut dyn DisplaySurfaces,
        zoom: &mut ZoomScheduler,
    ) -> Result<(), InvalidTransitionRequest> {
        if self.phase != TransitionPhase::Idle {
            let err = InvalidTransitionRequest { phase: self.phase };
            debug!(id = %request.photo.id, error = %err, "transition request rejected");
            return Err(err);
        }

        let staged = self.pair.inactive();
        let skip_animation = request.mode == TransitionMode::Immediate || !self.presented;
        debug!(
            id = %request.photo.id,
            index = request.index,
            mode = ?request.mode,
            direction = ?request.direction,
            ?staged,
            skip_animation,
            "transition preparing"
        );
        self.phase = TransitionPhase::Preparing;

        zoom.set_initial_scale(surfaces, staged, request.index, settings);
        if !skip_animation && settings.zoom_style == ZoomStyle::SineWave {
            zoom.start(surfaces, staged, request.index, settings, true);
        }

        self.step = Some(
            decoder
                .decode(&request.photo)
                .map(TransitionStep::Decoded)
                .boxed(),
        );
        self.active = Some(ActiveTransition {
            request,
            staged,
            skip_animation,
        });
        Ok(())
    }

    /// Resolves with the in-flight step. Pending forever while idle, so callers
    /// should only poll it when [`TransitionCoordinator::is_idle`] is false.
    pub async fn next_step(&mut self) -> TransitionStep {
        match self.step.as_mut() {
            Some(step) => {
                let outcome = step.await;
                self.step = None;
                outcome
            }
            None => future::pending().await,
        }
    }

    /// Advances the state machine with a finished step. Returns the settled
    /// transition once the swap is complete.
    pub fn on_step(
        &mut self,
        step: TransitionStep,
        settings: &Settings,
        surfaces: &mut dyn DisplaySurfaces,
        zoom: &mut ZoomScheduler,
    ) -> Option<TransitionDone> {
        match (self.phase, step) {
            (TransitionPhase::Preparing, TransitionStep::Decoded(decoded)) => {
                let active = self.active.as_ref()?;
                let staged = active.staged;
                let image = decoded.unwrap_or_else(|err| {
                    warn!(id = %err.id, error = %err, "decode failed; showing placeholder");
                    DecodedImage::placeholder(active.request.photo.id.clone())
                });
                surfaces.set_image(staged, image);

                if active.skip_animation {
                    surfaces.set_translation(staged, 0.0, 0.0);
                    surfaces.set_opacity(staged, 1.0);
                    return self.settle(settings, surfaces, zoom);
                }
                self.animate(settings, surfaces, zoom);
                None
            }
            (TransitionPhase::Animating, TransitionStep::Animated) => {
                self.settle(settings, surfaces, zoom)
            }
            (phase, step) => {
                trace!(?phase, ?step, "ignoring stale transition step");
                None
            }
        }
    }

    fn animate(
        &mut self,
        settings: &Settings,
        surfaces: &mut dyn DisplaySurfaces,
        zoom: &mut ZoomScheduler,
    ) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let staged = active.staged;
        let outgoing = self.pair.current();
        let request = &active.request;
        self.phase = TransitionPhase::Animating;

        let plan = plan_for(
            request.direction,
            request.mode.duration(),
            surfaces.screen_size(),
        );
        let (x, y) = plan.incoming_start.translation;
        surfaces.set_translation(staged, x, y);
        surfaces.set_opacity(staged, plan.incoming_start.opacity);

        match settings.zoom_style {
            ZoomStyle::Sawtooth => {
                zoom.start(surfaces, staged, request.index, settings, false);
            }
            ZoomStyle::SineWave if !zoom.is_running(staged) => {
                zoom.start(surfaces, staged, request.index, settings, false);
            }
            ZoomStyle::SineWave => {}
        }

        debug!(
            id = %request.photo.id,
            duration_ms = request.mode.duration().as_millis() as u64,
            "transition animating"
        );
        let animations = [
            surfaces.animate(outgoing, plan.outgoing, self.cancel.child_token()),
            surfaces.animate(staged, plan.incoming, self.cancel.child_token()),
        ];
        self.step = Some(
            future::join_all(animations)
                .map(|_| TransitionStep::Animated)
                .boxed(),
        );
    }

    fn settle(
        &mut self,
        settings: &Settings,
        surfaces: &mut dyn DisplaySurfaces,
        zoom: &mut ZoomScheduler,
    ) -> Option<TransitionDone> {
        let active = self.active.take()?;
        self.phase = TransitionPhase::Settling;
        self.pair.flip();

        let retired = self.pair.inactive();
        zoom.cancel(retired);
        surfaces.set_opacity(retired, 0.0);
        surfaces.set_translation(retired, 0.0, 0.0);
        surfaces.set_scale(retired, 1.0, 1.0);

        let current = self.pair.current();
        if active.skip_animation {
            zoom.start(surfaces, current, active.request.index, settings, false);
        }

        self.presented = true;
        self.phase = TransitionPhase::Idle;
        let done = TransitionDone {
            id: active.request.photo.id,
            index: active.request.index,
            slot: current,
            mode: active.request.mode,
        };
        debug!(id = %done.id, slot = ?done.slot, "transition settled");
        Some(done)
    }

    /// Drops the in-flight step without running its completion logic and
    /// cancels any running animation.
    pub fn abandon(&mut self) {
        if self.phase != TransitionPhase::Idle {
            debug!(phase = ?self.phase, "abandoning transition");
        }
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.step = None;
        self.active = None;
        self.phase = TransitionPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PhotoOrientation;
    use crate::platform::headless::{HeadlessSurfaces, SurfaceOp};
    use crate::testkit::StaticDecoder;

    const SCREEN: ScreenSize = ScreenSize {
        width: 800.0,
        height: 600.0,
    };

    fn request(id: &str, index: usize, mode: TransitionMode, direction: Direction) -> TransitionRequest {
        TransitionRequest {
            photo: PhotoRecord::new(id, PhotoOrientation::Landscape, 1.5),
            index,
            mode,
            direction,
        }
    }

    struct Rig {
        coordinator: TransitionCoordinator,
        surfaces: HeadlessSurfaces,
        zoom: ZoomScheduler,
        decoder: StaticDecoder,
        settings: Settings,
    }

    impl Rig {
        fn new(settings: Settings) -> Self {
            Self {
                coordinator: TransitionCoordinator::new(),
                surfaces: HeadlessSurfaces::new(SCREEN.width, SCREEN.height),
                zoom: ZoomScheduler::new(),
                decoder: StaticDecoder::default(),
                settings,
            }
        }

        fn begin(&mut self, req: TransitionRequest) -> Result<(), InvalidTransitionRequest> {
            self.coordinator.begin(
                req,
                &self.settings,
                &self.decoder,
                &mut self.surfaces,
                &mut self.zoom,
            )
        }

        async fn run_to_idle(&mut self) -> TransitionDone {
            loop {
                let step = self.coordinator.next_step().await;
                if let Some(done) =
                    self.coordinator
                        .on_step(step, &self.settings, &mut self.surfaces, &mut self.zoom)
                {
                    return done;
                }
            }
        }
    }

    #[test]
    fn plan_table_covers_every_direction() {
        let d = NORMAL_DURATION;
        let fade = plan_for(Direction::Fade, d, SCREEN);
        assert_eq!(fade.outgoing.property, AnimatedProperty::Opacity);
        assert_eq!((fade.outgoing.from, fade.outgoing.to), (1.0, 0.0));
        assert_eq!((fade.incoming.from, fade.incoming.to), (0.0, 1.0));
        assert_eq!(fade.incoming.easing, Easing::Linear);

        let left = plan_for(Direction::Left, d, SCREEN);
        assert_eq!(left.outgoing.property, AnimatedProperty::TranslationX);
        assert_eq!((left.outgoing.from, left.outgoing.to), (0.0, -800.0));
        assert_eq!((left.incoming.from, left.incoming.to), (800.0, 0.0));
        assert_eq!(left.incoming_start.translation, (800.0, 0.0));
        assert_eq!(left.outgoing.easing, Easing::AccelerateDecelerate);

        let right = plan_for(Direction::Right, d, SCREEN);
        assert_eq!((right.outgoing.from, right.outgoing.to), (0.0, 800.0));
        assert_eq!((right.incoming.from, right.incoming.to), (-800.0, 0.0));

        let up = plan_for(Direction::Up, d, SCREEN);
        assert_eq!(up.outgoing.property, AnimatedProperty::TranslationY);
        assert_eq!((up.outgoing.from, up.outgoing.to), (0.0, -600.0));
        assert_eq!(up.incoming_start.translation, (0.0, 600.0));

        let down = plan_for(Direction::Down, d, SCREEN);
        assert_eq!((down.incoming.from, down.incoming.to), (-600.0, 0.0));
    }

    #[test]
    fn swipe_and_style_map_to_directions() {
        assert_eq!(Direction::from(SwipeDirection::Left), Direction::Left);
        assert_eq!(Direction::from(TransitionStyle::SlideDown), Direction::Down);
        assert_eq!(Direction::from(TransitionStyle::Fade), Direction::Fade);
        assert_eq!(TransitionMode::Fast.duration(), FAST_DURATION);
    }

    #[tokio::test(start_paused = true)]
    async fn first_presentation_settles_without_animating() {
        let mut rig = Rig::new(Settings::default());
        let probe = rig.surfaces.probe();
        rig.begin(request("A", 0, TransitionMode::Normal, Direction::Fade))
            .unwrap();
        assert_eq!(rig.coordinator.phase(), TransitionPhase::Preparing);

        let done = rig.run_to_idle().await;
        assert_eq!(done.id.as_str(), "A");
        assert_eq!(done.slot, SurfaceSlot::B);
        assert!(rig.coordinator.is_idle());
        assert!(rig.coordinator.has_presented());

        let opacity_or_slide = probe
            .animations()
            .into_iter()
            .filter(|(_, a)| a.property != AnimatedProperty::Scale)
            .count();
        assert_eq!(opacity_or_slide, 0);
        assert!(rig.zoom.is_running(SurfaceSlot::B));
        assert_eq!(probe.props(SurfaceSlot::B).opacity, 1.0);
        assert_eq!(probe.props(SurfaceSlot::A).opacity, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_request_while_busy_is_rejected() {
        let mut rig = Rig::new(Settings::default());
        rig.begin(request("A", 0, TransitionMode::Immediate, Direction::Fade))
            .unwrap();
        rig.run_to_idle().await;

        rig.begin(request("B", 1, TransitionMode::Normal, Direction::Fade))
            .unwrap();
        let err = rig
            .begin(request("C", 2, TransitionMode::Fast, Direction::Left))
            .unwrap_err();
        assert_eq!(err.phase, TransitionPhase::Preparing);

        let done = rig.run_to_idle().await;
        assert_eq!(done.id.as_str(), "B");
    }

    #[tokio::test(start_paused = true)]
    async fn fast_slide_runs_quarter_second_and_resets_retired_surface() {
        let mut rig = Rig::new(Settings::default());
        let probe = rig.surfaces.probe();
        rig.begin(request("A", 0, TransitionMode::Immediate, Direction::Fade))
            .unwrap();
        rig.run_to_idle().await;
        probe.clear_journal();

        rig.begin(request("B", 1, TransitionMode::Fast, Direction::Left))
            .unwrap();
        let started = tokio::time::Instant::now();
        let done = rig.run_to_idle().await;
        assert!(started.elapsed() >= FAST_DURATION);
        assert_eq!(done.slot, SurfaceSlot::A);
        assert_eq!(rig.coordinator.current_slot(), SurfaceSlot::A);

        let slides: Vec<_> = probe
            .animations()
            .into_iter()
            .filter(|(_, a)| a.property == AnimatedProperty::TranslationX)
            .collect();
        assert_eq!(slides.len(), 2);
        assert!(slides.iter().all(|(_, a)| a.duration == FAST_DURATION));

        let retired = probe.props(SurfaceSlot::B);
        assert_eq!(retired.opacity, 0.0);
        assert_eq!(retired.translation, (0.0, 0.0));
        assert_eq!(retired.scale, (1.0, 1.0));
        assert!(rig.zoom.state(SurfaceSlot::B).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn decode_failure_shows_placeholder() {
        let mut rig = Rig::new(Settings::default());
        rig.decoder = StaticDecoder::default().failing("broken");
        let probe = rig.surfaces.probe();
        rig.begin(request("broken", 0, TransitionMode::Immediate, Direction::Fade))
            .unwrap();
        rig.run_to_idle().await;

        let placeholder = probe.journal().into_iter().any(|op| {
            matches!(op, SurfaceOp::Image { ref id, placeholder: true, .. } if id.as_str() == "broken")
        });
        assert!(placeholder);
    }

    #[tokio::test(start_paused = true)]
    async fn sine_wave_zoom_is_pre_staged_and_not_restarted() {
        let settings = Settings {
            zoom_style: ZoomStyle::SineWave,
            ..Settings::default()
        };
        let mut rig = Rig::new(settings);
        let probe = rig.surfaces.probe();
        rig.begin(request("A", 0, TransitionMode::Immediate, Direction::Fade))
            .unwrap();
        rig.run_to_idle().await;
        probe.clear_journal();

        rig.begin(request("B", 1, TransitionMode::Normal, Direction::Fade))
            .unwrap();
        let staged = rig.zoom.state(SurfaceSlot::A).copied().unwrap();
        assert!(staged.pre_staged);
        assert!(staged.start_scale > staged.end_scale, "odd index zooms out");

        rig.run_to_idle().await;
        let scale_animations = probe
            .animations()
            .into_iter()
            .filter(|(_, a)| a.property == AnimatedProperty::Scale)
            .count();
        assert_eq!(scale_animations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sawtooth_zoom_waits_for_animation_phase() {
        let mut rig = Rig::new(Settings::default());
        rig.decoder = StaticDecoder::default().with_delay(Duration::from_millis(100));
        rig.begin(request("A", 0, TransitionMode::Immediate, Direction::Fade))
            .unwrap();
        rig.run_to_idle().await;

        rig.begin(request("B", 1, TransitionMode::Normal, Direction::Fade))
            .unwrap();
        assert!(rig.zoom.state(SurfaceSlot::A).is_none());

        let step = rig.coordinator.next_step().await;
        assert!(
            rig.coordinator
                .on_step(step, &rig.settings, &mut rig.surfaces, &mut rig.zoom)
                .is_none()
        );
        assert_eq!(rig.coordinator.phase(), TransitionPhase::Animating);
        assert!(rig.zoom.is_running(SurfaceSlot::A));
    }

    #[tokio::test(start_paused = true)]
    async fn abandon_returns_to_idle_and_cancels_animations() {
        let mut rig = Rig::new(Settings::default());
        rig.begin(request("A", 0, TransitionMode::Immediate, Direction::Fade))
            .unwrap();
        rig.run_to_idle().await;
        rig.begin(request("B", 1, TransitionMode::Normal, Direction::Fade))
            .unwrap();
        let step = rig.coordinator.next_step().await;
        rig.coordinator
            .on_step(step, &rig.settings, &mut rig.surfaces, &mut rig.zoom);
        assert_eq!(rig.coordinator.phase(), TransitionPhase::Animating);

        rig.coordinator.abandon();
        assert!(rig.coordinator.is_idle());
        let stale = rig.coordinator.on_step(
            TransitionStep::Animated,
            &rig.settings,
            &mut rig.surfaces,
            &mut rig.zoom,
        );
        assert!(stale.is_none());
    }
}
