use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::{Settings, ZoomStyle};
use crate::platform::{AnimatedProperty, Animation, DisplaySurfaces, Easing, SurfaceSlot};

/// Longer zooms are imperceptible, so the zoom never outlasts this.
pub const MAX_ZOOM_DURATION: Duration = Duration::from_secs(15);

pub fn zoom_duration(slide_duration: Duration) -> Duration {
    slide_duration.min(MAX_ZOOM_DURATION)
}

/// `(start, end)` scale for the photo at `photo_index`.
///
/// Sawtooth zooms in on every photo. Sine-wave zooms in on even indices and out
/// on odd ones, so consecutive photos breathe in and out.
pub fn zoom_scales(style: ZoomStyle, photo_index: usize, factor: f32) -> (f32, f32) {
    let zoomed = 1.0 + factor;
    match style {
        ZoomStyle::Sawtooth => (1.0, zoomed),
        ZoomStyle::SineWave if photo_index % 2 == 0 => (1.0, zoomed),
        ZoomStyle::SineWave => (zoomed, 1.0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    pub running: bool,
    pub start_scale: f32,
    pub end_scale: f32,
    pub started_at: Instant,
    pub capped_duration_ms: u64,
    /// Started while the surface was still being prepared (sine-wave zoom).
    pub pre_staged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomFinished {
    pub slot: SurfaceSlot,
    generation: u64,
}

#[derive(Debug)]
struct SlotZoom {
    state: ZoomState,
    cancel: CancellationToken,
    generation: u64,
}

/// Runs the slow scale animation on each surface slot.
///
/// Pausing only refuses new starts; a zoom already in flight keeps running.
#[derive(Default)]
pub struct ZoomScheduler {
    slots: [Option<SlotZoom>; 2],
    paused: bool,
    generation: u64,
    in_flight: FuturesUnordered<BoxFuture<'static, ZoomFinished>>,
}

impl ZoomScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_initial_scale(
        &mut self,
        surfaces: &mut dyn DisplaySurfaces,
        slot: SurfaceSlot,
        photo_index: usize,
        settings: &Settings,
    ) {
        let (scale, _) = zoom_scales(settings.zoom_style, photo_index, settings.zoom_factor());
        surfaces.set_scale(slot, scale, scale);
    }

    /// Starts the zoom for `photo_index` on `slot`, replacing any zoom already
    /// running there. Returns `false` when refused because the scheduler is paused.
    pub fn start(
        &mut self,
        surfaces: &mut dyn DisplaySurfaces,
        slot: SurfaceSlot,
        photo_index: usize,
        settings: &Settings,
        pre_stage: bool,
    ) -> bool {
        if self.paused {
            debug!(?slot, photo_index, "zoom start refused while paused");
            return false;
        }
        self.cancel(slot);

        let (start_scale, end_scale) =
            zoom_scales(settings.zoom_style, photo_index, settings.zoom_factor());
        surfaces.set_scale(slot, start_scale, start_scale);
        if (start_scale - end_scale).abs() < f32::EPSILON {
            trace!(?slot, "zoom amount is zero; nothing to animate");
            return true;
        }

        let duration = zoom_duration(settings.slide_duration);
        let animation = Animation::new(
            AnimatedProperty::Scale,
            start_scale,
            end_scale,
            duration,
            Easing::Linear,
        );
        let cancel = CancellationToken::new();
        let done = surfaces.animate(slot, animation, cancel.clone());

        self.generation += 1;
        let generation = self.generation;
        self.in_flight.push(
            async move {
                done.await;
                ZoomFinished { slot, generation }
            }
            .boxed(),
        );

        let state = ZoomState {
            running: true,
            start_scale,
            end_scale,
            started_at: Instant::now(),
            capped_duration_ms: duration.as_millis() as u64,
            pre_staged: pre_stage,
        };
        debug!(
            ?slot,
            photo_index,
            start_scale,
            end_scale,
            duration_ms = state.capped_duration_ms,
            pre_stage,
            "zoom started"
        );
        self.slots[slot.index()] = Some(SlotZoom {
            state,
            cancel,
            generation,
        });
        true
    }

    pub fn cancel(&mut self, slot: SurfaceSlot) {
        if let Some(previous) = self.slots[slot.index()].take() {
            trace!(?slot, running = previous.state.running, "zoom cancelled");
            previous.cancel.cancel();
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_running(&self, slot: SurfaceSlot) -> bool {
        self.state(slot).is_some_and(|state| state.running)
    }

    pub fn state(&self, slot: SurfaceSlot) -> Option<&ZoomState> {
        self.slots[slot.index()].as_ref().map(|entry| &entry.state)
    }

    /// Cancels every zoom and clears the pause flag. Called once at engine teardown.
    pub fn cleanup(&mut self) {
        for slot in SurfaceSlot::ALL {
            self.cancel(slot);
        }
        self.in_flight = FuturesUnordered::new();
        self.paused = false;
    }

    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Resolves when the next zoom animation ends (or is cancelled).
    pub async fn next_finished(&mut self) -> Option<ZoomFinished> {
        self.in_flight.next().await
    }

    /// Zoom completion is observed only to keep [`ZoomState::running`] accurate.
    pub fn on_finished(&mut self, finished: ZoomFinished) {
        if let Some(entry) = self.slots[finished.slot.index()].as_mut() {
            if entry.generation == finished.generation {
                entry.state.running = false;
                trace!(slot = ?finished.slot, "zoom finished");
            }
        }
    }
}
