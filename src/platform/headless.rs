use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{AnimatedProperty, Animation, DecodedImage, DisplaySurfaces, ScreenSize, SurfaceSlot};
use crate::events::PhotoId;

/// Visual state of one surface as last set by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceProps {
    pub opacity: f32,
    pub translation: (f32, f32),
    pub scale: (f32, f32),
    pub image: Option<PhotoId>,
}

impl Default for SurfaceProps {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            translation: (0.0, 0.0),
            scale: (1.0, 1.0),
            image: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Opacity { slot: SurfaceSlot, value: f32 },
    Translation { slot: SurfaceSlot, x: f32, y: f32 },
    Scale { slot: SurfaceSlot, x: f32, y: f32 },
    Image { slot: SurfaceSlot, id: PhotoId, placeholder: bool },
    Animate { slot: SurfaceSlot, animation: Animation },
}

#[derive(Debug, Default)]
struct HeadlessState {
    props: [SurfaceProps; 2],
    journal: Vec<SurfaceOp>,
}

/// Display surfaces without a screen: every operation is logged and journaled,
/// animations resolve after their duration on the tokio clock. Property values
/// jump to the animation's end value when the animation starts.
#[derive(Debug, Clone)]
pub struct HeadlessSurfaces {
    screen: ScreenSize,
    state: Arc<Mutex<HeadlessState>>,
}

/// Read-only handle onto a [`HeadlessSurfaces`] for inspection after it has been
/// handed to the engine.
#[derive(Debug, Clone)]
pub struct SurfaceProbe {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessSurfaces {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            screen: ScreenSize { width, height },
            state: Arc::default(),
        }
    }

    pub fn probe(&self) -> SurfaceProbe {
        SurfaceProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn record(&self, op: SurfaceOp) {
        trace!(?op, "surface op");
        let mut state = lock(&self.state);
        apply(&mut state.props, &op);
        state.journal.push(op);
    }
}

impl SurfaceProbe {
    pub fn props(&self, slot: SurfaceSlot) -> SurfaceProps {
        lock(&self.state).props[slot.index()].clone()
    }

    pub fn journal(&self) -> Vec<SurfaceOp> {
        lock(&self.state).journal.clone()
    }

    pub fn animations(&self) -> Vec<(SurfaceSlot, Animation)> {
        lock(&self.state)
            .journal
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::Animate { slot, animation } => Some((*slot, *animation)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_journal(&self) {
        lock(&self.state).journal.clear();
    }
}

fn lock(state: &Mutex<HeadlessState>) -> MutexGuard<'_, HeadlessState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn apply(props: &mut [SurfaceProps; 2], op: &SurfaceOp) {
    match op {
        SurfaceOp::Opacity { slot, value } => props[slot.index()].opacity = *value,
        SurfaceOp::Translation { slot, x, y } => props[slot.index()].translation = (*x, *y),
        SurfaceOp::Scale { slot, x, y } => props[slot.index()].scale = (*x, *y),
        SurfaceOp::Image { slot, id, .. } => props[slot.index()].image = Some(id.clone()),
        SurfaceOp::Animate { slot, animation } => {
            let p = &mut props[slot.index()];
            match animation.property {
                AnimatedProperty::Opacity => p.opacity = animation.to,
                AnimatedProperty::TranslationX => p.translation.0 = animation.to,
                AnimatedProperty::TranslationY => p.translation.1 = animation.to,
                AnimatedProperty::Scale => p.scale = (animation.to, animation.to),
            }
        }
    }
}

impl DisplaySurfaces for HeadlessSurfaces {
    fn screen_size(&self) -> ScreenSize {
        self.screen
    }

    fn set_opacity(&mut self, slot: SurfaceSlot, opacity: f32) {
        self.record(SurfaceOp::Opacity {
            slot,
            value: opacity,
        });
    }

    fn set_translation(&mut self, slot: SurfaceSlot, x: f32, y: f32) {
        self.record(SurfaceOp::Translation { slot, x, y });
    }

    fn set_scale(&mut self, slot: SurfaceSlot, x: f32, y: f32) {
        self.record(SurfaceOp::Scale { slot, x, y });
    }

    fn set_image(&mut self, slot: SurfaceSlot, image: DecodedImage) {
        debug!(
            ?slot,
            id = %image.id,
            width = image.frame.width,
            height = image.frame.height,
            placeholder = image.placeholder,
            "surface image set"
        );
        self.record(SurfaceOp::Image {
            slot,
            id: image.id,
            placeholder: image.placeholder,
        });
    }

    fn animate(
        &mut self,
        slot: SurfaceSlot,
        animation: Animation,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, ()> {
        self.record(SurfaceOp::Animate { slot, animation });
        let duration = animation.duration;
        async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(duration) => {}
            }
        }
        .boxed()
    }
}
