use std::f32::consts::PI;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::DecodedImage;

/// One of the two fixed display surfaces. Slots never change identity; only the
/// "which one is current" index in [`SurfacePair`] moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceSlot {
    A,
    B,
}

impl SurfaceSlot {
    pub const ALL: [SurfaceSlot; 2] = [SurfaceSlot::A, SurfaceSlot::B];

    pub fn other(self) -> Self {
        match self {
            SurfaceSlot::A => SurfaceSlot::B,
            SurfaceSlot::B => SurfaceSlot::A,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            SurfaceSlot::A => 0,
            SurfaceSlot::B => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfacePair {
    current: SurfaceSlot,
}

impl Default for SurfacePair {
    fn default() -> Self {
        Self {
            current: SurfaceSlot::A,
        }
    }
}

impl SurfacePair {
    pub fn current(&self) -> SurfaceSlot {
        self.current
    }

    /// The slot that stages the next photo.
    pub fn inactive(&self) -> SurfaceSlot {
        self.current.other()
    }

    pub fn flip(&mut self) {
        self.current = self.current.other();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSize {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimatedProperty {
    Opacity,
    TranslationX,
    TranslationY,
    /// Uniform scale applied to both axes.
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    /// Slow start and end, fastest through the middle.
    AccelerateDecelerate,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::AccelerateDecelerate => ((t + 1.0) * PI).cos() / 2.0 + 0.5,
        }
    }
}

/// A single property animation on one surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Animation {
    pub property: AnimatedProperty,
    pub from: f32,
    pub to: f32,
    pub duration: Duration,
    pub easing: Easing,
}

impl Animation {
    pub fn new(property: AnimatedProperty, from: f32, to: f32, duration: Duration, easing: Easing) -> Self {
        Self {
            property,
            from,
            to,
            duration,
            easing,
        }
    }

    /// Property value `elapsed` into the animation.
    pub fn value_at(&self, elapsed: Duration) -> f32 {
        let t = if self.duration.is_zero() {
            1.0
        } else {
            elapsed.as_secs_f32() / self.duration.as_secs_f32()
        };
        self.from + (self.to - self.from) * self.easing.apply(t)
    }
}

/// The two addressable display surfaces owned by the host.
pub trait DisplaySurfaces: Send {
    fn screen_size(&self) -> ScreenSize;
    fn set_opacity(&mut self, slot: SurfaceSlot, opacity: f32);
    fn set_translation(&mut self, slot: SurfaceSlot, x: f32, y: f32);
    fn set_scale(&mut self, slot: SurfaceSlot, x: f32, y: f32);
    fn set_image(&mut self, slot: SurfaceSlot, image: DecodedImage);

    /// Starts `animation` on `slot`. The returned future resolves when the
    /// animation ends, or early once `cancel` fires.
    fn animate(
        &mut self,
        slot: SurfaceSlot,
        animation: Animation,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_flips_between_fixed_slots() {
        let mut pair = SurfacePair::default();
        assert_eq!(pair.current(), SurfaceSlot::A);
        assert_eq!(pair.inactive(), SurfaceSlot::B);
        pair.flip();
        assert_eq!(pair.current(), SurfaceSlot::B);
        assert_eq!(pair.inactive(), SurfaceSlot::A);
    }

    #[test]
    fn accelerate_decelerate_is_symmetric() {
        let e = Easing::AccelerateDecelerate;
        assert!(e.apply(0.0).abs() < 1e-6);
        assert!((e.apply(1.0) - 1.0).abs() < 1e-6);
        assert!((e.apply(0.5) - 0.5).abs() < 1e-6);
        assert!(e.apply(0.1) < 0.1, "should start slower than linear");
    }

    #[test]
    fn value_at_interpolates() {
        let anim = Animation::new(
            AnimatedProperty::Opacity,
            1.0,
            0.0,
            Duration::from_millis(500),
            Easing::Linear,
        );
        assert!((anim.value_at(Duration::from_millis(250)) - 0.5).abs() < 1e-6);
        assert_eq!(anim.value_at(Duration::from_secs(5)), 0.0);
    }
}
