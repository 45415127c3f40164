//! Seams to the host device: display surfaces, image decoding, settings
//! persistence, photo timestamps, the battery gate and gesture feedback.

pub mod battery;
pub mod headless;
pub mod surface;

use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Result;
use futures::future::BoxFuture;

use crate::config::{BatteryMode, Settings};
use crate::error::{DecodeError, GateReason};
use crate::events::{BatteryStatus, PhotoId, PhotoRecord};

pub use surface::{
    AnimatedProperty, Animation, DisplaySurfaces, Easing, ScreenSize, SurfacePair, SurfaceSlot,
};

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

/// A decoded photo ready to be placed on a display surface.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub id: PhotoId,
    pub frame: RgbaFrame,
    /// Blurred, darkened variant used to fill the letterbox behind the photo.
    pub backdrop: Option<RgbaFrame>,
    /// Set when the frame stands in for a photo that failed to decode.
    pub placeholder: bool,
}

impl DecodedImage {
    /// Single black pixel shown in place of a photo that could not be decoded.
    pub fn placeholder(id: PhotoId) -> Self {
        Self {
            id,
            frame: RgbaFrame {
                width: 1,
                height: 1,
                pixels: Arc::from(vec![0, 0, 0, 255]),
            },
            backdrop: None,
            placeholder: true,
        }
    }
}

pub trait ImageDecoder: Send + Sync {
    /// Decodes `photo`; the returned future resolves exactly once.
    fn decode(&self, photo: &PhotoRecord) -> BoxFuture<'static, Result<DecodedImage, DecodeError>>;
}

/// Timestamps used by date-based ordering.
pub trait TimestampLookup: Send + Sync {
    fn modified_at(&self, id: &PhotoId) -> Result<SystemTime>;
    fn created_at(&self, id: &PhotoId) -> Result<SystemTime>;
}

pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings);
}

/// Battery predicate consulted at session start and before every advance.
pub trait AdvanceGate: Send + Sync {
    fn check(&self, mode: BatteryMode, status: BatteryStatus) -> Result<(), GateReason>;

    fn can_advance(&self, mode: BatteryMode, level: u8, charging: bool) -> bool {
        self.check(mode, BatteryStatus { level, charging }).is_ok()
    }
}

/// Side effects of an accepted gesture.
pub trait GestureFeedback: Send {
    fn haptic_pulse(&mut self);
    fn dismiss_hint(&mut self);
}

/// Feedback sink for hosts without haptics or an onboarding overlay.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeedback;

impl GestureFeedback for NoFeedback {
    fn haptic_pulse(&mut self) {}
    fn dismiss_hint(&mut self) {}
}
