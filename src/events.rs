use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::error::EngineError;

/// Opaque reference to an image known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhotoId(Arc<str>);

impl PhotoId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(Arc::from(raw.as_ref()))
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(path.to_string_lossy())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PhotoId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotoOrientation {
    Landscape,
    Portrait,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceOrientation {
    Landscape,
    Portrait,
}

impl PhotoOrientation {
    /// Whether a photo with this orientation may be shown on a device held in `device`.
    pub fn fits(self, device: DeviceOrientation) -> bool {
        match (self, device) {
            (PhotoOrientation::Square, _) => true,
            (PhotoOrientation::Landscape, DeviceOrientation::Landscape) => true,
            (PhotoOrientation::Portrait, DeviceOrientation::Portrait) => true,
            _ => false,
        }
    }
}

/// Aspect ratios within this distance of 1.0 count as square.
const SQUARE_TOLERANCE: f32 = 0.01;

/// One catalog entry. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRecord {
    pub id: PhotoId,
    pub orientation: PhotoOrientation,
    pub aspect_ratio: f32,
}

impl PhotoRecord {
    pub fn new(id: impl Into<PhotoId>, orientation: PhotoOrientation, aspect_ratio: f32) -> Self {
        Self {
            id: id.into(),
            orientation,
            aspect_ratio,
        }
    }

    /// Classifies a photo from its (orientation-corrected) pixel dimensions.
    pub fn from_dimensions(id: PhotoId, width: u32, height: u32) -> Self {
        let aspect_ratio = width.max(1) as f32 / height.max(1) as f32;
        let orientation = if (aspect_ratio - 1.0).abs() <= SQUARE_TOLERANCE {
            PhotoOrientation::Square
        } else if aspect_ratio > 1.0 {
            PhotoOrientation::Landscape
        } else {
            PhotoOrientation::Portrait
        };
        Self {
            id,
            orientation,
            aspect_ratio,
        }
    }
}

/// Final result of a catalog scan.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub photos: Vec<PhotoRecord>,
    pub meta: CatalogMeta,
}

#[derive(Debug, Clone)]
pub struct CatalogMeta {
    pub total_found: usize,
    pub truncated: bool,
    pub source_name: String,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryStatus {
    /// Charge level in percent (0-100).
    pub level: u8,
    pub charging: bool,
}

impl Default for BatteryStatus {
    fn default() -> Self {
        Self {
            level: 100,
            charging: true,
        }
    }
}

/// Direction requested by a swipe; also used as the transition direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Semantic command produced by the gesture router.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureCommand {
    PauseToggle,
    Exit,
    Next(SwipeDirection),
    Previous(SwipeDirection),
    BrightnessDelta(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
}

/// Raw pointer sample delivered by the host.
#[derive(Debug, Clone, Copy)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub x: f32,
    pub y: f32,
    pub at: Instant,
    /// Release velocity in px/s, only meaningful on [`PointerPhase::Up`].
    pub velocity_x: f32,
    pub velocity_y: f32,
}

impl PointerEvent {
    pub fn down(x: f32, y: f32, at: Instant) -> Self {
        Self {
            phase: PointerPhase::Down,
            x,
            y,
            at,
            velocity_x: 0.0,
            velocity_y: 0.0,
        }
    }

    pub fn moved(x: f32, y: f32, at: Instant) -> Self {
        Self {
            phase: PointerPhase::Move,
            ..Self::down(x, y, at)
        }
    }

    pub fn up(x: f32, y: f32, at: Instant, velocity_x: f32, velocity_y: f32) -> Self {
        Self {
            phase: PointerPhase::Up,
            x,
            y,
            at,
            velocity_x,
            velocity_y,
        }
    }
}

/// Host lifecycle calls and gesture commands, forwarded into the slideshow task.
#[derive(Debug, Clone)]
pub enum HostCommand {
    StartSession {
        catalog: Vec<PhotoRecord>,
        orientation: DeviceOrientation,
        battery: BatteryStatus,
    },
    EndSession,
    OrientationChanged(DeviceOrientation),
    BatteryChanged(BatteryStatus),
    /// e.g. the screen was turned back on.
    ExternalExitRequested,
    Gesture(GestureCommand),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    Failed(EngineError),
    EndRequested,
    ExternalExit,
    UserExit,
    Shutdown,
}

impl StopReason {
    pub fn error(&self) -> Option<&EngineError> {
        match self {
            StopReason::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Notifications emitted by the slideshow task for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SessionStarted { photos: usize },
    PhotoShown { id: PhotoId, index: usize },
    Paused,
    Resumed,
    BrightnessChanged(f32),
    Stopped(StopReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_dimensions() {
        let wide = PhotoRecord::from_dimensions(PhotoId::new("w"), 1920, 1080);
        let tall = PhotoRecord::from_dimensions(PhotoId::new("t"), 1080, 1920);
        let square = PhotoRecord::from_dimensions(PhotoId::new("s"), 1000, 1005);
        assert_eq!(wide.orientation, PhotoOrientation::Landscape);
        assert_eq!(tall.orientation, PhotoOrientation::Portrait);
        assert_eq!(square.orientation, PhotoOrientation::Square);
    }

    #[test]
    fn square_fits_every_device_orientation() {
        assert!(PhotoOrientation::Square.fits(DeviceOrientation::Portrait));
        assert!(PhotoOrientation::Square.fits(DeviceOrientation::Landscape));
        assert!(!PhotoOrientation::Portrait.fits(DeviceOrientation::Landscape));
    }
}
