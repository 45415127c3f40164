use thiserror::Error;

use crate::events::PhotoId;

/// Conditions that end (or refuse to start) a slideshow session.
///
/// These are the only failures surfaced to the host; everything else is
/// absorbed inside the engine and degrades gracefully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No photo matches the current orientation/settings filters.
    #[error("no photos available")]
    EmptyPlaylist,

    /// The battery predicate denied starting or continuing playback.
    #[error("slideshow stopped: {0}")]
    GateFailed(GateReason),
}

impl EngineError {
    /// Short explanation suitable for showing to the user before the session ends.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::EmptyPlaylist => "no photos available".to_string(),
            EngineError::GateFailed(reason) => reason.to_string(),
        }
    }
}

/// Reason code attached to [`EngineError::GateFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateReason {
    #[error("device is not charging")]
    NotCharging,

    #[error("battery at {level}% is below the {threshold}% threshold")]
    BatteryBelowThreshold { level: u8, threshold: u8 },
}

/// Per-image decode failure reported by an [`ImageDecoder`](crate::platform::ImageDecoder).
#[derive(Debug, Clone, Error)]
#[error("failed to decode {id}: {message}")]
pub struct DecodeError {
    pub id: PhotoId,
    pub message: String,
}

impl DecodeError {
    pub fn new(id: PhotoId, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
        }
    }
}
