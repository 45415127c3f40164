//! Deterministic collaborators for driving the engine in tests and demos.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use anyhow::{Result, anyhow};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::DecodeError;
use crate::events::{PhotoId, PhotoOrientation, PhotoRecord};
use crate::platform::{DecodedImage, GestureFeedback, ImageDecoder, RgbaFrame, TimestampLookup};

/// JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded.
pub const ORIENT6_JPEG: &str = concat!(
    "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
    "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
);

/// Record with a plausible aspect ratio for `orientation`.
pub fn photo(id: &str, orientation: PhotoOrientation) -> PhotoRecord {
    let aspect = match orientation {
        PhotoOrientation::Landscape => 1.5,
        PhotoOrientation::Portrait => 2.0 / 3.0,
        PhotoOrientation::Square => 1.0,
    };
    PhotoRecord::new(id, orientation, aspect)
}

/// Timestamp table; ids without an entry fail the lookup.
#[derive(Debug, Clone, Default)]
pub struct FixedTimestamps {
    modified: HashMap<PhotoId, SystemTime>,
    created: HashMap<PhotoId, SystemTime>,
}

impl FixedTimestamps {
    pub fn with_modified(mut self, id: &str, at: SystemTime) -> Self {
        self.modified.insert(PhotoId::new(id), at);
        self
    }

    pub fn with_created(mut self, id: &str, at: SystemTime) -> Self {
        self.created.insert(PhotoId::new(id), at);
        self
    }
}

impl TimestampLookup for FixedTimestamps {
    fn modified_at(&self, id: &PhotoId) -> Result<SystemTime> {
        self.modified
            .get(id)
            .copied()
            .ok_or_else(|| anyhow!("no modified time for {id}"))
    }

    fn created_at(&self, id: &PhotoId) -> Result<SystemTime> {
        self.created
            .get(id)
            .copied()
            .ok_or_else(|| anyhow!("no created time for {id}"))
    }
}

/// Decoder producing a 1x1 frame per photo, optionally after a delay on the
/// tokio clock and optionally failing for chosen ids.
#[derive(Debug, Clone, Default)]
pub struct StaticDecoder {
    failing: HashSet<PhotoId>,
    delay: Option<Duration>,
}

impl StaticDecoder {
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(PhotoId::new(id));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl ImageDecoder for StaticDecoder {
    fn decode(&self, photo: &PhotoRecord) -> BoxFuture<'static, Result<DecodedImage, DecodeError>> {
        let id = photo.id.clone();
        let fail = self.failing.contains(&id);
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if fail {
                return Err(DecodeError::new(id, "corrupt test image"));
            }
            Ok(DecodedImage {
                id,
                frame: RgbaFrame {
                    width: 1,
                    height: 1,
                    pixels: Arc::from(vec![255, 255, 255, 255]),
                },
                backdrop: None,
                placeholder: false,
            })
        }
        .boxed()
    }
}

/// Counts feedback calls; clones share the counters.
#[derive(Debug, Clone, Default)]
pub struct RecordingFeedback {
    pulses: Arc<AtomicUsize>,
    hints: Arc<AtomicUsize>,
}

impl RecordingFeedback {
    pub fn pulses(&self) -> usize {
        self.pulses.load(Ordering::SeqCst)
    }

    pub fn hints_dismissed(&self) -> usize {
        self.hints.load(Ordering::SeqCst)
    }
}

impl GestureFeedback for RecordingFeedback {
    fn haptic_pulse(&mut self) {
        self.pulses.fetch_add(1, Ordering::SeqCst);
    }

    fn dismiss_hint(&mut self) {
        self.hints.fetch_add(1, Ordering::SeqCst);
    }
}
