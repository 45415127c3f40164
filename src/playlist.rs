use std::sync::Arc;
use std::time::SystemTime;

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::{debug, info};

use crate::config::{OrderingMode, Settings};
use crate::error::EngineError;
use crate::events::{DeviceOrientation, PhotoRecord};
use crate::platform::TimestampLookup;

/// The navigable photo sequence.
///
/// `filtered` is a view of `all` for one device orientation and one set of
/// settings; it is replaced wholesale on reload and never edited in place. The
/// cursor only moves through [`PlaylistState::next`] and [`PlaylistState::previous`].
#[derive(Debug, Clone, Default)]
pub struct PlaylistState {
    all: Vec<PhotoRecord>,
    filtered: Vec<PhotoRecord>,
    cursor: usize,
}

impl PlaylistState {
    pub fn all(&self) -> &[PhotoRecord] {
        &self.all
    }

    pub fn filtered(&self) -> &[PhotoRecord] {
        &self.filtered
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    pub fn current(&self) -> Option<&PhotoRecord> {
        self.filtered.get(self.cursor)
    }

    pub fn next(&mut self) -> Result<&PhotoRecord, EngineError> {
        let len = self.filtered.len();
        if len == 0 {
            return Err(EngineError::EmptyPlaylist);
        }
        self.cursor = (self.cursor + 1) % len;
        Ok(&self.filtered[self.cursor])
    }

    pub fn previous(&mut self) -> Result<&PhotoRecord, EngineError> {
        let len = self.filtered.len();
        if len == 0 {
            return Err(EngineError::EmptyPlaylist);
        }
        self.cursor = (self.cursor + len - 1) % len;
        Ok(&self.filtered[self.cursor])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrientationOutcome {
    Ready,
    /// Nothing matches the new orientation; playback has to stop.
    BecameEmpty,
}

/// Builds and orders playlists from the catalog.
pub struct PlaylistEngine {
    rng: StdRng,
    timestamps: Arc<dyn TimestampLookup>,
}

impl PlaylistEngine {
    /// `seed` pins the random ordering; without it every reload reshuffles freely.
    pub fn new(timestamps: Arc<dyn TimestampLookup>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng, timestamps }
    }

    /// Filters `catalog` for `orientation`. Never fails: an empty `filtered` is
    /// the caller's "nothing to show".
    pub fn load(
        &self,
        catalog: Vec<PhotoRecord>,
        settings: &Settings,
        orientation: DeviceOrientation,
    ) -> PlaylistState {
        let filtered = filter_for(&catalog, settings, orientation);
        debug!(
            catalog = catalog.len(),
            filtered = filtered.len(),
            ?orientation,
            filter_by_orientation = settings.filter_by_orientation,
            "playlist loaded"
        );
        PlaylistState {
            all: catalog,
            filtered,
            cursor: 0,
        }
    }

    /// Orders `filtered` and rewinds the cursor.
    pub fn sort(&mut self, state: &mut PlaylistState, ordering: OrderingMode) {
        match ordering {
            OrderingMode::Random => state.filtered.shuffle(&mut self.rng),
            OrderingMode::Alphabetical => state.filtered.sort_by(|a, b| a.id.cmp(&b.id)),
            OrderingMode::ModifiedDate | OrderingMode::CreatedDate => {
                let timestamps = Arc::clone(&self.timestamps);
                state
                    .filtered
                    .sort_by_cached_key(|photo| timestamp_or_epoch(&*timestamps, photo, ordering));
            }
        }
        state.cursor = 0;
    }

    /// `load` followed by `sort` with the ordering from `settings`.
    pub fn build(
        &mut self,
        catalog: Vec<PhotoRecord>,
        settings: &Settings,
        orientation: DeviceOrientation,
    ) -> PlaylistState {
        let mut state = self.load(catalog, settings, orientation);
        self.sort(&mut state, settings.ordering);
        info!(
            photos = state.len(),
            ordering = ?settings.ordering,
            ?orientation,
            "playlist built"
        );
        state
    }

    pub fn on_orientation_changed(
        &mut self,
        state: &mut PlaylistState,
        settings: &Settings,
        orientation: DeviceOrientation,
    ) -> OrientationOutcome {
        let catalog = std::mem::take(&mut state.all);
        *state = self.build(catalog, settings, orientation);
        if state.is_empty() {
            info!(?orientation, "playlist empty after orientation change");
            OrientationOutcome::BecameEmpty
        } else {
            OrientationOutcome::Ready
        }
    }
}

fn filter_for(
    catalog: &[PhotoRecord],
    settings: &Settings,
    orientation: DeviceOrientation,
) -> Vec<PhotoRecord> {
    if !settings.filter_by_orientation {
        return catalog.to_vec();
    }
    catalog
        .iter()
        .filter(|photo| photo.orientation.fits(orientation))
        .cloned()
        .collect()
}

fn timestamp_or_epoch(
    timestamps: &dyn TimestampLookup,
    photo: &PhotoRecord,
    ordering: OrderingMode,
) -> SystemTime {
    let looked_up = match ordering {
        OrderingMode::CreatedDate => timestamps.created_at(&photo.id),
        _ => timestamps.modified_at(&photo.id),
    };
    looked_up.unwrap_or_else(|err| {
        debug!(id = %photo.id, error = %err, "timestamp lookup failed; sorting first");
        SystemTime::UNIX_EPOCH
    })
}
