use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::platform::SettingsStore;

/// Upper bound for `zoom-amount` (percent over 100).
pub const MAX_ZOOM_AMOUNT: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderingMode {
    Random,
    Alphabetical,
    ModifiedDate,
    CreatedDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionStyle {
    Fade,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoomStyle {
    Sawtooth,
    SineWave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatteryMode {
    ChargingOnly,
    BatteryAboveThreshold,
}

/// User-facing slideshow settings. Owned by the settings store and re-read by the
/// engine at every decision point so external edits apply on the next cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Settings {
    /// How long each photo stays on screen before the next transition.
    #[serde(with = "humantime_serde")]
    pub slide_duration: Duration,
    pub ordering: OrderingMode,
    pub transition_style: TransitionStyle,
    pub zoom_style: ZoomStyle,
    /// Zoom depth as percent over 100 (0 disables zoom).
    pub zoom_amount: u8,
    /// Hide photos whose orientation does not match the device (squares always show).
    pub filter_by_orientation: bool,
    pub battery_mode: BatteryMode,
    /// Display brightness applied by the host, 0.0-1.0.
    pub brightness: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            slide_duration: Duration::from_secs(10),
            ordering: OrderingMode::Random,
            transition_style: TransitionStyle::Fade,
            zoom_style: ZoomStyle::Sawtooth,
            zoom_amount: 2,
            filter_by_orientation: true,
            battery_mode: BatteryMode::ChargingOnly,
            brightness: 1.0,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.slide_duration > Duration::ZERO,
            "settings.slide-duration must be positive"
        );
        ensure!(
            self.zoom_amount <= MAX_ZOOM_AMOUNT,
            "settings.zoom-amount must be between 0 and {MAX_ZOOM_AMOUNT}"
        );
        ensure!(
            self.brightness.is_finite() && (0.0..=1.0).contains(&self.brightness),
            "settings.brightness must be within 0.0-1.0"
        );
        Ok(())
    }

    /// Clamps out-of-range values instead of rejecting them. Used for settings
    /// edited externally while a session is running.
    pub fn sanitized(mut self) -> Self {
        if self.slide_duration.is_zero() {
            self.slide_duration = Settings::default().slide_duration;
        }
        self.zoom_amount = self.zoom_amount.min(MAX_ZOOM_AMOUNT);
        self.brightness = if self.brightness.is_finite() {
            self.brightness.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self
    }

    /// Zoom factor over 1.0, e.g. `0.02` for a zoom amount of 2.
    pub fn zoom_factor(&self) -> f32 {
        f32::from(self.zoom_amount.min(MAX_ZOOM_AMOUNT)) / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct GestureConfig {
    /// Minimum spacing between two accepted gestures.
    pub debounce_ms: u64,
    /// Gestures starting this close to the left/right edge are ignored.
    pub edge_margin_px: f32,
    pub fling_min_distance_px: f32,
    pub fling_min_velocity_px_per_s: f32,
    /// A second tap inside this window turns a tap into a double tap.
    pub double_tap_window_ms: u64,
    /// Movement allowed before a touch stops counting as a tap.
    pub tap_slop_px: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            edge_margin_px: 50.0,
            fling_min_distance_px: 100.0,
            fling_min_velocity_px_per_s: 800.0,
            double_tap_window_ms: 300,
            tap_slop_px: 24.0,
        }
    }
}

impl GestureConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn double_tap_window(&self) -> Duration {
        Duration::from_millis(self.double_tap_window_ms)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.edge_margin_px >= 0.0,
            "gestures.edge-margin-px must be non-negative"
        );
        ensure!(
            self.fling_min_distance_px > 0.0,
            "gestures.fling-min-distance-px must be positive"
        );
        ensure!(
            self.fling_min_velocity_px_per_s > 0.0,
            "gestures.fling-min-velocity-px-per-s must be positive"
        );
        ensure!(
            self.double_tap_window_ms > 0,
            "gestures.double-tap-window-ms must be greater than zero"
        );
        Ok(())
    }
}

/// Logical screen size used by the headless surface and slide transitions.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ScreenConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Root directory to scan recursively for images.
    pub photo_library_path: PathBuf,
    /// Optional YAML file holding [`Settings`], re-read at every decision point.
    /// When absent the inline `settings` block is used.
    pub settings_path: Option<PathBuf>,
    pub settings: Settings,
    pub gestures: GestureConfig,
    pub screen: ScreenConfig,
    /// Minimum charge level for `battery-above-threshold` mode.
    pub battery_threshold_percent: u8,
    /// Optional deterministic seed for random ordering.
    pub shuffle_seed: Option<u64>,
    /// Stop scanning after this many photos (the catalog is then marked truncated).
    pub max_catalog_size: usize,
    /// Gaussian sigma for the blurred backdrop; 0 disables the backdrop.
    pub loader_backdrop_sigma: f32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            photo_library_path: PathBuf::new(),
            settings_path: None,
            settings: Settings::default(),
            gestures: GestureConfig::default(),
            screen: ScreenConfig::default(),
            battery_threshold_percent: 50,
            shuffle_seed: None,
            max_catalog_size: 10_000,
            loader_backdrop_sigma: 12.0,
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        self.settings.validate().context("invalid settings")?;
        self.gestures
            .validate()
            .context("invalid gesture configuration")?;
        ensure!(
            self.battery_threshold_percent <= 100,
            "battery-threshold-percent must be between 0 and 100"
        );
        ensure!(
            self.max_catalog_size > 0,
            "max-catalog-size must be greater than zero"
        );
        ensure!(
            self.screen.width > 0.0 && self.screen.height > 0.0,
            "screen width and height must be positive"
        );
        ensure!(
            self.loader_backdrop_sigma.is_finite() && self.loader_backdrop_sigma >= 0.0,
            "loader-backdrop-sigma must be non-negative"
        );
        Ok(self)
    }
}

/// In-memory settings store. Hosts edit settings through [`MemorySettings::update`]
/// and may watch for changes with [`MemorySettings::subscribe`].
#[derive(Debug, Clone)]
pub struct MemorySettings {
    tx: std::sync::Arc<watch::Sender<Settings>>,
}

impl MemorySettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            tx: std::sync::Arc::new(watch::Sender::new(settings)),
        }
    }

    pub fn update(&self, edit: impl FnOnce(&mut Settings)) {
        self.tx.send_modify(edit);
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }
}

impl SettingsStore for MemorySettings {
    fn load(&self) -> Settings {
        self.tx.borrow().clone().sanitized()
    }

    fn save(&self, settings: &Settings) {
        self.tx.send_replace(settings.clone());
    }
}

/// Settings persisted as a standalone YAML file.
///
/// Every `load` re-reads the file; a missing or malformed file falls back to the
/// last settings that parsed successfully.
#[derive(Debug)]
pub struct YamlSettingsStore {
    path: PathBuf,
    last_good: Mutex<Settings>,
}

impl YamlSettingsStore {
    pub fn new(path: impl Into<PathBuf>, fallback: Settings) -> Self {
        Self {
            path: path.into(),
            last_good: Mutex::new(fallback),
        }
    }

    fn read(&self) -> Result<Settings> {
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let settings: Settings = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(settings.sanitized())
    }

    fn write(&self, settings: &Settings) -> Result<()> {
        let yaml = serde_yaml::to_string(settings)?;
        std::fs::write(&self.path, yaml)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

impl SettingsStore for YamlSettingsStore {
    fn load(&self) -> Settings {
        let mut last_good = self
            .last_good
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match self.read() {
            Ok(settings) => {
                *last_good = settings.clone();
                settings
            }
            Err(err) => {
                debug!(error = ?err, "settings file unavailable; using last known settings");
                last_good.clone()
            }
        }
    }

    fn save(&self, settings: &Settings) {
        if let Err(err) = self.write(settings) {
            warn!(error = ?err, "failed to persist settings");
        }
        let mut last_good = self
            .last_good
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last_good = settings.clone();
    }
}
