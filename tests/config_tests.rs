use rust_photo_screensaver::config::{
    BatteryMode, Configuration, OrderingMode, Settings, TransitionStyle, ZoomStyle,
};
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
photo-library-path: "/photos"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.photo_library_path, PathBuf::from("/photos"));
    assert_eq!(cfg.settings, Settings::default());
    assert_eq!(cfg.battery_threshold_percent, 50);
    assert!(cfg.settings_path.is_none());
    assert!(cfg.validated().is_ok());
}

#[test]
fn parse_inline_settings() {
    let yaml = r#"
photo-library-path: "/photos"
shuffle-seed: 7
settings:
  slide-duration: 1m 30s
  ordering: modified-date
  transition-style: slide-up
  zoom-style: sine-wave
  zoom-amount: 5
  filter-by-orientation: false
  battery-mode: battery-above-threshold
  brightness: 0.4
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let settings = &cfg.settings;
    assert_eq!(cfg.shuffle_seed, Some(7));
    assert_eq!(settings.slide_duration, Duration::from_secs(90));
    assert_eq!(settings.ordering, OrderingMode::ModifiedDate);
    assert_eq!(settings.transition_style, TransitionStyle::SlideUp);
    assert_eq!(settings.zoom_style, ZoomStyle::SineWave);
    assert_eq!(settings.zoom_amount, 5);
    assert!(!settings.filter_by_orientation);
    assert_eq!(settings.battery_mode, BatteryMode::BatteryAboveThreshold);
    assert!((settings.brightness - 0.4).abs() < f32::EPSILON);
    assert!(cfg.validated().is_ok());
}

#[test]
fn parse_gesture_and_screen_overrides() {
    let yaml = r#"
photo-library-path: "/photos"
screen:
  width: 800
  height: 1280
gestures:
  debounce-ms: 150
  double-tap-window-ms: 250
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.screen.width, 800.0);
    assert_eq!(cfg.screen.height, 1280.0);
    assert_eq!(cfg.gestures.debounce(), Duration::from_millis(150));
    assert_eq!(cfg.gestures.double_tap_window(), Duration::from_millis(250));
    assert_eq!(cfg.gestures.edge_margin_px, 50.0);
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = r#"
photo-library-path: "/photos"
settings:
  slide-speed: 3
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn validation_rejects_out_of_range_values() {
    let too_much_zoom = r#"
photo-library-path: "/photos"
settings:
  zoom-amount: 9
"#;
    let cfg: Configuration = serde_yaml::from_str(too_much_zoom).unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(format!("{err:#}").contains("zoom-amount"));

    let zero_slide = r#"
photo-library-path: "/photos"
settings:
  slide-duration: 0s
"#;
    let cfg: Configuration = serde_yaml::from_str(zero_slide).unwrap();
    assert!(cfg.validated().is_err());

    let bad_threshold = r#"
photo-library-path: "/photos"
battery-threshold-percent: 120
"#;
    let cfg: Configuration = serde_yaml::from_str(bad_threshold).unwrap();
    assert!(cfg.validated().is_err());

    let empty_catalog = r#"
photo-library-path: "/photos"
max-catalog-size: 0
"#;
    let cfg: Configuration = serde_yaml::from_str(empty_catalog).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn settings_round_trip_through_yaml() {
    let settings = Settings {
        slide_duration: Duration::from_secs(45),
        ordering: OrderingMode::CreatedDate,
        brightness: 0.5,
        ..Settings::default()
    };
    let yaml = serde_yaml::to_string(&settings).unwrap();
    assert!(yaml.contains("slide-duration"));
    let parsed: Settings = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed, settings);
}

#[test]
fn from_yaml_file_reads_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "photo-library-path: /srv/photos\nmax-catalog-size: 25\n").unwrap();
    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.photo_library_path, PathBuf::from("/srv/photos"));
    assert_eq!(cfg.max_catalog_size, 25);

    assert!(Configuration::from_yaml_file(dir.path().join("missing.yaml")).is_err());
}
