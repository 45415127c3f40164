use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result, ensure};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::events::{Catalog, CatalogMeta, PhotoId, PhotoRecord};
use crate::platform::TimestampLookup;

/// Recursively scans `root` for images and classifies each by orientation.
///
/// At most `max_photos` records are kept; `meta.total_found` still counts every
/// image seen. Unreadable files are skipped with a warning.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn scan(root: &Path, max_photos: usize) -> Result<Catalog> {
    ensure!(
        root.is_dir(),
        "photo library {} is not a directory",
        root.display()
    );

    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_image(p))
        .collect();
    paths.sort();

    let total_found = paths.len();
    let truncated = total_found > max_photos;
    paths.truncate(max_photos);

    let mut photos = Vec::with_capacity(paths.len());
    for path in &paths {
        match classify(path) {
            Ok(record) => {
                debug!(path = %path.display(), orientation = ?record.orientation, "catalogued");
                photos.push(record);
            }
            Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable photo"),
        }
    }

    let source_name = root
        .file_name()
        .and_then(OsStr::to_str)
        .map(str::to_owned)
        .unwrap_or_else(|| root.display().to_string());
    info!(
        photos = photos.len(),
        total_found, truncated, "photo library scan complete"
    );
    Ok(Catalog {
        photos,
        meta: CatalogMeta {
            total_found,
            truncated,
            source_name,
            scanned_at: Utc::now(),
        },
    })
}

/// [`scan`] on the blocking pool.
pub async fn scan_library(root: PathBuf, max_photos: usize) -> Result<Catalog> {
    tokio::task::spawn_blocking(move || scan(&root, max_photos))
        .await
        .context("catalog scan task failed")?
}

fn classify(path: &Path) -> Result<PhotoRecord> {
    let (mut width, mut height) = image::image_dimensions(path)
        .with_context(|| format!("failed to read dimensions of {}", path.display()))?;
    // Orientations 5-8 rotate by 90 degrees.
    if matches!(read_orientation(path), Some(5..=8)) {
        std::mem::swap(&mut width, &mut height);
    }
    Ok(PhotoRecord::from_dimensions(
        PhotoId::from_path(path),
        width,
        height,
    ))
}

pub(crate) fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = field.value.get_uint(0)? as u16;
    debug!("exif orientation {} for {}", orientation, path.display());
    Some(orientation)
}

#[inline]
fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if ["jpg", "jpeg", "png", "gif", "webp"].contains(&e.as_str())
    )
}

/// File timestamps for date ordering; photo ids are filesystem paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTimestamps;

impl TimestampLookup for FsTimestamps {
    fn modified_at(&self, id: &PhotoId) -> Result<SystemTime> {
        let meta = fs::metadata(id.as_str()).with_context(|| format!("failed to stat {id}"))?;
        Ok(meta.modified()?)
    }

    fn created_at(&self, id: &PhotoId) -> Result<SystemTime> {
        let meta = fs::metadata(id.as_str()).with_context(|| format!("failed to stat {id}"))?;
        meta.created()
            .with_context(|| format!("creation time unavailable for {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PhotoOrientation;
    use crate::testkit::ORIENT6_JPEG;
    use base64::Engine;

    #[test]
    fn recognises_image_extensions() {
        assert!(is_image(Path::new("a/b/photo.JPG")));
        assert!(is_image(Path::new("x.webp")));
        assert!(is_image(Path::new("loop.GIF")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("no_extension")));
    }

    #[test]
    fn exif_rotation_swaps_orientation() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();

        assert_eq!(read_orientation(&path), Some(6));
        let record = classify(&path).unwrap();
        assert_eq!(record.orientation, PhotoOrientation::Portrait);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan(&dir.path().join("missing"), 10).is_err());
    }
}
