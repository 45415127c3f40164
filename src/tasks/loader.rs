use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use tracing::debug;

use crate::error::DecodeError;
use crate::events::PhotoRecord;
use crate::platform::{DecodedImage, ImageDecoder, RgbaFrame};
use crate::tasks::catalog::read_orientation;

/// Long edge of the backdrop before blurring.
const BACKDROP_EDGE: u32 = 96;
/// Brightness multiplier applied to the backdrop.
const BACKDROP_DIM: f32 = 0.6;

/// Decodes photos from disk on the blocking pool. Photo ids are file paths.
#[derive(Debug, Clone, Copy)]
pub struct ImageLoader {
    backdrop_sigma: f32,
}

impl ImageLoader {
    /// `backdrop_sigma` of zero skips the blurred backdrop.
    pub fn new(backdrop_sigma: f32) -> Self {
        Self { backdrop_sigma }
    }
}

impl ImageDecoder for ImageLoader {
    fn decode(&self, photo: &PhotoRecord) -> BoxFuture<'static, Result<DecodedImage, DecodeError>> {
        let id = photo.id.clone();
        let sigma = self.backdrop_sigma;
        async move {
            let path = PathBuf::from(id.as_str());
            let joined = tokio::task::spawn_blocking(move || prepare(&path, sigma)).await;
            match joined {
                Ok(Ok((frame, backdrop))) => {
                    debug!(%id, width = frame.width, height = frame.height, "decoded");
                    Ok(DecodedImage {
                        id,
                        frame,
                        backdrop,
                        placeholder: false,
                    })
                }
                Ok(Err(err)) => Err(DecodeError::new(id, format!("{err:#}"))),
                Err(err) => Err(DecodeError::new(id, format!("decode task failed: {err}"))),
            }
        }
        .boxed()
    }
}

fn prepare(path: &Path, sigma: f32) -> Result<(RgbaFrame, Option<RgbaFrame>)> {
    let img = decode_rgba8_apply_exif(path)?;
    let backdrop = backdrop(&img, sigma).map(to_frame);
    Ok((to_frame(img), backdrop))
}

// Decodes an image to RGBA8 and applies EXIF orientation if available. Missing
// metadata leaves the image as stored.
fn decode_rgba8_apply_exif(path: &Path) -> Result<RgbaImage> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgba8();

    let img = match read_orientation(path).unwrap_or(1) {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        4 => imageops::flip_vertical(&img),
        // transpose
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        // transverse
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    };
    Ok(img)
}

/// Downscaled, blurred and dimmed copy used to fill letterbox bars.
fn backdrop(img: &RgbaImage, sigma: f32) -> Option<RgbaImage> {
    if sigma <= 0.0 {
        return None;
    }
    let (width, height) = img.dimensions();
    let long_edge = width.max(height).max(1);
    let scale = (BACKDROP_EDGE as f32 / long_edge as f32).min(1.0);
    let small_w = ((width as f32 * scale).round() as u32).max(1);
    let small_h = ((height as f32 * scale).round() as u32).max(1);

    let small = imageops::resize(img, small_w, small_h, FilterType::Triangle);
    let mut blurred = imageops::blur(&small, (sigma * scale).max(0.5));
    for pixel in blurred.pixels_mut() {
        for channel in &mut pixel.0[..3] {
            *channel = (f32::from(*channel) * BACKDROP_DIM) as u8;
        }
    }
    Some(blurred)
}

fn to_frame(img: RgbaImage) -> RgbaFrame {
    let (width, height) = img.dimensions();
    RgbaFrame {
        width,
        height,
        pixels: Arc::from(img.into_raw()),
    }
}
