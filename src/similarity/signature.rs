use image::{DynamicImage, GrayImage};
use std::path::Path;
use thiserror::Error;

use crate::resample::{resize_rgb, ResampleError};

/// Images with either edge at or below this are hashed in the "small" bucket.
pub const SMALL_EDGE: u32 = 300;

/// Normalization targets per size bucket. Small images get the smaller target
/// so upscaling artifacts in thumbnails don't dominate the hash.
const NORMALIZED_SMALL: u32 = 32;
const NORMALIZED_LARGE: u32 = 64;

/// Side length of the hash grid; every hash carries `HASH_GRID²` = 64 bits.
const HASH_GRID: u32 = 8;

/// Errors produced while extracting a signature from a source image.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Resample(#[from] ResampleError),
}

/// Multi-algorithm perceptual signature of one image.
///
/// The three hashes are computed over the same normalized grayscale rendition,
/// so any two signatures are comparable bit-for-bit. `is_small` records the
/// normalization bucket and drives the comparison weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSignature {
    /// Mean-luminance threshold hash.
    pub avg: u64,
    /// Horizontal gradient sign hash (edge-sensitive).
    pub diff: u64,
    /// Haar approximation-band hash (detail-sensitive).
    pub wavelet: u64,
    /// True when either source edge is <= [`SMALL_EDGE`] pixels.
    pub is_small: bool,
}

impl ImageSignature {
    /// Compute the signature for an already-decoded image.
    pub fn from_image(img: &DynamicImage) -> Result<Self, SignatureError> {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let is_small = width <= SMALL_EDGE || height <= SMALL_EDGE;
        let target = if is_small {
            NORMALIZED_SMALL
        } else {
            NORMALIZED_LARGE
        };

        let normalized = resize_rgb(&rgb, target, target)?;
        let gray = image::imageops::grayscale(&normalized);

        Ok(Self {
            avg: average_hash(&gray),
            diff: difference_hash(&gray),
            wavelet: wavelet_hash(&gray),
            is_small,
        })
    }

    /// Decode an image file and compute its signature.
    pub fn from_file(path: &Path) -> Result<Self, SignatureError> {
        let img = image::open(path).map_err(|source| SignatureError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_image(&img)
    }
}

/// Area-average reduction of the normalized grayscale image to a small grid.
///
/// Box filtering keeps flat regions exactly flat, which matters because the
/// hash thresholds below use a strict `>`; ringing from a windowed-sinc
/// reduction at this scale would flip bits on uniform inputs.
fn reduce_mean(gray: &GrayImage, grid_w: u32, grid_h: u32) -> Vec<f64> {
    let (width, height) = gray.dimensions();
    let cell_w = width as f64 / grid_w as f64;
    let cell_h = height as f64 / grid_h as f64;

    let mut cells = Vec::with_capacity((grid_w * grid_h) as usize);
    for gy in 0..grid_h {
        for gx in 0..grid_w {
            let x0 = gx as f64 * cell_w;
            let x1 = x0 + cell_w;
            let y0 = gy as f64 * cell_h;
            let y1 = y0 + cell_h;

            let mut sum = 0.0;
            let mut area = 0.0;
            for py in y0.floor() as u32..(y1.ceil() as u32).min(height) {
                let wy = (y1.min(py as f64 + 1.0) - y0.max(py as f64)).max(0.0);
                for px in x0.floor() as u32..(x1.ceil() as u32).min(width) {
                    let wx = (x1.min(px as f64 + 1.0) - x0.max(px as f64)).max(0.0);
                    let weight = wx * wy;
                    sum += gray.get_pixel(px, py)[0] as f64 * weight;
                    area += weight;
                }
            }
            cells.push(sum / area);
        }
    }
    cells
}

/// Mean-luminance hash: reduce to the 8x8 grid, set a bit for every cell
/// brighter than the grid mean. Bits are packed row-major, MSB first.
fn average_hash(gray: &GrayImage) -> u64 {
    let cells = reduce_mean(gray, HASH_GRID, HASH_GRID);
    let mean = cells.iter().sum::<f64>() / cells.len() as f64;

    let mut hash = 0u64;
    for cell in &cells {
        hash = (hash << 1) | (*cell > mean) as u64;
    }
    hash
}

/// Gradient sign hash: reduce to a 9x8 grid, set a bit wherever the right
/// neighbor is brighter than the left. Tracks edge structure rather than
/// absolute luminance, which survives thumbnail rescaling.
fn difference_hash(gray: &GrayImage) -> u64 {
    let cells = reduce_mean(gray, HASH_GRID + 1, HASH_GRID);
    let row_len = (HASH_GRID + 1) as usize;

    let mut hash = 0u64;
    for y in 0..HASH_GRID as usize {
        for x in 0..HASH_GRID as usize {
            let left = cells[y * row_len + x];
            let right = cells[y * row_len + x + 1];
            hash = (hash << 1) | (right > left) as u64;
        }
    }
    hash
}

/// Wavelet hash: iterated 2x2 Haar approximation down to the 8x8 band,
/// thresholded at the band median. The normalized input is always a
/// power-of-two square (32 or 64), so the decomposition is exact.
fn wavelet_hash(gray: &GrayImage) -> u64 {
    let mut size = gray.width() as usize;
    let mut band: Vec<f64> = gray.pixels().map(|p| p[0] as f64).collect();

    while size > HASH_GRID as usize {
        let half = size / 2;
        let mut next = vec![0.0f64; half * half];
        for y in 0..half {
            for x in 0..half {
                let a = band[(2 * y) * size + 2 * x];
                let b = band[(2 * y) * size + 2 * x + 1];
                let c = band[(2 * y + 1) * size + 2 * x];
                let d = band[(2 * y + 1) * size + 2 * x + 1];
                next[y * half + x] = (a + b + c + d) / 4.0;
            }
        }
        band = next;
        size = half;
    }

    let mut sorted = band.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2]) / 2.0;

    let mut hash = 0u64;
    for coeff in &band {
        hash = (hash << 1) | (*coeff > median) as u64;
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};

    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn uniform_image(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([value; 3])))
    }

    #[test]
    fn test_signature_is_deterministic() {
        let img = gradient_image(640, 480);
        let a = ImageSignature::from_image(&img).unwrap();
        let b = ImageSignature::from_image(&img).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_small_bucket_classification() {
        assert!(ImageSignature::from_image(&gradient_image(100, 100))
            .unwrap()
            .is_small);
        assert!(ImageSignature::from_image(&gradient_image(300, 800))
            .unwrap()
            .is_small);
        assert!(!ImageSignature::from_image(&gradient_image(301, 301))
            .unwrap()
            .is_small);
    }

    #[test]
    fn test_uniform_image_hashes_to_zero() {
        // No cell beats the mean, no gradient, no coefficient above the
        // median: all three hashes must come out empty.
        let sig = ImageSignature::from_image(&uniform_image(32, 32, 128)).unwrap();
        assert_eq!(sig.avg, 0);
        assert_eq!(sig.diff, 0);
        assert_eq!(sig.wavelet, 0);
    }

    #[test]
    fn test_distinct_images_differ() {
        let a = ImageSignature::from_image(&gradient_image(640, 480)).unwrap();
        let b = ImageSignature::from_image(&uniform_image(640, 480, 10)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_half_split_average_hash() {
        // Left half black, right half white: exactly the bright half of the
        // grid ends up above the mean.
        let img: RgbImage = ImageBuffer::from_fn(400, 400, |x, _| {
            if x < 200 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let sig = ImageSignature::from_image(&DynamicImage::ImageRgb8(img)).unwrap();
        assert_eq!(sig.avg.count_ones(), 32);
    }

    #[test]
    fn test_reduce_mean_exact_blocks() {
        // 16x16 image with a bright 8x8 top-left quadrant reduced to 2x2.
        let img: GrayImage = ImageBuffer::from_fn(16, 16, |x, y| {
            image::Luma([if x < 8 && y < 8 { 200 } else { 0 }])
        });
        let cells = reduce_mean(&img, 2, 2);
        assert_eq!(cells, vec![200.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_from_file_reports_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image at all").unwrap();

        match ImageSignature::from_file(&path) {
            Err(SignatureError::Decode { .. }) => {}
            other => panic!("expected decode error, got {:?}", other),
        }
    }
}
