use image::codecs::jpeg::JpegEncoder;
use rayon::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use walkdir::WalkDir;

use super::locate::locate_subject;
use super::reframe::reframe;
use crate::resample::{resize_rgb, ResampleError};
use crate::utils::{has_valid_extension, verbose_println};

/// Output files carry this prefix; prefixed files are skipped on discovery
/// so a rerun doesn't thumbnail its own output.
pub const THUMB_PREFIX: &str = "thumb_";

/// Extensions accepted as thumbnail sources.
pub const THUMB_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

pub const DEFAULT_THUMB_SIZE: u32 = 300;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Resample(#[from] ResampleError),

    #[error("failed to write thumbnail {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode thumbnail {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to read directory entry: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Configuration for thumbnail production.
#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    /// Edge length of the final square thumbnail.
    pub target_size: u32,
    /// Fixed JPEG quality for every output file.
    pub jpeg_quality: u8,
    /// Worker count; 0 selects the CPU count.
    pub jobs: usize,
    /// Lowercase extensions accepted as sources.
    pub extensions: Vec<String>,
    pub verbose: bool,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_THUMB_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            jobs: 0,
            extensions: THUMB_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            verbose: false,
        }
    }
}

#[derive(Debug)]
pub struct ThumbnailResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// False when the locator found no edges and the center-crop fallback
    /// was used.
    pub subject_found: bool,
}

/// Content-aware thumbnail pipeline: locate subject, reframe to a padded
/// square, resample, encode. One invocation per source file, no shared
/// mutable state, parallelized across files on a bounded pool.
pub struct ThumbnailEngine {
    config: ThumbnailConfig,
    pool: rayon::ThreadPool,
}

impl ThumbnailEngine {
    pub fn new(config: ThumbnailConfig) -> Result<Self, ThumbnailError> {
        let jobs = if config.jobs == 0 {
            num_cpus::get()
        } else {
            config.jobs
        };
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Enumerate source files under the given directories (single files are
    /// accepted as-is), skipping previous outputs, sorted for deterministic
    /// processing.
    pub fn discover_sources(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>, ThumbnailError> {
        let mut sources = Vec::new();

        for input in inputs {
            if input.is_file() {
                if self.is_source(input) {
                    sources.push(input.clone());
                }
                continue;
            }

            for entry in WalkDir::new(input).follow_links(false) {
                let entry = entry?;
                let path = entry.path();
                if path.is_file() && self.is_source(path) {
                    sources.push(path.to_path_buf());
                }
            }
        }

        sources.sort();
        Ok(sources)
    }

    fn is_source(&self, path: &Path) -> bool {
        if !has_valid_extension(path, &self.config.extensions) {
            return false;
        }
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| !n.starts_with(THUMB_PREFIX))
            .unwrap_or(false)
    }

    /// Produce one thumbnail next to its source file.
    pub fn process_single(&self, input_path: &Path) -> Result<ThumbnailResult, ThumbnailError> {
        let img = image::open(input_path).map_err(|source| ThumbnailError::Decode {
            path: input_path.display().to_string(),
            source,
        })?;
        let rgb = img.to_rgb8();

        let bounds = locate_subject(&rgb);
        let subject_found = bounds.is_some();
        let squared = reframe(&rgb, bounds.as_ref());
        let thumbnail = resize_rgb(&squared, self.config.target_size, self.config.target_size)?;

        let output_path = thumb_output_path(input_path);
        let file = File::create(&output_path).map_err(|source| ThumbnailError::Write {
            path: output_path.display().to_string(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        let encoder = JpegEncoder::new_with_quality(&mut writer, self.config.jpeg_quality);
        thumbnail
            .write_with_encoder(encoder)
            .map_err(|source| ThumbnailError::Encode {
                path: output_path.display().to_string(),
                source,
            })?;

        verbose_println(
            self.config.verbose,
            &format!(
                "{} -> {}{}",
                input_path.display(),
                output_path.display(),
                if subject_found { "" } else { " (center fallback)" }
            ),
        );

        Ok(ThumbnailResult {
            input_path: input_path.to_path_buf(),
            output_path,
            subject_found,
        })
    }

    /// Process a batch of source files in parallel. Per-file failures are
    /// returned in place, never aborting the remaining files. `progress` is
    /// invoked with the number of files completed so far.
    pub fn process_batch<F>(
        &self,
        sources: &[PathBuf],
        progress: F,
    ) -> Vec<Result<ThumbnailResult, ThumbnailError>>
    where
        F: Fn(usize) + Send + Sync,
    {
        let completed = AtomicUsize::new(0);

        self.pool.install(|| {
            sources
                .par_iter()
                .map(|path| {
                    let result = self.process_single(path);
                    progress(completed.fetch_add(1, Ordering::Relaxed) + 1);
                    result
                })
                .collect()
        })
    }
}

/// `thumb_<stem>.jpg` next to the source; the output is always JPEG.
fn thumb_output_path(input_path: &Path) -> PathBuf {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{}{}.jpg", THUMB_PREFIX, stem))
}
