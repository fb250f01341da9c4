use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

use super::distance::{similarity_percent, weighted_distance};
use super::signature::ImageSignature;
use crate::utils::{has_valid_extension, verbose_println};

/// Extensions considered image candidates during a search.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Default scan-time retention threshold on the weighted distance.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 12.0;

/// Default display floor on the similarity percentage.
pub const DEFAULT_SIMILARITY_FLOOR: f64 = 25.0;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search root does not exist or is not a directory: {0}")]
    InvalidRoot(PathBuf),

    #[error("failed to read directory entry: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("search was cancelled")]
    Cancelled,
}

/// Configuration for a directory similarity search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Candidates with a weighted distance at or above this are dropped.
    pub distance_threshold: f64,
    /// Worker count for parallel hashing; 0 selects the CPU count.
    pub jobs: usize,
    /// Lowercase extensions accepted as candidates.
    pub extensions: Vec<String>,
    pub verbose: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            jobs: 0,
            extensions: IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            verbose: false,
        }
    }
}

/// Shared flag used to abandon a running search.
///
/// Cancelling stops new files from being dispatched to the pool; a hash
/// already in flight is allowed to finish and its result is discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// One retained candidate, scored against the reference signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub path: PathBuf,
    pub distance: f64,
    pub is_small: bool,
}

impl Match {
    /// Similarity percentage, derived from the stored distance. Pure, so
    /// re-filtering by a new floor never needs a rescan.
    pub fn similarity(&self) -> f64 {
        similarity_percent(self.distance)
    }
}

/// Result of one search pass over a directory tree.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Retained matches, ascending by distance (ties broken by path).
    pub matches: Vec<Match>,
    /// Candidate files that were hashed and scored.
    pub scanned: usize,
    /// Candidate files skipped because they could not be hashed.
    pub skipped: usize,
}

impl SearchOutcome {
    /// Matches strictly below `threshold`, preserving rank order.
    pub fn within_distance(&self, threshold: f64) -> Vec<Match> {
        self.matches
            .iter()
            .filter(|m| m.distance < threshold)
            .cloned()
            .collect()
    }

    /// Matches strictly above the similarity `floor`, preserving rank order.
    pub fn above_similarity(&self, floor: f64) -> Vec<Match> {
        self.matches
            .iter()
            .filter(|m| m.similarity() > floor)
            .cloned()
            .collect()
    }

    /// Fixed-size chunks of the ranked matches, for consumers that reveal
    /// results incrementally on their own schedule.
    pub fn batches(&self, size: usize) -> impl Iterator<Item = &[Match]> {
        self.matches.chunks(size.max(1))
    }
}

/// Directory similarity search over a bounded worker pool.
///
/// Read-only over the filesystem: hashing, scoring and ranking only. Copying
/// matches somewhere is the caller's business (see [`super::collect`]).
pub struct SearchEngine {
    config: SearchConfig,
    pool: rayon::ThreadPool,
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        let jobs = if config.jobs == 0 {
            num_cpus::get()
        } else {
            config.jobs
        };
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Enumerate candidate files under `root`, sorted for deterministic
    /// processing and ranking.
    pub fn discover_candidates(&self, root: &Path) -> Result<Vec<PathBuf>, SearchError> {
        if !root.is_dir() {
            return Err(SearchError::InvalidRoot(root.to_path_buf()));
        }

        let mut candidates = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && has_valid_extension(path, &self.config.extensions) {
                candidates.push(path.to_path_buf());
            }
        }
        candidates.sort();
        Ok(candidates)
    }

    /// Hash every candidate under `root`, score it against `reference`, and
    /// return the ranked matches below the configured distance threshold.
    pub fn search<F>(
        &self,
        root: &Path,
        reference: &ImageSignature,
        cancel: &CancelToken,
        progress: F,
    ) -> Result<SearchOutcome, SearchError>
    where
        F: Fn(usize) + Send + Sync,
    {
        let candidates = self.discover_candidates(root)?;
        self.score_candidates(&candidates, reference, cancel, progress)
    }

    /// Score an already-discovered candidate list against `reference`.
    ///
    /// Files that fail to decode are skipped and counted, never fatal.
    /// `progress` is invoked with the number of files completed so far.
    pub fn score_candidates<F>(
        &self,
        candidates: &[PathBuf],
        reference: &ImageSignature,
        cancel: &CancelToken,
        progress: F,
    ) -> Result<SearchOutcome, SearchError>
    where
        F: Fn(usize) + Send + Sync,
    {
        let skipped = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);

        let scored: Vec<Option<Match>> = self.pool.install(|| {
            candidates
                .par_iter()
                .map(|path| {
                    if cancel.is_cancelled() {
                        return None;
                    }

                    let result = match ImageSignature::from_file(path) {
                        Ok(signature) => {
                            let distance = weighted_distance(reference, &signature);
                            Some(Match {
                                path: path.clone(),
                                distance,
                                is_small: signature.is_small,
                            })
                        }
                        Err(err) => {
                            skipped.fetch_add(1, Ordering::Relaxed);
                            verbose_println(
                                self.config.verbose,
                                &format!("skipping {}: {}", path.display(), err),
                            );
                            None
                        }
                    };

                    progress(completed.fetch_add(1, Ordering::Relaxed) + 1);
                    result
                })
                .collect()
        });

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let skipped = skipped.load(Ordering::Relaxed);
        let mut matches: Vec<Match> = scored
            .into_iter()
            .flatten()
            .filter(|m| m.distance < self.config.distance_threshold)
            .collect();
        matches.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.path.cmp(&b.path))
        });

        Ok(SearchOutcome {
            matches,
            scanned: candidates.len() - skipped,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resample::resize_rgb;
    use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
    use tempfile::TempDir;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            let fx = x as f64 / width as f64;
            let fy = y as f64 / height as f64;
            Rgb([
                (fx * 255.0) as u8,
                (fy * 255.0) as u8,
                ((1.0 - fx) * fy * 255.0) as u8,
            ])
        })
    }

    fn checker_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            if (x / 25 + y / 25) % 2 == 0 {
                Rgb([240, 240, 240])
            } else {
                Rgb([15, 15, 15])
            }
        })
    }

    fn engine(threshold: f64) -> SearchEngine {
        SearchEngine::new(SearchConfig {
            distance_threshold: threshold,
            jobs: 2,
            ..SearchConfig::default()
        })
        .unwrap()
    }

    fn outcome_of(matches: Vec<(f64, &str)>) -> SearchOutcome {
        SearchOutcome {
            matches: matches
                .into_iter()
                .map(|(distance, name)| Match {
                    path: PathBuf::from(name),
                    distance,
                    is_small: false,
                })
                .collect(),
            scanned: 0,
            skipped: 0,
        }
    }

    #[test]
    fn test_identical_file_ranks_first_with_zero_distance() {
        let dir = TempDir::new().unwrap();
        let original = gradient_image(500, 500);
        original.save(dir.path().join("original.png")).unwrap();
        checker_image(500, 500)
            .save(dir.path().join("other.png"))
            .unwrap();

        let reference =
            ImageSignature::from_image(&DynamicImage::ImageRgb8(original)).unwrap();
        let outcome = engine(20.0)
            .search(dir.path(), &reference, &CancelToken::new(), |_| {})
            .unwrap();

        assert!(!outcome.matches.is_empty());
        let first = &outcome.matches[0];
        assert!(first.path.ends_with("original.png"));
        assert_eq!(first.distance, 0.0);
        assert_eq!(first.similarity(), 100.0);
    }

    #[test]
    fn test_thumbnail_matches_across_buckets() {
        let dir = TempDir::new().unwrap();
        let original = gradient_image(500, 500);
        let thumbnail = resize_rgb(&original, 100, 100).unwrap();
        original.save(dir.path().join("full.png")).unwrap();
        thumbnail.save(dir.path().join("thumb.png")).unwrap();

        let reference =
            ImageSignature::from_image(&DynamicImage::ImageRgb8(original)).unwrap();
        let outcome = engine(20.0)
            .search(dir.path(), &reference, &CancelToken::new(), |_| {})
            .unwrap();

        assert_eq!(outcome.matches.len(), 2);
        let small = outcome
            .matches
            .iter()
            .find(|m| m.path.ends_with("thumb.png"))
            .unwrap();
        assert!(small.is_small);
        assert!(small.distance < 20.0);
    }

    #[test]
    fn test_empty_directory_yields_empty_outcome() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

        let reference = ImageSignature::from_image(&DynamicImage::ImageRgb8(
            gradient_image(64, 64),
        ))
        .unwrap();
        let outcome = engine(12.0)
            .search(dir.path(), &reference, &CancelToken::new(), |_| {})
            .unwrap();

        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.scanned, 0);
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn test_corrupt_file_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        gradient_image(200, 200)
            .save(dir.path().join("good.png"))
            .unwrap();
        std::fs::write(dir.path().join("bad.png"), b"garbage bytes").unwrap();

        let reference = ImageSignature::from_image(&DynamicImage::ImageRgb8(
            gradient_image(200, 200),
        ))
        .unwrap();
        let outcome = engine(20.0)
            .search(dir.path(), &reference, &CancelToken::new(), |_| {})
            .unwrap();

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.scanned, 1);
        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let reference = ImageSignature::from_image(&DynamicImage::ImageRgb8(
            gradient_image(64, 64),
        ))
        .unwrap();
        let result = engine(12.0).search(
            Path::new("/definitely/not/a/real/directory"),
            &reference,
            &CancelToken::new(),
            |_| {},
        );
        assert!(matches!(result, Err(SearchError::InvalidRoot(_))));
    }

    #[test]
    fn test_cancelled_search_discards_results() {
        let dir = TempDir::new().unwrap();
        gradient_image(100, 100)
            .save(dir.path().join("a.png"))
            .unwrap();

        let reference = ImageSignature::from_image(&DynamicImage::ImageRgb8(
            gradient_image(100, 100),
        ))
        .unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = engine(12.0).search(dir.path(), &reference, &cancel, |_| {});
        assert!(matches!(result, Err(SearchError::Cancelled)));
    }

    #[test]
    fn test_search_is_deterministic() {
        let dir = TempDir::new().unwrap();
        gradient_image(400, 300).save(dir.path().join("a.png")).unwrap();
        gradient_image(420, 300).save(dir.path().join("b.png")).unwrap();
        checker_image(400, 400).save(dir.path().join("c.png")).unwrap();

        let reference = ImageSignature::from_image(&DynamicImage::ImageRgb8(
            gradient_image(400, 300),
        ))
        .unwrap();
        let eng = engine(40.0);
        let first = eng
            .search(dir.path(), &reference, &CancelToken::new(), |_| {})
            .unwrap();
        let second = eng
            .search(dir.path(), &reference, &CancelToken::new(), |_| {})
            .unwrap();

        assert_eq!(first.matches, second.matches);
    }

    #[test]
    fn test_refilter_monotonicity_and_idempotence() {
        let outcome = outcome_of(vec![
            (0.0, "a"),
            (3.0, "b"),
            (7.5, "c"),
            (11.0, "d"),
        ]);

        // Tightening the threshold never grows the set.
        assert_eq!(outcome.within_distance(12.0).len(), 4);
        assert_eq!(outcome.within_distance(7.5).len(), 2);
        assert_eq!(outcome.within_distance(0.0).len(), 0);

        // Filtering an already-filtered set by a tighter threshold matches
        // filtering the original set directly.
        let loose = outcome_of(
            outcome
                .within_distance(8.0)
                .iter()
                .map(|m| (m.distance, m.path.to_str().unwrap()))
                .collect(),
        );
        assert_eq!(loose.within_distance(4.0), outcome.within_distance(4.0));
        // Re-applying the same threshold is a no-op.
        assert_eq!(loose.within_distance(8.0), outcome.within_distance(8.0));
    }

    #[test]
    fn test_similarity_floor_filter() {
        let outcome = outcome_of(vec![(0.0, "a"), (16.0, "b"), (60.0, "c")]);

        // 60/64 distance is 6.25% similar and falls below a 25% floor.
        let shown = outcome.above_similarity(25.0);
        assert_eq!(shown.len(), 2);
        // Raising the floor never increases the displayed count.
        assert!(outcome.above_similarity(80.0).len() <= shown.len());
    }

    #[test]
    fn test_batches_chunking() {
        let outcome = outcome_of(vec![(1.0, "a"), (2.0, "b"), (3.0, "c")]);
        let batches: Vec<_> = outcome.batches(2).collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].len(), 1);
    }
}
