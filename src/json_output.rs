//! JSON-lines output for embedding hosts
//!
//! When the --json flag is enabled, all progress and result information is
//! emitted as JSON lines to stdout, suppressing all other output.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Last progress emission timestamp (milliseconds since epoch)
/// Used for throttling progress updates to ~25 FPS (40ms between updates)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonMessage {
    /// Progress update
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    /// One retained similarity match
    Match {
        path: String,
        distance: f64,
        similarity: f64,
        small: bool,
    },
    /// Thumbnail written for one source file
    FileCompleted {
        input_path: String,
        output_path: String,
        subject_found: bool,
    },
    /// One source file could not be processed
    FileFailed { input_path: String, error: String },
    /// Search summary
    SearchSummary {
        scanned: usize,
        skipped: usize,
        matched: usize,
        displayed: usize,
        duration_secs: f64,
    },
    /// Thumbnail batch summary
    ThumbSummary {
        total_files: usize,
        processed: usize,
        failed: usize,
        duration_secs: f64,
    },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Create and emit progress message (throttled to ~25 FPS)
    ///
    /// Progress updates are throttled to emit at most every 40ms. The final
    /// progress (current == total) is always emitted so consumers observe
    /// 100% completion.
    pub fn progress(current: usize, total: usize, message: impl Into<String>) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let last_ms = LAST_PROGRESS_MS.load(Ordering::Relaxed);

        if now_ms - last_ms >= 40 || current == total {
            LAST_PROGRESS_MS.store(now_ms, Ordering::Relaxed);
            Self::Progress {
                current,
                total,
                message: message.into(),
            }
            .emit();
        }
    }

    /// Create and emit a match message
    pub fn match_found(path: &Path, distance: f64, similarity: f64, small: bool) {
        Self::Match {
            path: path.display().to_string(),
            distance,
            similarity,
            small,
        }
        .emit();
    }

    /// Create and emit a file completed message
    pub fn file_completed(input_path: &Path, output_path: &Path, subject_found: bool) {
        Self::FileCompleted {
            input_path: input_path.display().to_string(),
            output_path: output_path.display().to_string(),
            subject_found,
        }
        .emit();
    }

    /// Create and emit a file failed message
    pub fn file_failed(input_path: &Path, error: impl Into<String>) {
        Self::FileFailed {
            input_path: input_path.display().to_string(),
            error: error.into(),
        }
        .emit();
    }
}
