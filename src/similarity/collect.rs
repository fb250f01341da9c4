use std::io;
use std::path::{Path, PathBuf};

use super::search::Match;

/// Outcome of copying matches into a results directory. Per-file failures are
/// recorded here instead of aborting the remaining copies.
#[derive(Debug)]
pub struct CollectReport {
    pub destination: PathBuf,
    pub copied: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
}

/// Copy every match into a fresh `similar_images_<timestamp>` directory under
/// `base_dir`, keeping original filenames. Name collisions get a `_1`, `_2`,
/// ... suffix before the extension until a free name is found.
pub fn collect_matches(matches: &[Match], base_dir: &Path) -> io::Result<CollectReport> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let destination = base_dir.join(format!("similar_images_{}", timestamp));
    std::fs::create_dir_all(&destination)?;

    let mut report = CollectReport {
        destination: destination.clone(),
        copied: Vec::new(),
        failed: Vec::new(),
    };

    for m in matches {
        let original_name = match m.path.file_name() {
            Some(name) => name.to_owned(),
            None => {
                report.failed.push((
                    m.path.clone(),
                    io::Error::new(io::ErrorKind::InvalidInput, "match has no filename"),
                ));
                continue;
            }
        };

        let dest_path = dedup_destination(&destination.join(&original_name));
        match std::fs::copy(&m.path, &dest_path) {
            Ok(_) => report.copied.push(dest_path),
            Err(err) => report.failed.push((m.path.clone(), err)),
        }
    }

    Ok(report)
}

/// Append `_N` before the extension until the path no longer exists.
fn dedup_destination(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("match");
    let extension = path.extension().and_then(|e| e.to_str());
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut counter = 1;
    loop {
        let candidate = match extension {
            Some(ext) => parent.join(format!("{}_{}.{}", stem, counter, ext)),
            None => parent.join(format!("{}_{}", stem, counter)),
        };
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
