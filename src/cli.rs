use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::similarity::{DEFAULT_DISTANCE_THRESHOLD, DEFAULT_SIMILARITY_FLOOR};
use crate::thumbnail::{DEFAULT_JPEG_QUALITY, DEFAULT_THUMB_SIZE};

#[derive(Parser, Debug)]
#[command(
    name = "lookalike",
    about = "Find visually similar images and produce subject-centered square thumbnails",
    long_about = "
lookalike - perceptual image search and smart thumbnails

Two engines behind one binary:

  find   Hashes a reference image with three perceptual algorithms (average,
         difference and wavelet hash), scans a directory tree in parallel and
         ranks every image by weighted Hamming distance. Thumbnails and their
         full-size originals still match thanks to size-bucketed hashing.

  thumb  Locates the visual subject of each input image via edge detection
         and reframes it onto a white square canvas with a 20% margin, then
         writes a fixed-size JPEG next to the source as thumb_<name>.jpg.

Example Usage:
  # Rank everything under ~/Pictures against a reference photo
  lookalike find -r ref.jpg ~/Pictures

  # Looser scan threshold, hide matches below 40% similarity
  lookalike find -r ref.jpg -t 20 --floor 40 ~/Pictures

  # Copy all displayed matches into a timestamped results directory
  lookalike find -r ref.jpg --collect ./results ~/Pictures

  # Square 300x300 thumbnails for a whole directory tree
  lookalike thumb -i ~/Pictures

  # Smaller thumbnails, higher JPEG quality, 4 workers
  lookalike thumb -i ~/Pictures -s 160 -q 92 -j 4"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find images visually similar to a reference image
    Find(FindArgs),
    /// Produce subject-centered square thumbnails
    Thumb(ThumbArgs),
}

#[derive(Args, Debug)]
pub struct FindArgs {
    /// Reference image to compare against
    #[arg(short = 'r', long = "reference", value_name = "FILE")]
    pub reference: PathBuf,

    /// Directory tree to scan
    #[arg(value_name = "DIR", default_value = ".")]
    pub directory: PathBuf,

    /// Weighted distance threshold; candidates at or above it are dropped
    /// during the scan (0-64, lower is stricter)
    #[arg(short = 't', long = "threshold", default_value = "12", value_name = "DIST")]
    pub threshold: f64,

    /// Similarity floor in percent; matches at or below it are hidden.
    /// Re-applied over the scan results without rescanning
    #[arg(long = "floor", default_value = "25", value_name = "PERCENT")]
    pub floor: f64,

    /// Copy displayed matches into a timestamped directory created under DIR
    #[arg(long = "collect", value_name = "DIR")]
    pub collect_dir: Option<PathBuf>,

    /// Comma-separated list of image extensions to scan
    #[arg(long = "extensions", default_value = "jpg,jpeg,png,gif,bmp,webp")]
    pub extensions_str: String,

    /// Number of parallel hashing jobs (0 = auto-detect CPU cores)
    #[arg(short = 'j', long = "jobs", default_value = "0", value_name = "N")]
    pub jobs: usize,

    /// Emit machine-readable JSON lines instead of human-oriented output
    #[arg(long = "json")]
    pub json: bool,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Load default settings from a JSON config file
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,
}

impl FindArgs {
    /// Parse the extensions string into a vector
    pub fn parse_extensions(&self) -> Vec<String> {
        parse_extension_list(&self.extensions_str)
    }

    pub fn uses_default_threshold(&self) -> bool {
        self.threshold == DEFAULT_DISTANCE_THRESHOLD
    }

    pub fn uses_default_floor(&self) -> bool {
        self.floor == DEFAULT_SIMILARITY_FLOOR
    }
}

#[derive(Args, Debug)]
pub struct ThumbArgs {
    /// Input directories or single image files (can be specified multiple times)
    #[arg(short = 'i', long = "input", required = true, value_name = "DIR|FILE")]
    pub input_paths: Vec<PathBuf>,

    /// Edge length of the square thumbnails in pixels
    #[arg(short = 's', long = "size", default_value = "300", value_name = "PIXELS")]
    pub size: u32,

    /// JPEG quality for the thumbnail files (1-100)
    #[arg(short = 'q', long = "quality", default_value = "85", value_name = "Q")]
    pub quality: u8,

    /// Comma-separated list of image extensions to process
    #[arg(long = "extensions", default_value = "jpg,jpeg,png,webp")]
    pub extensions_str: String,

    /// Number of parallel processing jobs (0 = auto-detect CPU cores)
    #[arg(short = 'j', long = "jobs", default_value = "0", value_name = "N")]
    pub jobs: usize,

    /// Emit machine-readable JSON lines instead of human-oriented output
    #[arg(long = "json")]
    pub json: bool,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Load default settings from a JSON config file
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,
}

impl ThumbArgs {
    /// Parse the extensions string into a vector
    pub fn parse_extensions(&self) -> Vec<String> {
        parse_extension_list(&self.extensions_str)
    }

    pub fn uses_default_size(&self) -> bool {
        self.size == DEFAULT_THUMB_SIZE
    }

    pub fn uses_default_quality(&self) -> bool {
        self.quality == DEFAULT_JPEG_QUALITY
    }
}

fn parse_extension_list(extensions_str: &str) -> Vec<String> {
    extensions_str
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extension_list() {
        assert_eq!(
            parse_extension_list("jpg, PNG,.webp,,gif"),
            vec!["jpg", "png", "webp", "gif"]
        );
        assert!(parse_extension_list("").is_empty());
    }

    #[test]
    fn test_find_args_parse() {
        let cli = Cli::parse_from([
            "lookalike", "find", "-r", "ref.jpg", "/photos", "-t", "20", "--floor", "40",
        ]);
        match cli.command {
            Command::Find(args) => {
                assert_eq!(args.reference, PathBuf::from("ref.jpg"));
                assert_eq!(args.directory, PathBuf::from("/photos"));
                assert_eq!(args.threshold, 20.0);
                assert_eq!(args.floor, 40.0);
                assert!(!args.uses_default_threshold());
            }
            _ => panic!("expected find subcommand"),
        }
    }

    #[test]
    fn test_thumb_args_defaults() {
        let cli = Cli::parse_from(["lookalike", "thumb", "-i", "/photos"]);
        match cli.command {
            Command::Thumb(args) => {
                assert_eq!(args.size, 300);
                assert_eq!(args.quality, 85);
                assert!(args.uses_default_size());
                assert!(args.uses_default_quality());
            }
            _ => panic!("expected thumb subcommand"),
        }
    }
}
