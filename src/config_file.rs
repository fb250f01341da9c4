use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::cli::{FindArgs, ThumbArgs};

/// Optional JSON settings file shared by both subcommands. Every field is
/// optional; explicit command-line flags always win over config values.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigFile {
    pub distance_threshold: Option<f64>,
    pub similarity_floor: Option<f64>,
    pub jobs: Option<usize>,
    pub extensions: Option<String>,
    pub thumb_size: Option<u32>,
    pub jpeg_quality: Option<u8>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

impl FindArgs {
    /// Load configuration from a JSON file and merge with command-line
    /// arguments. Only values still at their CLI defaults are replaced.
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        let Some(config_path) = self.config_file.clone() else {
            return Ok(());
        };
        let config = ConfigFile::load(&config_path)?;

        if self.uses_default_threshold() {
            if let Some(threshold) = config.distance_threshold {
                self.threshold = threshold;
            }
        }
        if self.uses_default_floor() {
            if let Some(floor) = config.similarity_floor {
                self.floor = floor;
            }
        }
        if self.jobs == 0 {
            if let Some(jobs) = config.jobs {
                self.jobs = jobs;
            }
        }
        if self.extensions_str == "jpg,jpeg,png,gif,bmp,webp" {
            if let Some(extensions) = config.extensions {
                self.extensions_str = extensions;
            }
        }

        if self.verbose {
            eprintln!("Loaded configuration from: {}", config_path.display());
        }
        Ok(())
    }
}

impl ThumbArgs {
    /// Load configuration from a JSON file and merge with command-line
    /// arguments. Only values still at their CLI defaults are replaced.
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        let Some(config_path) = self.config_file.clone() else {
            return Ok(());
        };
        let config = ConfigFile::load(&config_path)?;

        if self.uses_default_size() {
            if let Some(size) = config.thumb_size {
                self.size = size;
            }
        }
        if self.uses_default_quality() {
            if let Some(quality) = config.jpeg_quality {
                self.quality = quality;
            }
        }
        if self.jobs == 0 {
            if let Some(jobs) = config.jobs {
                self.jobs = jobs;
            }
        }
        if self.extensions_str == "jpg,jpeg,png,webp" {
            if let Some(extensions) = config.extensions {
                self.extensions_str = extensions;
            }
        }

        if self.verbose {
            eprintln!("Loaded configuration from: {}", config_path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("config.json");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"distanceThreshold": 18.5, "jobs": 3}"#);

        let cli = crate::cli::Cli::parse_from([
            "lookalike",
            "find",
            "-r",
            "ref.jpg",
            "--config",
            path.to_str().unwrap(),
        ]);
        let mut args = match cli.command {
            crate::cli::Command::Find(args) => args,
            _ => unreachable!(),
        };
        args.load_and_merge_config().unwrap();

        assert_eq!(args.threshold, 18.5);
        assert_eq!(args.jobs, 3);
        // Untouched by the config file.
        assert_eq!(args.floor, 25.0);
    }

    #[test]
    fn test_cli_flags_beat_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"distanceThreshold": 18.5}"#);

        let cli = crate::cli::Cli::parse_from([
            "lookalike",
            "find",
            "-r",
            "ref.jpg",
            "-t",
            "6",
            "--config",
            path.to_str().unwrap(),
        ]);
        let mut args = match cli.command {
            crate::cli::Command::Find(args) => args,
            _ => unreachable!(),
        };
        args.load_and_merge_config().unwrap();

        assert_eq!(args.threshold, 6.0);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "{not json");

        let cli = crate::cli::Cli::parse_from([
            "lookalike",
            "thumb",
            "-i",
            ".",
            "--config",
            path.to_str().unwrap(),
        ]);
        let mut args = match cli.command {
            crate::cli::Command::Thumb(args) => args,
            _ => unreachable!(),
        };
        assert!(args.load_and_merge_config().is_err());
    }
}
