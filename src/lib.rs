// Library exports for reuse by embedding applications
pub mod cli;
pub mod config_file;
pub mod json_output;
pub mod resample;
pub mod similarity;
pub mod thumbnail;
pub mod utils;

// Re-export commonly used types
pub use json_output::JsonMessage;
pub use similarity::{
    CancelToken, ImageSignature, Match, SearchConfig, SearchEngine, SearchOutcome,
};
pub use thumbnail::{ThumbnailConfig, ThumbnailEngine, ThumbnailResult};
