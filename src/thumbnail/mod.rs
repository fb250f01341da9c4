//! Content-aware square-crop engine: edge-based subject localization,
//! padded square reframing and batch thumbnail production.

pub mod batch;
pub mod locate;
pub mod reframe;

pub use batch::{
    ThumbnailConfig, ThumbnailEngine, ThumbnailError, ThumbnailResult, DEFAULT_JPEG_QUALITY,
    DEFAULT_THUMB_SIZE, THUMB_EXTENSIONS, THUMB_PREFIX,
};
pub use locate::{locate_subject, SubjectBounds, CANNY_HIGH, CANNY_LOW};
pub use reframe::{crop_window, reframe, CropRegion, BACKGROUND};
