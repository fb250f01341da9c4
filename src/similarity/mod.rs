//! Perceptual similarity engine: multi-hash signatures, weighted distance
//! scoring and parallel directory search.

pub mod collect;
pub mod distance;
pub mod search;
pub mod signature;

pub use collect::{collect_matches, CollectReport};
pub use distance::{similarity_percent, weighted_distance, HASH_BITS};
pub use search::{
    CancelToken, Match, SearchConfig, SearchEngine, SearchError, SearchOutcome,
    DEFAULT_DISTANCE_THRESHOLD, DEFAULT_SIMILARITY_FLOOR, IMAGE_EXTENSIONS,
};
pub use signature::{ImageSignature, SignatureError, SMALL_EDGE};
