use super::signature::ImageSignature;

/// Bit length of each hash; bounds the per-hash Hamming distance and anchors
/// the similarity percentage scale.
pub const HASH_BITS: u32 = 64;

/// Weights `(avg, diff, wavelet)` when both signatures fall in the same size
/// bucket.
const WEIGHTS_MATCHED: (f64, f64, f64) = (0.4, 0.3, 0.3);

/// Weights when comparing across buckets (thumbnail vs full size). Raw
/// luminance comparability is lost there, so the edge-sensitive hash counts
/// for more.
const WEIGHTS_MIXED: (f64, f64, f64) = (0.3, 0.4, 0.3);

fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Weighted distance between two signatures. Lower is more similar; the
/// theoretical maximum is [`HASH_BITS`] since the weights sum to 1.
pub fn weighted_distance(a: &ImageSignature, b: &ImageSignature) -> f64 {
    let (w_avg, w_diff, w_wavelet) = if a.is_small == b.is_small {
        WEIGHTS_MATCHED
    } else {
        WEIGHTS_MIXED
    };

    w_avg * hamming(a.avg, b.avg) as f64
        + w_diff * hamming(a.diff, b.diff) as f64
        + w_wavelet * hamming(a.wavelet, b.wavelet) as f64
}

/// Normalized similarity percentage for display and floor filtering:
/// `100 * (1 - distance / HASH_BITS)`, clamped to `[0, 100]`.
pub fn similarity_percent(distance: f64) -> f64 {
    (100.0 * (1.0 - distance / HASH_BITS as f64)).clamp(0.0, 100.0)
}
