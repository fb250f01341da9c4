use image::RgbImage;
use imageproc::edges::canny;

/// Canny thresholds for the gradient-magnitude edge map.
pub const CANNY_LOW: f32 = 100.0;
pub const CANNY_HIGH: f32 = 200.0;

/// Bounding region of detected visual content, in source-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl SubjectBounds {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (u32, u32) {
        (
            (self.min_x + self.max_x) / 2,
            (self.min_y + self.max_y) / 2,
        )
    }
}

/// Find the bounding region of visual content via edge detection.
///
/// An already-square image is its own subject: the full canvas is returned
/// without running the detector. `None` means the edge map came back empty
/// (uniform or near-uniform image); callers fall back to a center crop.
pub fn locate_subject(img: &RgbImage) -> Option<SubjectBounds> {
    let (width, height) = img.dimensions();
    if width == height {
        return Some(SubjectBounds {
            min_x: 0,
            min_y: 0,
            max_x: width.saturating_sub(1),
            max_y: height.saturating_sub(1),
        });
    }

    let gray = image::imageops::grayscale(img);
    let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);

    let mut bounds: Option<SubjectBounds> = None;
    for (x, y, pixel) in edges.enumerate_pixels() {
        if pixel[0] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => SubjectBounds {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            },
            Some(b) => SubjectBounds {
                min_x: b.min_x.min(x),
                min_y: b.min_y.min(y),
                max_x: b.max_x.max(x),
                max_y: b.max_y.max(y),
            },
        });
    }
    bounds
}
