use image::{ImageBuffer, Rgb, RgbImage};

use super::locate::SubjectBounds;

/// Padding color for crop windows that extend past the source bounds.
pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Margin factor applied around a detected subject.
const SUBJECT_MARGIN: f64 = 1.2;

/// Square crop window in source-image coordinates. `left`/`top` may be
/// negative and `left + size`/`top + size` may exceed the source: the parts
/// outside are padded with [`BACKGROUND`] when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub left: i64,
    pub top: i64,
    pub size: u32,
}

impl CropRegion {
    pub fn right(&self) -> i64 {
        self.left + self.size as i64
    }

    pub fn bottom(&self) -> i64 {
        self.top + self.size as i64
    }
}

/// Compute the square crop window for a source image.
///
/// With a subject: 1.2x the larger subject extent, floored at the shorter
/// source side so a flat or narrow edge region never collapses the window to
/// a sliver; centered on the subject. Without: the largest centered square.
pub fn crop_window(
    src_width: u32,
    src_height: u32,
    bounds: Option<&SubjectBounds>,
) -> CropRegion {
    let shorter_side = src_width.min(src_height);

    match bounds {
        Some(b) => {
            let margin_h = (SUBJECT_MARGIN * b.height() as f64).round() as u32;
            let margin_w = (SUBJECT_MARGIN * b.width() as f64).round() as u32;
            let size = margin_h.max(margin_w).max(shorter_side).max(1);

            let (cx, cy) = b.center();
            CropRegion {
                left: cx as i64 - (size / 2) as i64,
                top: cy as i64 - (size / 2) as i64,
                size,
            }
        }
        None => CropRegion {
            left: ((src_width - shorter_side) / 2) as i64,
            top: ((src_height - shorter_side) / 2) as i64,
            size: shorter_side,
        },
    }
}

/// Produce a square image centered on the subject (or the image center when
/// no subject was found), padding with [`BACKGROUND`] wherever the crop
/// window leaves the source. The output is always exactly square and never
/// truncates a detected subject.
pub fn reframe(img: &RgbImage, bounds: Option<&SubjectBounds>) -> RgbImage {
    let (src_width, src_height) = img.dimensions();
    if src_width == src_height {
        return img.clone();
    }

    let window = crop_window(src_width, src_height, bounds);
    let mut canvas: RgbImage =
        ImageBuffer::from_pixel(window.size, window.size, BACKGROUND);

    // Intersection of the crop window with the source image.
    let copy_left = window.left.max(0) as u32;
    let copy_top = window.top.max(0) as u32;
    let copy_right = window.right().min(src_width as i64).max(0) as u32;
    let copy_bottom = window.bottom().min(src_height as i64).max(0) as u32;

    if copy_right > copy_left && copy_bottom > copy_top {
        let paste_x = (-window.left).max(0) as u32;
        let paste_y = (-window.top).max(0) as u32;

        for y in 0..(copy_bottom - copy_top) {
            for x in 0..(copy_right - copy_left) {
                let pixel = img.get_pixel(copy_left + x, copy_top + y);
                canvas.put_pixel(paste_x + x, paste_y + y, *pixel);
            }
        }
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thumbnail::locate::locate_subject;

    fn white_canvas(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_pixel(width, height, Rgb([255, 255, 255]))
    }

    fn with_dark_box(
        mut img: RgbImage,
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
    ) -> RgbImage {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        img
    }

    #[test]
    fn test_output_is_always_square() {
        let sources = [
            white_canvas(640, 480),
            white_canvas(480, 640),
            with_dark_box(white_canvas(800, 200), 10, 10, 60, 60),
        ];
        for img in &sources {
            let out = reframe(img, locate_subject(img).as_ref());
            assert_eq!(out.width(), out.height());
        }
    }

    #[test]
    fn test_square_source_is_unchanged() {
        let img = with_dark_box(white_canvas(400, 400), 50, 50, 120, 120);
        let out = reframe(&img, locate_subject(&img).as_ref());
        assert_eq!(out, img);
    }

    #[test]
    fn test_uniform_source_center_crops_to_shorter_side() {
        let img: RgbImage = ImageBuffer::from_pixel(640, 480, Rgb([99, 99, 99]));
        let out = reframe(&img, None);
        assert_eq!(out.dimensions(), (480, 480));
        // Entirely inside the source, so no padding appears.
        for p in out.pixels() {
            assert_eq!(*p, Rgb([99, 99, 99]));
        }
    }

    #[test]
    fn test_window_contains_subject() {
        let bounds = SubjectBounds {
            min_x: 100,
            min_y: 60,
            max_x: 200,
            max_y: 140,
        };
        let window = crop_window(400, 300, Some(&bounds));

        assert!(window.left <= bounds.min_x as i64);
        assert!(window.top <= bounds.min_y as i64);
        assert!(window.right() >= bounds.max_x as i64);
        assert!(window.bottom() >= bounds.max_y as i64);
    }

    #[test]
    fn test_window_floors_at_shorter_side() {
        // Tiny subject in a 640x480 image: the window must not shrink below
        // the shorter source side.
        let bounds = SubjectBounds {
            min_x: 10,
            min_y: 10,
            max_x: 20,
            max_y: 20,
        };
        let window = crop_window(640, 480, Some(&bounds));
        assert_eq!(window.size, 480);
    }

    #[test]
    fn test_window_scales_with_large_subject() {
        // Subject wider than the shorter side: 1.2x margin wins.
        let bounds = SubjectBounds {
            min_x: 0,
            min_y: 100,
            max_x: 600,
            max_y: 200,
        };
        let window = crop_window(640, 480, Some(&bounds));
        assert_eq!(window.size, 720);
    }

    #[test]
    fn test_out_of_bounds_window_pads_with_background() {
        // Subject hugging the left edge of a wide flat image forces the
        // window past the source on at least one side.
        let img = with_dark_box(white_canvas(300, 100), 0, 20, 60, 80);
        let bounds = SubjectBounds {
            min_x: 0,
            min_y: 20,
            max_x: 59,
            max_y: 79,
        };
        let window = crop_window(300, 100, Some(&bounds));
        let out = reframe(&img, Some(&bounds));

        assert_eq!(out.width(), window.size);
        // The window is centered at x=29 with size 100, so it starts left of
        // the source; the first columns must be pure background.
        assert!(window.left < 0);
        assert_eq!(*out.get_pixel(0, 0), BACKGROUND);
        // And the subject survives inside the output.
        let dark = out.pixels().filter(|p| p[0] == 0).count();
        assert_eq!(dark, 60 * 60);
    }
}
