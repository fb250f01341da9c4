use fast_image_resize::{images::Image, PixelType, ResizeOptions, Resizer};
use image::{ImageBuffer, Rgb, RgbImage};
use thiserror::Error;

/// Errors produced while resampling pixel buffers.
#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("image dimensions must be non-zero")]
    EmptyImage,

    #[error("resample buffer error: {0}")]
    Buffer(#[from] fast_image_resize::ImageBufferError),

    #[error("resample failed: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),
}

/// Resize an RGB image to exact dimensions using high-quality resampling.
///
/// Uses the default Lanczos3 convolution of `fast_image_resize`, which matches
/// the quality of the usual "high quality downscale" resamplers.
pub fn resize_rgb(img: &RgbImage, width: u32, height: u32) -> Result<RgbImage, ResampleError> {
    let (src_width, src_height) = img.dimensions();

    if src_width == 0 || src_height == 0 || width == 0 || height == 0 {
        return Err(ResampleError::EmptyImage);
    }
    if src_width == width && src_height == height {
        return Ok(img.clone());
    }

    let src_pixels: Vec<u8> = img.pixels().flat_map(|p| [p[0], p[1], p[2]]).collect();
    let src_image = Image::from_vec_u8(src_width, src_height, src_pixels, PixelType::U8x3)?;
    let mut dst_image = Image::new(width, height, PixelType::U8x3);

    let mut resizer = Resizer::new();
    resizer.resize(&src_image, &mut dst_image, Some(&ResizeOptions::default()))?;

    let dst_pixels = dst_image.buffer();
    let mut output: RgbImage = ImageBuffer::new(width, height);
    for (i, pixel) in output.pixels_mut().enumerate() {
        let base_idx = i * 3;
        *pixel = Rgb([
            dst_pixels[base_idx],
            dst_pixels[base_idx + 1],
            dst_pixels[base_idx + 2],
        ]);
    }

    Ok(output)
}
