//! Raster helpers shared by the collector, the trainer and the prediction service.
use image::{imageops, RgbImage};

/// Crop the largest square centered in the frame.
pub fn center_square(frame: &RgbImage) -> RgbImage {
    let (width, height) = frame.dimensions();
    let side = width.min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;

    imageops::crop_imm(frame, x, y, side, side).to_image()
}

/// Remove `margin` pixels from both the left and the right edge.
///
/// Returns `None` when nothing would be left of the image.
pub fn crop_side_margins(frame: &RgbImage, margin: u32) -> Option<RgbImage> {
    let (width, height) = frame.dimensions();
    let remaining = width.checked_sub(margin.checked_mul(2)?)?;
    if remaining == 0 || height == 0 {
        return None;
    }

    Some(imageops::crop_imm(frame, margin, 0, remaining, height).to_image())
}

/// Resize to a `size`×`size` square, ignoring the aspect ratio.
pub fn resize_square(frame: &RgbImage, size: u32) -> RgbImage {
    if frame.dimensions() == (size, size) {
        return frame.clone();
    }
    imageops::resize(frame, size, size, imageops::FilterType::Triangle)
}
