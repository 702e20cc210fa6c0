//! Random geometric augmentation of training images.
use image::{imageops, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use rand::Rng;

/// Ranges of the random transformations.
#[derive(Clone, Debug)]
pub struct Augmenter {
    /// Maximum rotation in degrees, either direction.
    pub rotation: f32,
    /// Maximum horizontal shift as a fraction of the width.
    pub width_shift: f32,
    /// Maximum vertical shift as a fraction of the height.
    pub height_shift: f32,
    /// Zoom factors are drawn from `[1 - zoom, 1 + zoom]`.
    pub zoom: f32,
    pub horizontal_flip: bool,
}

/// One concrete draw of the random transformations.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub angle_degrees: f32,
    pub zoom_x: f32,
    pub zoom_y: f32,
    /// Shift in pixels.
    pub shift_x: f32,
    pub shift_y: f32,
    pub flip: bool,
}

impl Default for Augmenter {
    fn default() -> Self {
        Self {
            rotation: 30.0,
            width_shift: 0.2,
            height_shift: 0.2,
            zoom: 0.2,
            horizontal_flip: true,
        }
    }
}

impl Augmenter {
    pub fn apply<R: Rng>(&self, image: &RgbImage, rng: &mut R) -> RgbImage {
        let transform = self.sample(image.dimensions(), rng);
        transform.apply(image)
    }

    pub fn sample<R: Rng>(&self, (width, height): (u32, u32), rng: &mut R) -> Transform {
        Transform {
            angle_degrees: symmetric(rng, self.rotation),
            zoom_x: 1.0 + symmetric(rng, self.zoom),
            zoom_y: 1.0 + symmetric(rng, self.zoom),
            shift_x: symmetric(rng, self.width_shift) * width as f32,
            shift_y: symmetric(rng, self.height_shift) * height as f32,
            flip: self.horizontal_flip && rng.gen_bool(0.5),
        }
    }
}

impl Transform {
    /// Warp with black fill for pixels without a pre-image, then optionally mirror.
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        let warped = warp(
            image,
            &self.projection(image.dimensions()),
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
        );

        match self.flip {
            true => imageops::flip_horizontal(&warped),
            false => warped,
        }
    }

    /// Rotation and zoom around the image center followed by the shift.
    fn projection(&self, (width, height): (u32, u32)) -> Projection {
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);

        Projection::translate(cx + self.shift_x, cy + self.shift_y)
            * Projection::rotate(self.angle_degrees.to_radians())
            * Projection::scale(self.zoom_x, self.zoom_y)
            * Projection::translate(-cx, -cy)
    }
}

/// Uniform sample from `[-range, range]`.
fn symmetric<R: Rng>(rng: &mut R, range: f32) -> f32 {
    match range > 0.0 {
        true => rng.gen_range(-range..=range),
        false => 0.0,
    }
}
