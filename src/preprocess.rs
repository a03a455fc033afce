//! Turns a drawn canvas into the tensor the classifier expects.
//!
//! The steps run in a fixed order: luma reduction, Lanczos resampling to
//! 28x28, intensity inversion, scaling to `[0, 1]`, and reshaping to
//! `[1, 28, 28, 1]`. The drawing surface paints dark strokes on a light
//! background while MNIST digits are light on dark, so inversion is required
//! for the classifier to see strokes at all.

use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::{imageops::FilterType, GrayImage};

use crate::{canvas::Canvas, error::InferenceError, IMAGE_SIZE};

/// Shape of one classifier input: batch, height, width, channel.
pub const INPUT_SHAPE: [usize; 4] = [1, IMAGE_SIZE, IMAGE_SIZE, 1];

/// A normalized 28x28 digit, values in `[0, 1]`, row major.
#[derive(Clone, Debug, PartialEq)]
pub struct DigitInput {
    values: Vec<f32>,
}

impl DigitInput {
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Batch of one sample with an explicit channel dimension.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        let data = TensorData::new(self.values.clone(), INPUT_SHAPE);
        Tensor::from_data(data.convert::<B::FloatElem>(), device)
    }
}

/// Runs every preprocessing step on a canvas.
pub fn preprocess(canvas: &Canvas) -> Result<DigitInput, InferenceError> {
    let gray = canvas.to_grayscale()?;
    let resampled = resample(&gray);
    let inverted = invert(resampled);

    normalize(&inverted)
}

/// Resamples to 28x28 with a windowed-sinc filter.
///
/// Nearest neighbour sampling drops thin strokes entirely, so the filter
/// choice matters for accuracy.
pub fn resample(image: &GrayImage) -> GrayImage {
    let side = IMAGE_SIZE as u32;
    image::imageops::resize(image, side, side, FilterType::Lanczos3)
}

/// `255 - v` for every pixel.
pub fn invert(mut image: GrayImage) -> GrayImage {
    image::imageops::invert(&mut image);
    image
}

/// Scales a 28x28 image from `[0, 255]` to `[0, 1]`.
pub fn normalize(image: &GrayImage) -> Result<DigitInput, InferenceError> {
    let (width, height) = image.dimensions();
    if width as usize != IMAGE_SIZE || height as usize != IMAGE_SIZE {
        return Err(InferenceError::ImageSize {
            width,
            height,
            expected: IMAGE_SIZE,
        });
    }

    let values = image
        .pixels()
        .map(|pixel| pixel.0[0] as f32 / 255.0)
        .collect();

    Ok(DigitInput { values })
}
