//! Raw strokes as produced by the drawing surface.

use image::{GrayImage, RgbaImage};

/// Bytes per pixel in a canvas buffer (red, green, blue, alpha).
pub const CHANNELS: usize = 4;

/// Largest accepted canvas side, in pixels.
pub const MAX_SIDE: u32 = 2048;

/// Errors raised while validating a raw canvas.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CanvasError {
    #[error("canvas has a zero dimension ({width}x{height})")]
    ZeroSize { width: u32, height: u32 },

    #[error("canvas of {width}x{height} exceeds the {MAX_SIDE} pixel side limit")]
    TooLarge { width: u32, height: u32 },

    #[error(
        "canvas buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA pixels"
    )]
    BufferLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// A four channel pixel grid of arbitrary size, row major.
///
/// The canvas is ephemeral: it lives for one submit event. An empty buffer is
/// how the drawing surface says "nothing to classify".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rgba,
        }
    }

    /// A canvas of the given size with every pixel set to `pixel`.
    pub fn filled(width: u32, height: u32, pixel: [u8; 4]) -> Self {
        let rgba = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();

        Self::new(width, height, rgba)
    }

    /// Whether the surface sent no pixel data at all.
    pub fn is_empty(&self) -> bool {
        self.rgba.is_empty()
    }

    /// Checks dimensions and buffer length against the RGBA layout.
    pub fn validate(&self) -> Result<(), CanvasError> {
        let (width, height) = (self.width, self.height);

        if width == 0 || height == 0 {
            return Err(CanvasError::ZeroSize { width, height });
        }
        if width > MAX_SIDE || height > MAX_SIDE {
            return Err(CanvasError::TooLarge { width, height });
        }

        let expected = width as usize * height as usize * CHANNELS;
        if self.rgba.len() != expected {
            return Err(CanvasError::BufferLength {
                width,
                height,
                expected,
                actual: self.rgba.len(),
            });
        }

        Ok(())
    }

    /// Reduces the canvas to one luma value per pixel, dropping color and alpha.
    pub fn to_grayscale(&self) -> Result<GrayImage, CanvasError> {
        self.validate()?;

        let image = RgbaImage::from_raw(self.width, self.height, self.rgba.clone()).ok_or(
            CanvasError::BufferLength {
                width: self.width,
                height: self.height,
                expected: self.width as usize * self.height as usize * CHANNELS,
                actual: self.rgba.len(),
            },
        )?;

        Ok(image::imageops::grayscale(&image))
    }
}
