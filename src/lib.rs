#![recursion_limit = "256"]

//! Handwritten digit recognition: a small convolutional network trained on
//! MNIST, and a sketchpad page that classifies what you draw.

pub mod backend;
pub mod canvas;
pub mod confidence;
pub mod curves;
pub mod data;
pub mod error;
pub mod history;
pub mod inference;
pub mod logging;
pub mod model;
pub mod preprocess;
pub mod server;
pub mod training;
pub mod widget;

/// Number of digit classes.
pub const NUM_CLASSES: usize = 10;

/// Side length of the square images the classifier consumes.
pub const IMAGE_SIZE: usize = 28;
