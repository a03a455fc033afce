//! Backend selection, resolved at compile time from cargo features.

use burn::backend::Autodiff;

#[cfg(feature = "wgpu")]
pub type Inference = burn::backend::Wgpu<f32, i32>;

#[cfg(all(feature = "ndarray", not(feature = "wgpu")))]
pub type Inference = burn::backend::NdArray<f32>;

#[cfg(not(any(feature = "ndarray", feature = "wgpu")))]
compile_error!("Enable the `ndarray` or `wgpu` feature to select a backend.");

/// Backend used by the learner; gradients are tracked on top of [`Inference`].
pub type Training = Autodiff<Inference>;

/// Device the selected backend runs on.
pub fn device() -> burn::tensor::Device<Inference> {
    Default::default()
}
