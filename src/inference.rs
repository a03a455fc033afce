//! The preprocessing + inference contract.
//!
//! [`classify`] turns one drawn canvas into a [`ConfidenceMap`]. It holds no
//! state between calls; the only thing it touches is the read-only classifier
//! handle passed in by the caller.

use std::{
    backtrace::Backtrace,
    error::Error,
    panic::{catch_unwind, AssertUnwindSafe},
};

use burn::{config::Config, module::Module, record::Recorder, tensor::backend::Backend};

use crate::{
    canvas::Canvas,
    confidence::ConfidenceMap,
    error::{ArtifactError, InferenceError},
    model::Model,
    preprocess::{preprocess, DigitInput, INPUT_SHAPE},
    training::{ModelRecorder, TrainingConfig, CONFIG_FILE, MODEL_FILE},
    NUM_CLASSES,
};

/// Anything that maps a normalized digit to ten class probabilities.
pub trait DigitClassifier {
    /// One forward pass. The probabilities are returned as produced, without
    /// renormalization.
    fn probabilities(&self, input: &DigitInput) -> Result<[f32; NUM_CLASSES], InferenceError>;
}

/// A trained model on a device, loaded once and only read afterwards.
#[derive(Debug)]
pub struct Classifier<B: Backend> {
    model: Model<B>,
    device: B::Device,
}

impl<B: Backend> Classifier<B> {
    pub fn new(model: Model<B>, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Rebuilds the model from the config and parameters written by training.
    pub fn load(artifact_dir: &str, device: B::Device) -> Result<Self, ArtifactError> {
        let config = TrainingConfig::load(format!("{artifact_dir}/{CONFIG_FILE}"))?;
        let record = ModelRecorder::new()
            .load(format!("{artifact_dir}/{MODEL_FILE}").into(), &device)?;

        let model = config.model.init::<B>(&device).load_record(record);
        log::info!("Loaded model from {artifact_dir}/{MODEL_FILE}");

        Ok(Self::new(model, device))
    }

    pub fn model(&self) -> &Model<B> {
        &self.model
    }
}

impl<B: Backend> DigitClassifier for Classifier<B> {
    fn probabilities(&self, input: &DigitInput) -> Result<[f32; NUM_CLASSES], InferenceError> {
        let images = input.to_tensor::<B>(&self.device);

        let dims = images.dims();
        if dims != INPUT_SHAPE {
            return Err(InferenceError::InputShape {
                expected: INPUT_SHAPE,
                actual: dims.to_vec(),
            });
        }

        let values = self
            .model
            .probabilities(images)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|err| InferenceError::Output(format!("{err:?}")))?;

        let scores: [f32; NUM_CLASSES] = values
            .as_slice()
            .try_into()
            .map_err(|_| InferenceError::OutputSize(values.len()))?;

        if let Some(index) = scores.iter().position(|score| !score.is_finite()) {
            return Err(InferenceError::NonFinite(index));
        }

        Ok(scores)
    }
}

/// Classifies a drawn canvas.
///
/// Returns `Ok(None)` when there is nothing to classify (no canvas, or a
/// canvas without pixel data); the classifier is not called in that case.
/// Any failure is logged here with its full detail and returned as is; a
/// failed call never produces a partial map.
pub fn classify<C: DigitClassifier + ?Sized>(
    classifier: &C,
    canvas: Option<&Canvas>,
) -> Result<Option<ConfidenceMap>, InferenceError> {
    let canvas = match canvas {
        Some(canvas) if !canvas.is_empty() => canvas,
        _ => return Ok(None),
    };

    // Backends report some failures by panicking; those end this call only.
    let result = catch_unwind(AssertUnwindSafe(|| {
        preprocess(canvas).and_then(|input| classifier.probabilities(&input))
    }))
    .unwrap_or_else(|payload| Err(InferenceError::Panicked(panic_message(payload.as_ref()))))
    .map(ConfidenceMap::new);

    match result {
        Ok(map) => Ok(Some(map)),
        Err(err) => {
            log::error!(
                "Error while classifying a {}x{} canvas: {}\nStack backtrace:\n{}",
                canvas.width,
                canvas.height,
                error_chain(&err),
                Backtrace::force_capture()
            );
            Err(err)
        }
    }
}

/// The error followed by each of its sources, one per line.
pub(crate) fn error_chain(err: &dyn Error) -> String {
    let mut report = format!("{err} ({err:?})");
    let mut source = err.source();

    while let Some(cause) = source {
        report.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }

    report
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::cell::Cell;

    /// Returns fixed probabilities and counts how often it was asked.
    #[derive(Default)]
    pub struct FixedClassifier {
        pub calls: Cell<usize>,
        pub fail: bool,
    }

    impl FixedClassifier {
        pub const OUTPUT: [f32; NUM_CLASSES] =
            [0.0, 0.05, 0.05, 0.1, 0.0, 0.0, 0.0, 0.7, 0.1, 0.0];

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }
    }

    impl DigitClassifier for FixedClassifier {
        fn probabilities(&self, input: &DigitInput) -> Result<[f32; NUM_CLASSES], InferenceError> {
            self.calls.set(self.calls.get() + 1);
            assert_eq!(input.values().len(), 28 * 28);

            if self.fail {
                Err(InferenceError::Output("backend went away".to_string()))
            } else {
                Ok(Self::OUTPUT)
            }
        }
    }

    #[test]
    fn absent_input_skips_classifier() {
        let classifier = FixedClassifier::default();

        assert!(classify(&classifier, None).unwrap().is_none());
        assert!(classify(&classifier, Some(&Canvas::default()))
            .unwrap()
            .is_none());
        assert!(classify(&classifier, Some(&Canvas::new(280, 280, Vec::new())))
            .unwrap()
            .is_none());
        assert_eq!(classifier.calls.get(), 0);
    }

    #[test]
    fn probabilities_are_paired_with_labels() {
        let classifier = FixedClassifier::default();
        let canvas = Canvas::filled(280, 280, [255, 255, 255, 255]);

        let map = classify(&classifier, Some(&canvas)).unwrap().unwrap();

        assert_eq!(classifier.calls.get(), 1);
        assert_eq!(map.get("7"), Some(0.7));
        assert_eq!(map.probabilities(), &FixedClassifier::OUTPUT);
    }

    #[test]
    fn malformed_canvas_fails_before_classifier() {
        let classifier = FixedClassifier::default();
        let canvas = Canvas::new(10, 10, vec![0; 10]);

        let err = classify(&classifier, Some(&canvas)).unwrap_err();

        assert!(matches!(err, InferenceError::Canvas(_)));
        assert_eq!(classifier.calls.get(), 0);
    }

    struct PanickingClassifier;

    impl DigitClassifier for PanickingClassifier {
        fn probabilities(&self, _input: &DigitInput) -> Result<[f32; NUM_CLASSES], InferenceError> {
            panic!("shape mismatch in backend")
        }
    }

    #[test]
    fn backend_panic_becomes_an_error() {
        let canvas = Canvas::filled(28, 28, [0, 0, 0, 255]);

        let err = classify(&PanickingClassifier, Some(&canvas)).unwrap_err();

        assert!(matches!(err, InferenceError::Panicked(message) if message == "shape mismatch in backend"));
    }

    #[test]
    fn error_chain_lists_every_cause() {
        let err = InferenceError::from(Canvas::new(2, 2, vec![0; 3]).validate().unwrap_err());

        let report = error_chain(&err);

        assert!(report.starts_with("invalid canvas: canvas buffer holds 3 bytes"));
        assert!(report.contains("\n  caused by: canvas buffer holds 3 bytes, expected 16"));
    }

    #[test]
    fn classifier_failure_is_returned_whole() {
        let classifier = FixedClassifier::failing();
        let canvas = Canvas::filled(28, 28, [0, 0, 0, 255]);

        let err = classify(&classifier, Some(&canvas)).unwrap_err();

        assert_eq!(err.to_string(), "classifier output could not be read: backend went away");
    }
}
