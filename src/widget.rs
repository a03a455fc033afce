//! State of the sketchpad page: a drawing region and a ranked label display.

use serde::Serialize;

use crate::{
    canvas::Canvas,
    confidence::{ConfidenceMap, LabelConfidence},
    error::InferenceError,
    inference::{classify, DigitClassifier},
};

/// Labels shown in the ranked display.
pub const TOP_CLASSES: usize = 3;

/// What the label display shows after a successful submit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabelView {
    /// The best labels, highest confidence first.
    pub top: Vec<LabelConfidence>,
    pub confidences: ConfidenceMap,
}

impl LabelView {
    pub fn new(confidences: ConfidenceMap) -> Self {
        Self {
            top: confidences.top_k(TOP_CLASSES),
            confidences,
        }
    }
}

/// The one message a user sees when a submit fails.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct SubmitError {
    pub message: String,
}

impl From<InferenceError> for SubmitError {
    fn from(err: InferenceError) -> Self {
        Self {
            message: format!("Processing error: {err}"),
        }
    }
}

/// The drawing region and the label display.
///
/// Submit replaces the display with a fresh classification; clear empties
/// both parts without touching the classifier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sketchpad {
    drawing: Option<Canvas>,
    label: Option<LabelView>,
}

impl Sketchpad {
    pub fn with_drawing(drawing: Option<Canvas>) -> Self {
        Self {
            drawing,
            label: None,
        }
    }

    pub fn draw(&mut self, canvas: Canvas) {
        self.drawing = Some(canvas);
    }

    pub fn drawing(&self) -> Option<&Canvas> {
        self.drawing.as_ref()
    }

    pub fn label(&self) -> Option<&LabelView> {
        self.label.as_ref()
    }

    /// Classifies the current drawing.
    ///
    /// Absent drawings clear the display. On failure the display keeps its
    /// previous content and the session stays usable.
    pub fn submit<C: DigitClassifier + ?Sized>(&mut self, classifier: &C) -> Result<(), SubmitError> {
        let confidences = classify(classifier, self.drawing.as_ref())?;
        self.label = confidences.map(LabelView::new);

        Ok(())
    }

    pub fn clear(&mut self) {
        self.drawing = None;
        self.label = None;
    }

    pub fn is_clear(&self) -> bool {
        self.drawing.is_none() && self.label.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::tests::FixedClassifier;

    const WHITE: [u8; 4] = [255, 255, 255, 255];

    #[test]
    fn submit_shows_top_three() {
        let classifier = FixedClassifier::default();
        let mut pad = Sketchpad::default();
        pad.draw(Canvas::filled(64, 64, WHITE));

        pad.submit(&classifier).unwrap();

        let label = pad.label().unwrap();
        let top: Vec<_> = label.top.iter().map(|entry| entry.label).collect();
        assert_eq!(top, ["7", "3", "8"]);
        assert_eq!(label.confidences.len(), 10);
    }

    #[test]
    fn submit_without_drawing_clears_display() {
        let classifier = FixedClassifier::default();
        let mut pad = Sketchpad::default();
        pad.draw(Canvas::filled(64, 64, WHITE));
        pad.submit(&classifier).unwrap();

        pad.drawing = None;
        pad.submit(&classifier).unwrap();

        assert!(pad.label().is_none());
        assert_eq!(classifier.calls.get(), 1);
    }

    #[test]
    fn failed_submit_reports_one_message_and_keeps_session() {
        let classifier = FixedClassifier::failing();
        let mut pad = Sketchpad::default();
        pad.draw(Canvas::filled(64, 64, WHITE));

        let err = pad.submit(&classifier).unwrap_err();
        assert_eq!(
            err.message,
            "Processing error: classifier output could not be read: backend went away"
        );
        assert!(pad.label().is_none());

        let classifier = FixedClassifier::default();
        pad.submit(&classifier).unwrap();
        assert!(pad.label().is_some());
    }

    #[test]
    fn clear_always_empties_without_classifying() {
        let classifier = FixedClassifier::default();

        let mut fresh = Sketchpad::default();
        fresh.clear();
        assert!(fresh.is_clear());

        let mut drawn = Sketchpad::with_drawing(Some(Canvas::filled(8, 8, WHITE)));
        drawn.clear();
        assert!(drawn.is_clear());

        let mut classified = Sketchpad::with_drawing(Some(Canvas::filled(8, 8, WHITE)));
        classified.submit(&classifier).unwrap();
        let calls = classifier.calls.get();
        classified.clear();

        assert!(classified.is_clear());
        assert_eq!(classifier.calls.get(), calls);
    }
}
