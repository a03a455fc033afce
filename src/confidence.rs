use core::cmp::Ordering;

use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::NUM_CLASSES;

/// Labels of the digit classes, in output index order.
pub const LABELS: [&str; NUM_CLASSES] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];

/// One label and the probability the classifier assigned to it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabelConfidence {
    pub label: &'static str,
    pub confidence: f32,
}

/// Probabilities for the ten digit labels, produced jointly by one forward pass.
///
/// The values are kept exactly as the classifier returned them; the map does
/// not renormalize and cannot be edited after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfidenceMap {
    probabilities: [f32; NUM_CLASSES],
}

impl ConfidenceMap {
    pub fn new(probabilities: [f32; NUM_CLASSES]) -> Self {
        Self { probabilities }
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        LABELS
            .into_iter()
            .position(|candidate| candidate == label)
            .map(|index| self.probabilities[index])
    }

    pub fn probabilities(&self) -> &[f32; NUM_CLASSES] {
        &self.probabilities
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Entries in label order.
    pub fn iter(&self) -> impl Iterator<Item = LabelConfidence> + '_ {
        LABELS
            .into_iter()
            .zip(self.probabilities.iter())
            .map(|(label, confidence)| LabelConfidence {
                label,
                confidence: *confidence,
            })
    }

    /// Sum of all probabilities; close to one for a softmax output.
    pub fn total(&self) -> f32 {
        self.probabilities.iter().sum()
    }

    /// The `k` most likely labels, highest first. Ties keep label order.
    pub fn top_k(&self, k: usize) -> Vec<LabelConfidence> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        entries.truncate(k);
        entries
    }

    /// The most likely label.
    pub fn best(&self) -> LabelConfidence {
        self.top_k(1)
            .pop()
            .unwrap_or_else(|| LabelConfidence {
                label: LABELS[0],
                confidence: self.probabilities[0],
            })
    }
}

impl Serialize for ConfidenceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(NUM_CLASSES))?;
        for entry in self.iter() {
            map.serialize_entry(entry.label, &entry.confidence)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConfidenceMap {
        ConfidenceMap::new([0.01, 0.02, 0.05, 0.1, 0.02, 0.0, 0.1, 0.6, 0.05, 0.05])
    }

    #[test]
    fn labels_are_keyed_in_index_order() {
        let map = sample();

        assert_eq!(map.len(), 10);
        assert_eq!(map.get("7"), Some(0.6));
        assert_eq!(map.get("0"), Some(0.01));
        assert_eq!(map.get("10"), None);

        let labels: Vec<_> = map.iter().map(|entry| entry.label).collect();
        assert_eq!(labels, LABELS);
    }

    #[test]
    fn top_three_ranks_highest_first() {
        let top = sample().top_k(3);

        let labels: Vec<_> = top.iter().map(|entry| entry.label).collect();
        // "3" and "6" tie; label order breaks the tie.
        assert_eq!(labels, ["7", "3", "6"]);
        assert_eq!(sample().best().label, "7");
    }

    #[test]
    fn serializes_as_label_object() {
        let json = serde_json::to_value(sample()).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object.len(), 10);
        assert!((object["7"].as_f64().unwrap() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn total_sums_probabilities() {
        assert!((sample().total() - 1.0).abs() < 1e-6);
    }
}
