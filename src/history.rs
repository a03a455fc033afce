//! Per-epoch training curves, reconstructed from the learner's metric logs.

use std::path::Path;

use burn::train::{
    logger::{FileMetricLogger, MetricLogger},
    metric::NumericEntry,
};
use serde::{Deserialize, Serialize};
use textplots::{Chart, Plot, Shape};

use crate::error::ArtifactError;

/// Metric name the learner logs accuracy under, in percent.
const ACCURACY: &str = "Accuracy";
/// Metric name the learner logs the loss under.
const LOSS: &str = "Loss";

/// One value per epoch for the training and validation split.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricCurve {
    pub train: Vec<f64>,
    pub valid: Vec<f64>,
}

impl MetricCurve {
    /// Smallest and largest value over both splits.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.train
            .iter()
            .chain(self.valid.iter())
            .copied()
            .filter(|value| value.is_finite())
            .fold(None, |range, value| match range {
                None => Some((value, value)),
                Some((min, max)) => Some((min.min(value), max.max(value))),
            })
    }

    pub fn epochs(&self) -> usize {
        self.train.len().max(self.valid.len())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Fraction of correct predictions, in `[0, 1]`.
    pub accuracy: MetricCurve,
    pub loss: MetricCurve,
}

impl TrainingHistory {
    /// Reads the `train` and `valid` metric logs written under `artifact_dir`.
    ///
    /// Epochs without entries end the curve, so an interrupted run yields the
    /// epochs that did complete.
    pub fn from_metric_logs(artifact_dir: &str, num_epochs: usize) -> Result<Self, ArtifactError> {
        let mut train = FileMetricLogger::new(&format!("{artifact_dir}/train"));
        let mut valid = FileMetricLogger::new(&format!("{artifact_dir}/valid"));

        Ok(Self {
            accuracy: MetricCurve {
                train: read_curve(&mut train, ACCURACY, num_epochs, 0.01)?,
                valid: read_curve(&mut valid, ACCURACY, num_epochs, 0.01)?,
            },
            loss: MetricCurve {
                train: read_curve(&mut train, LOSS, num_epochs, 1.0)?,
                valid: read_curve(&mut valid, LOSS, num_epochs, 1.0)?,
            },
        })
    }

    pub fn epochs(&self) -> usize {
        self.accuracy.epochs().max(self.loss.epochs())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Terminal rendering of both curves, train and validation overlaid.
    pub fn render_text(&self) -> String {
        format!(
            "Accuracy (train, valid)\n{}\nLoss (train, valid)\n{}",
            render_curve(&self.accuracy),
            render_curve(&self.loss)
        )
    }
}

fn read_curve(
    logger: &mut FileMetricLogger,
    name: &str,
    num_epochs: usize,
    scale: f64,
) -> Result<Vec<f64>, ArtifactError> {
    let mut curve = Vec::with_capacity(num_epochs);

    for epoch in 1..=num_epochs {
        let entries = logger
            .read_numeric(name, epoch)
            .map_err(ArtifactError::MetricLog)?;

        match epoch_mean(&entries) {
            Some(value) => curve.push(value * scale),
            None => break,
        }
    }

    Ok(curve)
}

/// Mean over an epoch, weighting aggregated entries by their element count.
pub(crate) fn epoch_mean(entries: &[NumericEntry]) -> Option<f64> {
    let (sum, count) = entries
        .iter()
        .fold((0.0, 0usize), |(sum, count), entry| match entry {
            NumericEntry::Value(value) => (sum + value, count + 1),
            NumericEntry::Aggregated(value, numel) => (sum + value * *numel as f64, count + numel),
        });

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn points(values: &[f64]) -> Vec<(f32, f32)> {
    values
        .iter()
        .enumerate()
        .map(|(epoch, value)| ((epoch + 1) as f32, *value as f32))
        .collect()
}

fn render_curve(curve: &MetricCurve) -> String {
    if curve.range().is_none() {
        return "(no epochs recorded)\n".to_string();
    }

    let epochs = curve.epochs().max(2);
    let train = points(&curve.train);
    let valid = points(&curve.valid);
    let train = Shape::Lines(&train);
    let valid = Shape::Lines(&valid);

    let mut chart = Chart::new(120, 32, 1.0, epochs as f32);
    let chart = chart.lineplot(&train).lineplot(&valid);
    chart.axis();
    chart.figures();
    chart.frame()
}
