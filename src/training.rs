use std::{path::Path, time::Instant};

use crate::{
    curves::save_training_curves,
    data::{MnistBatch, MnistBatcher},
    error::ArtifactError,
    history::TrainingHistory,
    model::{Model, ModelConfig},
};
use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::vision::MnistDataset},
    nn::loss::CrossEntropyLossConfig,
    optim::AdamConfig,
    prelude::*,
    record::{CompactRecorder, FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::backend::AutodiffBackend,
    train::{
        metric::{AccuracyMetric, LossMetric},
        ClassificationOutput, LearnerBuilder, TrainOutput, TrainStep, ValidStep,
    },
};

/// Trained parameters; the recorder appends its own extension.
pub const MODEL_FILE: &str = "model";
pub const CONFIG_FILE: &str = "config.json";
pub const HISTORY_FILE: &str = "history.json";
pub const CURVES_FILE: &str = "training_curves.png";

/// Recorder for the served model. Parameters are stored at full precision so
/// the loaded model computes exactly what the trained one did.
pub type ModelRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Everything a training run writes into its artifact directory.
const RUN_OUTPUTS: [&str; 9] = [
    CONFIG_FILE,
    "model.mpk",
    HISTORY_FILE,
    CURVES_FILE,
    "experiment.log",
    "train",
    "valid",
    "checkpoint",
    "checkpoints",
];

impl<B: Backend> Model<B> {
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

impl<B: AutodiffBackend> TrainStep<MnistBatch<B>, ClassificationOutput<B>> for Model<B> {
    fn step(&self, batch: MnistBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.targets);

        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<MnistBatch<B>, ClassificationOutput<B>> for Model<B> {
    fn step(&self, batch: MnistBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}

#[derive(Config)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub optimizer: AdamConfig,
    #[config(default = 10)]
    pub num_epochs: usize,
    #[config(default = 128)]
    pub batch_size: usize,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 1.0e-3)]
    pub learning_rate: f64,
}

impl TrainingConfig {
    /// The fixed recipe: default architecture and Adam with a 1e-7 epsilon.
    pub fn standard() -> Self {
        Self::new(ModelConfig::new(), AdamConfig::new().with_epsilon(1e-7))
    }
}

/// Prepares `artifact_dir` for a new run.
///
/// Outputs of a previous run are removed so the learner summary only covers
/// this one. Anything else is left alone, and a non-empty directory without a
/// previous run's config is refused.
pub fn create_artifact_dir(artifact_dir: &str) -> Result<(), ArtifactError> {
    let dir = Path::new(artifact_dir);
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        return Ok(());
    }

    let occupied = std::fs::read_dir(dir)?.next().is_some();
    if occupied && !dir.join(CONFIG_FILE).is_file() {
        return Err(ArtifactError::Occupied(artifact_dir.to_string()));
    }

    for name in RUN_OUTPUTS {
        let path = dir.join(name);
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else if path.is_file() {
            std::fs::remove_file(&path)?;
        }
    }

    Ok(())
}

/// Writes the trained parameters to `<artifact_dir>/model.mpk`.
pub fn save_model<B: Backend>(model: &Model<B>, artifact_dir: &str) -> Result<(), ArtifactError> {
    model
        .clone()
        .save_file(format!("{artifact_dir}/{MODEL_FILE}"), &ModelRecorder::new())?;
    Ok(())
}

/// Trains on the MNIST train split, validating on the test split each epoch.
///
/// Writes the config, the trained model, the metric history and the curve
/// image into `artifact_dir`. Failures inside the learner abort the process.
pub fn train<B: AutodiffBackend>(
    artifact_dir: &str,
    config: TrainingConfig,
    device: B::Device,
) -> Result<TrainingHistory, ArtifactError> {
    create_artifact_dir(artifact_dir)?;
    config.save(format!("{artifact_dir}/{CONFIG_FILE}"))?;

    B::seed(config.seed);

    let batcher = MnistBatcher::default();

    let dataloader_train = DataLoaderBuilder::new(batcher.clone())
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(MnistDataset::train());

    let dataloader_test = DataLoaderBuilder::new(batcher)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(MnistDataset::test());

    let learner = LearnerBuilder::new(artifact_dir)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .devices(vec![device.clone()])
        .num_epochs(config.num_epochs)
        .summary()
        .build(
            config.model.init::<B>(&device),
            config.optimizer.init(),
            config.learning_rate,
        );

    log::info!(
        "Training for {} epochs, batch size {}",
        config.num_epochs,
        config.batch_size
    );
    let now = Instant::now();
    let model_trained = learner.fit(dataloader_train, dataloader_test);
    let elapsed = now.elapsed().as_secs();
    log::info!("Training completed in {}m{}s", elapsed / 60, elapsed % 60);

    save_model(&model_trained, artifact_dir)?;
    log::info!("Model saved to {artifact_dir}/{MODEL_FILE}");

    let history = TrainingHistory::from_metric_logs(artifact_dir, config.num_epochs)?;
    history.save(format!("{artifact_dir}/{HISTORY_FILE}"))?;
    log::info!("Training curves\n{}", history.render_text());

    save_training_curves(&history, format!("{artifact_dir}/{CURVES_FILE}"))?;
    log::info!("Training curves saved to {artifact_dir}/{CURVES_FILE}");

    Ok(history)
}
