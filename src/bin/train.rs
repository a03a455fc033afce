#![recursion_limit = "256"]

use clap::Parser;
use digit_sketch::{
    backend::{self, Training},
    logging,
    training::{self, TrainingConfig},
};

/// Trains the digit classifier on MNIST and writes its artifacts.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory receiving the model, config, metric logs and curves.
    #[arg(short, long, default_value = "artifacts")]
    artifact_dir: String,
    #[arg(short, long, default_value_t = 10)]
    num_epochs: usize,
    #[arg(short, long, default_value_t = 128)]
    batch_size: usize,
    #[arg(long, default_value_t = 4)]
    num_workers: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::install();
    let args = Args::parse();

    let config = TrainingConfig::standard()
        .with_num_epochs(args.num_epochs)
        .with_batch_size(args.batch_size)
        .with_num_workers(args.num_workers)
        .with_seed(args.seed);

    let history = training::train::<Training>(&args.artifact_dir, config, backend::device())?;

    if let (Some(accuracy), Some(loss)) = (history.accuracy.valid.last(), history.loss.valid.last()) {
        log::info!("Final validation accuracy {accuracy:.4}, loss {loss:.4}");
    }

    Ok(())
}
