use clap::Parser;
use digit_sketch::{
    backend::{self, Inference},
    inference::Classifier,
    logging,
    server::{self, InferenceWorker},
};

/// Serves the sketchpad page backed by a trained classifier.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory the training run wrote its artifacts to.
    #[arg(short, long, default_value = "artifacts")]
    artifact_dir: String,
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(short, long, default_value_t = 7860)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::install();
    let args = Args::parse();

    log::info!("Loading trained model from {}", args.artifact_dir);
    let classifier = Classifier::<Inference>::load(&args.artifact_dir, backend::device())?;
    let worker = InferenceWorker::spawn(classifier);

    server::serve(&format!("{}:{}", args.host, args.port), worker).await?;

    Ok(())
}
