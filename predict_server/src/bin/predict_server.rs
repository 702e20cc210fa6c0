//! Sign prediction server binary.
//!
use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use common::{labels::LabelSet, store::DocumentStore, IMAGE_SIZE};
use env_logger::TimestampPrecision;
use predict_server::{nn::OnnxModel, pipeline::SignClassifier, router, PredictService};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address to serve the HTTP endpoints on
    #[clap(long, env = "PREDICT_ADDRESS", default_value = "127.0.0.1:5000")]
    server_address: String,

    /// ONNX model produced by the trainer
    #[clap(long, env = "MODEL_PATH", default_value = "sign_model.onnx")]
    model_path: PathBuf,

    /// Labels file written next to the model, one label per line
    #[clap(long, env = "LABELS_PATH", default_value = "labels.txt")]
    labels_path: PathBuf,

    /// Side length of the square model input
    #[clap(long, default_value_t = IMAGE_SIZE)]
    image_size: u32,

    /// Pixels removed from the left and right edge before resizing
    #[clap(long, env = "CROP_MARGIN", default_value_t = 0)]
    crop_margin: u32,

    /// Document store for prediction records, nothing is stored if unset
    #[clap(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let labels = match args.labels_path.exists() {
        true => LabelSet::load(&args.labels_path)
            .with_context(|| format!("failed to load {}", args.labels_path.display()))?,
        false => {
            log::warn!(
                "{} not found, falling back to the ASL alphabet",
                args.labels_path.display()
            );
            LabelSet::asl_alphabet()
        }
    };
    log::info!("Serving {} labels", labels.len());

    let model = OnnxModel::load(&args.model_path, args.image_size)?;
    let classifier = SignClassifier::new(Box::new(model), labels, args.image_size)
        .with_crop_margin(args.crop_margin);

    let store = match &args.database_url {
        Some(url) => {
            log::info!("Storing predictions in {url}");
            Some(Arc::new(DocumentStore::open(url)?))
        }
        None => None,
    };

    let app = router(Arc::new(PredictService::new(classifier, store)));

    // Serve HTTP server
    let addr: SocketAddr = args.server_address.parse()?;
    log::info!("Listening on {addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
