use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use clap::{Parser, Subcommand};
use common::{labels::LabelSet, IMAGE_SIZE};
use env_logger::TimestampPrecision;
use predict_server::{nn::OnnxModel, pipeline::SignClassifier};
use trainer::{
    dataset::{Dataset, PrepareOptions},
    evaluate::{best, evaluate, keep_best},
};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the number of images per label
    Stats {
        #[clap(default_value = "dataset/asl_alphabet_train")]
        dataset: PathBuf,
    },

    /// Write labels.txt and resized, split and augmented images for the external fit
    Prepare {
        #[clap(default_value = "dataset/asl_alphabet_train")]
        dataset: PathBuf,

        #[clap(default_value = "dataset/prepared")]
        out: PathBuf,

        /// Side length of the square images
        #[clap(long, default_value_t = IMAGE_SIZE)]
        image_size: u32,

        /// Fraction of each class used for validation
        #[clap(long, default_value_t = 0.2)]
        validation_split: f32,

        /// Augmented variants written per training image
        #[clap(long, default_value_t = 1)]
        augment_copies: usize,

        #[clap(long, default_value_t = 42)]
        seed: u64,
    },

    /// Score checkpoints on the validation split and keep the best one
    Evaluate {
        #[clap(default_value = "dataset/asl_alphabet_train")]
        dataset: PathBuf,

        /// Candidate ONNX checkpoints
        #[clap(long = "model", required = true)]
        models: Vec<PathBuf>,

        /// Copy the most accurate checkpoint here, labels.txt is written next to it
        #[clap(long)]
        keep_best: Option<PathBuf>,

        #[clap(long, default_value_t = IMAGE_SIZE)]
        image_size: u32,

        #[clap(long, default_value_t = 0.2)]
        validation_split: f32,
    },

    /// Classify a single image
    Classify {
        image: PathBuf,

        #[clap(long, env = "MODEL_PATH", default_value = "sign_model.onnx")]
        model: PathBuf,

        #[clap(long, env = "LABELS_PATH", default_value = "labels.txt")]
        labels: PathBuf,

        #[clap(long, default_value_t = IMAGE_SIZE)]
        image_size: u32,

        /// Pixels removed from the left and right edge before resizing
        #[clap(long, default_value_t = 0)]
        crop_margin: u32,
    },

    /// Print an image file as a base64 data URI, ready for the predict endpoint
    Encode { image: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    match args.command {
        Command::Stats { dataset } => {
            let dataset = Dataset::scan(&dataset)?;
            for (label, count) in dataset.stats() {
                println!("{label}: {count} images");
            }
        }
        Command::Prepare {
            dataset,
            out,
            image_size,
            validation_split,
            augment_copies,
            seed,
        } => {
            let options = PrepareOptions {
                image_size,
                validation_split,
                augment_copies,
                seed,
            };
            Dataset::scan(&dataset)?.prepare(&out, &options)?;
        }
        Command::Evaluate {
            dataset,
            models,
            keep_best: target,
            image_size,
            validation_split,
        } => {
            let dataset = Dataset::scan(&dataset)?;
            let samples = dataset.split(validation_split).validation;
            if samples.is_empty() {
                bail!("validation split is empty, add images or raise --validation-split");
            }

            let mut evaluations = Vec::with_capacity(models.len());
            for path in models {
                let model = OnnxModel::load(&path, image_size)?;
                let classifier =
                    SignClassifier::new(Box::new(model), dataset.labels().clone(), image_size);
                evaluations.push(evaluate(path, &classifier, &samples)?);
            }

            for evaluation in &evaluations {
                println!(
                    "{}: val_accuracy {:.4}",
                    evaluation.model.display(),
                    evaluation.accuracy()
                );
            }

            if let (Some(best), Some(target)) = (best(&evaluations), target) {
                keep_best(best, dataset.labels(), target)?;
            }
        }
        Command::Classify {
            image: image_path,
            model,
            labels,
            image_size,
            crop_margin,
        } => {
            let labels = LabelSet::load(&labels)
                .with_context(|| format!("failed to load {}", labels.display()))?;
            let model = OnnxModel::load(&model, image_size)?;
            let classifier = SignClassifier::new(Box::new(model), labels, image_size)
                .with_crop_margin(crop_margin);

            let image = image::open(&image_path)
                .with_context(|| format!("failed to open {}", image_path.display()))?
                .to_rgb8();
            let scores = classifier.scores(&image)?;
            let prediction = classifier.postproc(&scores)?;

            println!("Raw prediction: {scores:?}");
            println!("Predicted index: {}", prediction.index);
            println!("Predicted label: {}", prediction.label);
            println!("Confidence: {:.4}", prediction.confidence);
        }
        Command::Encode { image } => {
            let bytes =
                std::fs::read(&image).with_context(|| format!("failed to read {}", image.display()))?;
            let mime = match image.extension().and_then(|e| e.to_str()) {
                Some("png") => "image/png",
                _ => "image/jpeg",
            };
            println!("data:{mime};base64,{}", STANDARD.encode(bytes));
        }
    }

    Ok(())
}
