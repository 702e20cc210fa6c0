//! Checkpoint evaluation over the validation split.
use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use common::labels::LabelSet;
use predict_server::pipeline::SignClassifier;

use crate::dataset::{Sample, LABELS_FILE};

#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub model: PathBuf,
    pub correct: usize,
    pub total: usize,
}

impl Evaluation {
    pub fn accuracy(&self) -> f32 {
        match self.total {
            0 => 0.0,
            total => self.correct as f32 / total as f32,
        }
    }
}

/// Classify every sample with the same preprocessing as the prediction service.
pub fn evaluate(
    model: impl Into<PathBuf>,
    classifier: &SignClassifier,
    samples: &[Sample],
) -> Result<Evaluation> {
    let model = model.into();
    let mut correct = 0;

    for sample in samples {
        let image = image::open(&sample.path)
            .with_context(|| format!("failed to open {}", sample.path.display()))?
            .to_rgb8();
        let prediction = classifier
            .classify_image(&image)
            .with_context(|| format!("failed to classify {}", sample.path.display()))?;
        if prediction.index == sample.class {
            correct += 1;
        }
    }

    let evaluation = Evaluation {
        model,
        correct,
        total: samples.len(),
    };
    log::info!(
        "{}: {}/{} correct, accuracy {:.4}",
        evaluation.model.display(),
        evaluation.correct,
        evaluation.total,
        evaluation.accuracy()
    );

    Ok(evaluation)
}

/// Highest validation accuracy. The earlier candidate wins ties.
pub fn best(evaluations: &[Evaluation]) -> Option<&Evaluation> {
    evaluations.iter().fold(None, |best, candidate| match best {
        Some(best) if candidate.accuracy() <= best.accuracy() => Some(best),
        Some(_) | None => Some(candidate),
    })
}

/// Copy the checkpoint to `target` and write the labels file next to it.
pub fn keep_best(
    evaluation: &Evaluation,
    labels: &LabelSet,
    target: impl AsRef<Path>,
) -> Result<PathBuf> {
    let target = target.as_ref();
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(&evaluation.model, target).with_context(|| {
        format!(
            "failed to copy {} to {}",
            evaluation.model.display(),
            target.display()
        )
    })?;

    let labels_path = target.with_file_name(LABELS_FILE);
    labels.save(&labels_path)?;

    log::info!(
        "Kept {} (accuracy {:.4}) as {}",
        evaluation.model.display(),
        evaluation.accuracy(),
        target.display()
    );

    Ok(labels_path)
}
