//! Decode, preprocess, infer and pick the most likely label.
use base64::{engine::general_purpose::STANDARD, Engine};
use common::{imaging, labels::LabelSet};
use image::RgbImage;

use crate::{
    error::PredictError,
    nn::{Array4, InferModel},
};

/// Top label of a single classification.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub index: usize,
    pub confidence: f32,
}

pub struct SignClassifier {
    model: Box<dyn InferModel>,
    labels: LabelSet,
    input_size: u32,
    crop_margin: u32,
}

impl SignClassifier {
    pub fn new(model: Box<dyn InferModel>, labels: LabelSet, input_size: u32) -> Self {
        Self {
            model,
            labels,
            input_size,
            crop_margin: 0,
        }
    }

    /// Remove `crop_margin` pixels from the left and right edge before resizing.
    pub fn with_crop_margin(mut self, crop_margin: u32) -> Self {
        self.crop_margin = crop_margin;
        self
    }

    /// Classify a base64 image, optionally wrapped in a data URI.
    pub fn classify_base64(&self, encoded: &str) -> Result<Prediction, PredictError> {
        let bytes = decode_base64(encoded)?;
        self.classify_bytes(&bytes)
    }

    /// Classify an encoded raster image (PNG, JPEG, ...).
    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<Prediction, PredictError> {
        let image = image::load_from_memory(bytes)?.to_rgb8();
        self.classify_image(&image)
    }

    pub fn classify_image(&self, image: &RgbImage) -> Result<Prediction, PredictError> {
        let scores = self.scores(image)?;
        self.postproc(&scores)
    }

    /// Raw model output for an image.
    pub fn scores(&self, image: &RgbImage) -> Result<Vec<f32>, PredictError> {
        let input = self.preproc(image)?;
        self.model.run(input).map_err(PredictError::Inference)
    }

    fn preproc(&self, image: &RgbImage) -> Result<Array4<f32>, PredictError> {
        let cropped = match self.crop_margin {
            0 => None,
            margin => Some(imaging::crop_side_margins(image, margin).ok_or_else(|| {
                PredictError::ShapeMismatch(format!(
                    "cropping {margin}px from each side of a {}px wide image leaves nothing",
                    image.width()
                ))
            })?),
        };
        let resized = imaging::resize_square(cropped.as_ref().unwrap_or(image), self.input_size);

        Ok(to_tensor(&resized))
    }

    /// Pick the most likely label from raw model output.
    pub fn postproc(&self, scores: &[f32]) -> Result<Prediction, PredictError> {
        if let Some(index) = scores.iter().position(|score| !score.is_finite()) {
            return Err(PredictError::Inference(anyhow::anyhow!(
                "model returned non-finite score {} at index {index}",
                scores[index]
            )));
        }

        let (index, confidence) = argmax(scores)
            .ok_or_else(|| PredictError::ShapeMismatch("model returned no scores".into()))?;

        // The model and the labels file come from separate artifacts
        let label = self.labels.get(index).ok_or(PredictError::LabelIndex {
            index,
            labels: self.labels.len(),
        })?;

        Ok(Prediction {
            label: label.to_owned(),
            index,
            confidence,
        })
    }
}

/// Strip an optional `data:<mime>;base64,` prefix.
pub fn strip_data_uri(encoded: &str) -> &str {
    let encoded = encoded.trim();
    match encoded.starts_with("data:") {
        true => encoded
            .split_once(',')
            .map(|(_, payload)| payload)
            .unwrap_or(""),
        false => encoded,
    }
}

pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, PredictError> {
    let payload: String = strip_data_uri(encoded)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if payload.is_empty() {
        return Err(PredictError::EmptyImage);
    }

    Ok(STANDARD.decode(payload)?)
}

/// NHWC batch of one image with intensities scaled to `[0, 1]`.
pub fn to_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    Array4::from_shape_fn((1, height as usize, width as usize, 3), |(_, y, x, c)| {
        image[(x as _, y as _)][c] as f32 / 255.0
    })
}

/// Index and value of the largest score. The first maximum wins, NaN scores are skipped.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, score)| !score.is_nan())
        .fold(None, |best, (idx, score)| match best {
            Some((_, best_score)) if score <= best_score => best,
            Some(_) | None => Some((idx, score)),
        })
}

#[cfg(test)]
mod test {

    use anyhow::Result;
    use image::Rgb;

    use super::*;

    struct FixedScores(Vec<f32>);

    impl InferModel for FixedScores {
        fn run(&self, input: Array4<f32>) -> Result<Vec<f32>> {
            anyhow::ensure!(input.shape() == [1, 100, 100, 3], "bad input shape");
            Ok(self.0.clone())
        }
    }

    fn fixed_classifier(scores: Vec<f32>, labels: &[&str]) -> SignClassifier {
        let labels = LabelSet::new(labels.iter().map(|l| l.to_string()).collect())
            .expect("labels");
        SignClassifier::new(Box::new(FixedScores(scores)), labels, 100)
    }

    #[test]
    fn test_argmax_first_maximum_wins() {
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), Some((1, 0.4)));
        assert_eq!(argmax(&[0.9]), Some((0, 0.9)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_argmax_skips_nan() {
        assert_eq!(argmax(&[0.2, f32::NAN, 0.1]), Some((0, 0.2)));
        assert_eq!(argmax(&[f32::NAN, 0.1, 0.3]), Some((2, 0.3)));
        assert_eq!(argmax(&[f32::NAN]), None);
    }

    #[test]
    fn test_non_finite_scores_are_rejected() {
        let image = RgbImage::new(100, 100);

        for scores in [vec![0.2, f32::NAN, 0.1], vec![f32::INFINITY, 0.0, 0.0]] {
            let classifier = fixed_classifier(scores, &["A", "B", "C"]);
            assert!(matches!(
                classifier.classify_image(&image),
                Err(PredictError::Inference(_))
            ));
        }
    }

    #[test]
    fn test_strip_data_uri() {
        assert_eq!(strip_data_uri("data:image/jpeg;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_uri("  QUJD\n"), "QUJD");
        assert_eq!(strip_data_uri("data:image/png"), "");
    }

    #[test]
    fn test_decode_base64() {
        assert_eq!(decode_base64("QU\nJD").ok(), Some(b"ABC".to_vec()));
        assert!(matches!(decode_base64("data:,"), Err(PredictError::EmptyImage)));
        assert!(matches!(decode_base64("!!!"), Err(PredictError::Decode(_))));
    }

    #[test]
    fn test_tensor_is_normalized_nhwc() {
        let mut image = RgbImage::from_pixel(4, 2, Rgb([255, 0, 51]));
        image.put_pixel(3, 1, Rgb([0, 255, 0]));

        let tensor = to_tensor(&image);

        assert_eq!(tensor.shape(), &[1, 2, 4, 3]);
        assert_eq!(tensor[[0, 0, 0, 0]], 1.0);
        assert_eq!(tensor[[0, 0, 0, 2]], 0.2);
        assert_eq!(tensor[[0, 1, 3, 1]], 1.0);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_classify_image_of_any_size() -> Result<()> {
        let classifier = fixed_classifier(vec![0.2, 0.7, 0.1], &["A", "B", "C"]);
        let image = RgbImage::from_pixel(640, 480, Rgb([255, 255, 255]));

        let prediction = classifier.classify_image(&image)?;

        assert_eq!(prediction.label, "B");
        assert_eq!(prediction.index, 1);
        assert_eq!(prediction.confidence, 0.7);

        Ok(())
    }

    #[test]
    fn test_index_outside_of_labels() {
        let classifier = fixed_classifier(vec![0.1, 0.1, 0.8], &["A", "B"]);
        let image = RgbImage::new(100, 100);

        assert!(matches!(
            classifier.classify_image(&image),
            Err(PredictError::LabelIndex {
                index: 2,
                labels: 2
            })
        ));
    }

    #[test]
    fn test_empty_model_output() {
        let classifier = fixed_classifier(vec![], &["A"]);
        assert!(matches!(
            classifier.classify_image(&RgbImage::new(100, 100)),
            Err(PredictError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_crop_margin_too_large() {
        let classifier = fixed_classifier(vec![1.0], &["A"]).with_crop_margin(60);
        assert!(matches!(
            classifier.classify_image(&RgbImage::new(100, 100)),
            Err(PredictError::ShapeMismatch(_))
        ));

        let classifier = fixed_classifier(vec![1.0], &["A"]).with_crop_margin(20);
        assert!(classifier.classify_image(&RgbImage::new(100, 100)).is_ok());
    }

    #[test]
    fn test_undecodable_bytes() {
        let classifier = fixed_classifier(vec![1.0], &["A"]);
        assert!(matches!(
            classifier.classify_bytes(b"definitely not an image"),
            Err(PredictError::Decode(_))
        ));
    }
}
