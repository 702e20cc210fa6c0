use std::path::Path;

use anyhow::{anyhow, Result};
use tract_onnx::prelude::*;

pub use tract_onnx::prelude::tract_ndarray::Array4;

type NnModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Image classifier taking a `[1, size, size, 3]` batch of RGB values in `[0, 1]`.
pub trait InferModel: Send + Sync {
    /// Run the forward pass and return one score per class.
    fn run(&self, input: Array4<f32>) -> Result<Vec<f32>>;
}

/// Convolutional sign classifier exported to ONNX.
pub struct OnnxModel {
    model: NnModel,
}

impl OnnxModel {
    pub fn load(path: impl AsRef<Path>, input_size: u32) -> Result<Self> {
        let path = path.as_ref();
        let side = input_size as usize;
        let input_fact = InferenceFact::dt_shape(f32::datum_type(), tvec!(1, side, side, 3));
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| anyhow!("failed to read model {}: {e}", path.display()))?
            .with_input_fact(0, input_fact)?
            .into_optimized()?
            .into_runnable()?;

        log::info!("Loaded model {}", path.display());

        Ok(Self { model })
    }
}

impl InferModel for OnnxModel {
    fn run(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let input: Tensor = input.into();
        let raw_nn_out = self.model.run(tvec!(input.into()))?;

        let scores = raw_nn_out
            .first()
            .ok_or_else(|| anyhow!("model produced no output"))?
            .to_array_view::<f32>()?
            .iter()
            .copied()
            .collect();

        Ok(scores)
    }
}
