use crate::error::ErrorKind;
use crate::image_classifier::interface::{ImageClassifier, ProbabilityVector};
use crate::library::logger::interface::Logger;
use crate::normalizer::tensor::InputTensor;
use std::path::Path;
use std::sync::Arc;
use tract_onnx::prelude::*;

pub struct ImageClassifierTractOnnx {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>,
    side: u32,
    logger: Arc<dyn Logger + Send + Sync>,
}

impl ImageClassifierTractOnnx {
    /// Loads and optimizes an ONNX graph taking a `[1, side, side, 3]` f32
    /// input. All-or-nothing: any failure leaves no partial model behind.
    ///
    /// tract executes on the CPU, so `require_acceleration` turns into a load
    /// failure rather than a quiet CPU fallback.
    pub fn load(
        model_path: &Path,
        side: u32,
        require_acceleration: bool,
        logger: Arc<dyn Logger + Send + Sync>,
    ) -> Result<Self, ErrorKind> {
        let logger = logger.with_namespace("tract");

        if require_acceleration {
            return Err(ErrorKind::model_load(
                "hardware acceleration is required but this runtime only executes on the CPU",
            ));
        }

        if !model_path.is_file() {
            return Err(ErrorKind::model_load(format!(
                "model asset {} does not exist",
                model_path.display()
            )));
        }

        let _ = logger.info(&format!("Loading model from {}", model_path.display()));

        let side_len = side as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|model| {
                model.with_input_fact(0, f32::fact([1, side_len, side_len, 3]).into())
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| ErrorKind::model_load(format!("{:#}", e)))?;

        let _ = logger.info("Model loaded");

        Ok(Self {
            model,
            side,
            logger,
        })
    }
}

impl ImageClassifier for ImageClassifierTractOnnx {
    fn classify(&self, tensor: &InputTensor) -> Result<ProbabilityVector, ErrorKind> {
        if tensor.side() != self.side {
            return Err(ErrorKind::inference(format!(
                "tensor side {} does not match model input side {}",
                tensor.side(),
                self.side
            )));
        }

        let [batch, height, width, channels] = tensor.shape();
        let input: Tensor = tract_ndarray::Array4::from_shape_vec(
            (batch, height, width, channels),
            tensor.as_slice().to_vec(),
        )
        .map_err(|e| ErrorKind::inference(e.to_string()))?
        .into();

        // Intermediate values live inside `outputs` and are freed when it
        // goes out of scope on every path.
        let outputs = self
            .model
            .run(tvec!(input.into_tvalue()))
            .map_err(|e| {
                let _ = self.logger.error(&format!("Forward pass failed: {:#}", e));
                ErrorKind::inference(format!("{:#}", e))
            })?;

        let output = outputs
            .first()
            .ok_or_else(|| ErrorKind::inference("model produced no outputs"))?;
        let scores = output
            .to_array_view::<f32>()
            .map_err(|e| ErrorKind::inference(format!("{:#}", e)))?
            .iter()
            .copied()
            .collect();

        Ok(ProbabilityVector::new(scores))
    }
}
