use crate::decision_policy::severity::SeverityClass;
use crate::error::ErrorKind;
use crate::image_classifier::interface::{ImageClassifier, ProbabilityVector};
use crate::library::logger::interface::Logger;
use crate::normalizer::tensor::InputTensor;
use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Opt-in demo model for running the pipeline without a model asset.
///
/// Scores are pseudo-random but fully determined by the seed and the tensor
/// contents, so the same image always gets the same answer. The top class
/// always scores in `[0.70, 1.0)`.
pub struct ImageClassifierDemo {
    seed: u64,
    logger: Arc<dyn Logger + Send + Sync>,
}

impl ImageClassifierDemo {
    pub fn new(seed: u64, logger: Arc<dyn Logger + Send + Sync>) -> Self {
        let logger = logger.with_namespace("classifier").with_namespace("demo");
        let _ = logger.warn("Demo mode is on: results are simulated, not diagnoses");
        Self { seed, logger }
    }

    fn seed_for(&self, tensor: &InputTensor) -> u64 {
        // FNV-1a over the tensor bits.
        tensor
            .as_slice()
            .iter()
            .fold(0xcbf2_9ce4_8422_2325 ^ self.seed, |hash, value| {
                (hash ^ value.to_bits() as u64).wrapping_mul(0x0100_0000_01b3)
            })
    }
}

impl ImageClassifier for ImageClassifierDemo {
    fn classify(&self, tensor: &InputTensor) -> Result<ProbabilityVector, ErrorKind> {
        let mut rng = StdRng::seed_from_u64(self.seed_for(tensor));

        let class_dist = Uniform::new(0, SeverityClass::COUNT)
            .map_err(|e| ErrorKind::inference(e.to_string()))?;
        let confidence_dist =
            Uniform::new(0.70f32, 1.0).map_err(|e| ErrorKind::inference(e.to_string()))?;
        let weight_dist =
            Uniform::new(0.0f32, 1.0).map_err(|e| ErrorKind::inference(e.to_string()))?;

        let top = class_dist.sample(&mut rng);
        let confidence = confidence_dist.sample(&mut rng);

        let weights: Vec<f32> = (0..SeverityClass::COUNT)
            .map(|index| {
                if index == top {
                    0.0
                } else {
                    weight_dist.sample(&mut rng)
                }
            })
            .collect();
        let total: f32 = weights.iter().sum();
        let remainder = 1.0 - confidence;

        let scores = weights
            .iter()
            .enumerate()
            .map(|(index, weight)| {
                if index == top {
                    confidence
                } else if total > 0.0 {
                    remainder * weight / total
                } else {
                    0.0
                }
            })
            .collect();

        let _ = self
            .logger
            .info(&format!("Simulated top class {} at {:.3}", top, confidence));

        Ok(ProbabilityVector::new(scores))
    }
}
