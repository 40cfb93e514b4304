use crate::config::Config;
use crate::decision_policy::{decide, ClassificationResult};
use crate::image_classifier::engine::InferenceEngine;
use crate::image_source::raw_image::RawImage;
use crate::normalizer::normalize;

/// Normalize, classify and decide on the calling thread, without a session.
///
/// Inference faults come back as a rejected result carrying the fault.
pub fn analyze(image: &RawImage, config: &Config, engine: &InferenceEngine) -> ClassificationResult {
    let tensor = normalize(image, config.input_side);
    match engine.classify(tensor) {
        Ok(probs) => decide(&probs, config.confidence_threshold),
        Err(error) => ClassificationResult::rejected(error),
    }
}
