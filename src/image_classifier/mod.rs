pub mod engine;
pub mod impl_demo;
pub mod impl_fake;
pub mod impl_tract_onnx;
pub mod interface;

use crate::config::Config;
use crate::error::ErrorKind;
use crate::library::logger::interface::Logger;
use engine::InferenceEngine;
use impl_demo::ImageClassifierDemo;
use impl_tract_onnx::ImageClassifierTractOnnx;
use interface::ImageClassifier;
use std::sync::Arc;

/// Picks the backend the config asks for. Demo mode must be switched on
/// explicitly; a failed model load never falls back to it.
pub fn load_classifier(
    config: &Config,
    logger: Arc<dyn Logger + Send + Sync>,
) -> Result<Arc<dyn ImageClassifier + Send + Sync>, ErrorKind> {
    if config.demo_mode {
        return Ok(Arc::new(ImageClassifierDemo::new(config.demo_seed, logger)));
    }

    let classifier = ImageClassifierTractOnnx::load(
        &config.model_path,
        config.input_side,
        config.require_acceleration,
        logger,
    )?;
    Ok(Arc::new(classifier))
}

/// Creates an engine and starts loading the configured model in the
/// background.
pub fn start_engine(config: &Config, logger: Arc<dyn Logger + Send + Sync>) -> InferenceEngine {
    let engine = InferenceEngine::new(config.inference_timeout, Arc::clone(&logger));
    let loader_config = config.clone();
    let loader_logger = Arc::clone(&logger);
    if let Err(e) = engine.start_loading(move || load_classifier(&loader_config, loader_logger)) {
        let _ = logger.error(&e.to_string());
    }
    engine
}
