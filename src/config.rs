use chrono::Offset;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INPUT_SIDE: u32 = 224;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.70;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub input_side: u32,
    pub confidence_threshold: f32,
    pub model_path: PathBuf,
    pub max_upload_bytes: usize,
    pub inference_timeout: Duration,
    pub require_acceleration: bool,
    pub demo_mode: bool,
    pub demo_seed: u64,
    pub logger_timezone: chrono::FixedOffset,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_side: DEFAULT_INPUT_SIDE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            model_path: PathBuf::from("model.onnx"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            inference_timeout: Duration::from_secs(30),
            require_acceleration: false,
            demo_mode: false,
            demo_seed: 0,
            logger_timezone: utc(),
        }
    }
}

/// Recognized keys of the JSON config file. Anything else is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    input_side: Option<u32>,
    confidence_threshold: Option<f32>,
    model_path: Option<PathBuf>,
    max_upload_bytes: Option<usize>,
    inference_timeout_ms: Option<u64>,
    require_acceleration: Option<bool>,
    demo_mode: Option<bool>,
    demo_seed: Option<u64>,
    logger_utc_offset_hours: Option<i32>,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(json)?;
        let mut config = Self::default();

        if let Some(side) = file.input_side {
            config.input_side = side;
        }
        if let Some(threshold) = file.confidence_threshold {
            config.confidence_threshold = threshold;
        }
        if let Some(path) = file.model_path {
            config.model_path = path;
        }
        if let Some(max) = file.max_upload_bytes {
            config.max_upload_bytes = max;
        }
        if let Some(ms) = file.inference_timeout_ms {
            config.inference_timeout = Duration::from_millis(ms);
        }
        if let Some(require) = file.require_acceleration {
            config.require_acceleration = require;
        }
        if let Some(demo) = file.demo_mode {
            config.demo_mode = demo;
        }
        if let Some(seed) = file.demo_seed {
            config.demo_seed = seed;
        }
        if let Some(hours) = file.logger_utc_offset_hours {
            config.logger_timezone = hours
                .checked_mul(3600)
                .and_then(chrono::FixedOffset::east_opt)
                .ok_or(ConfigError::Invalid {
                    key: "loggerUtcOffsetHours",
                    reason: format!("{} is out of range", hours),
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_side == 0 {
            return Err(ConfigError::Invalid {
                key: "inputSide",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid {
                key: "confidenceThreshold",
                reason: format!("{} is outside [0, 1]", self.confidence_threshold),
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "maxUploadBytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.inference_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "inferenceTimeoutMs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn utc() -> chrono::FixedOffset {
    chrono::Utc.fix()
}
