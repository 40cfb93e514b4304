use serde::Serialize;
use std::time::Duration;

/// Every way a single-image analysis can end without a severity verdict.
///
/// Values are cheap to clone so the session can keep the kind that ended a
/// request while also handing it to the caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ErrorKind {
    #[error("no capture device is available")]
    DeviceUnavailable,

    #[error("camera permission was denied")]
    PermissionDenied,

    #[error("capture device is already in use")]
    DeviceBusy,

    #[error("unsupported image format: {reason}")]
    UnsupportedFormat { reason: String },

    #[error("file is {size} bytes, limit is {max} bytes")]
    FileTooLarge { size: usize, max: usize },

    #[error("model failed to load: {reason}")]
    ModelLoadError { reason: String },

    #[error("model is not ready")]
    ModelNotReady,

    #[error("inference failed: {reason}")]
    InferenceError { reason: String },

    #[error("inference did not finish within {timeout:?}")]
    InferenceTimeout {
        #[serde(serialize_with = "serialize_millis")]
        timeout: Duration,
    },

    #[error("confidence {confidence:.3} is below threshold {threshold:.3}")]
    LowConfidence { confidence: f32, threshold: f32 },

    #[error("request was cancelled")]
    Cancelled,
}

impl ErrorKind {
    pub fn unsupported_format(reason: impl Into<String>) -> Self {
        ErrorKind::UnsupportedFormat {
            reason: reason.into(),
        }
    }

    pub fn model_load(reason: impl Into<String>) -> Self {
        ErrorKind::ModelLoadError {
            reason: reason.into(),
        }
    }

    pub fn inference(reason: impl Into<String>) -> Self {
        ErrorKind::InferenceError {
            reason: reason.into(),
        }
    }

    /// A deliberate non-answer from the decision policy rather than a fault.
    pub fn is_low_confidence(&self) -> bool {
        matches!(self, ErrorKind::LowConfidence { .. })
    }

    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            ErrorKind::DeviceUnavailable | ErrorKind::PermissionDenied | ErrorKind::DeviceBusy
        )
    }

    pub fn is_decoding(&self) -> bool {
        matches!(
            self,
            ErrorKind::UnsupportedFormat { .. } | ErrorKind::FileTooLarge { .. }
        )
    }

    pub fn is_inference(&self) -> bool {
        matches!(
            self,
            ErrorKind::ModelLoadError { .. }
                | ErrorKind::ModelNotReady
                | ErrorKind::InferenceError { .. }
                | ErrorKind::InferenceTimeout { .. }
        )
    }

    /// Message suitable for showing to the person holding the camera.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::DeviceUnavailable => "No camera was found on this device.",
            ErrorKind::PermissionDenied => "Camera access denied. Please allow camera permission.",
            ErrorKind::DeviceBusy => "The camera is being used by another application.",
            ErrorKind::UnsupportedFormat { .. } => "Only image files are allowed.",
            ErrorKind::FileTooLarge { .. } => "File size must be under 5MB.",
            ErrorKind::ModelLoadError { .. } => {
                "Failed to load the AI model. Please check if model files are correctly placed."
            }
            ErrorKind::ModelNotReady => "The AI model is still loading. Please wait.",
            ErrorKind::InferenceError { .. } | ErrorKind::InferenceTimeout { .. } => {
                "Analysis failed. Please try again."
            }
            ErrorKind::LowConfidence { .. } => "Please try again with a clearer image.",
            ErrorKind::Cancelled => "The analysis was cancelled.",
        }
    }
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_confidence_is_not_an_inference_failure() {
        let low = ErrorKind::LowConfidence {
            confidence: 0.65,
            threshold: 0.7,
        };
        assert!(low.is_low_confidence());
        assert!(!low.is_inference());

        let failed = ErrorKind::inference("bad shape");
        assert!(failed.is_inference());
        assert!(!failed.is_low_confidence());
        assert_ne!(low.user_message(), failed.user_message());
    }

    #[test]
    fn test_families() {
        assert!(ErrorKind::DeviceBusy.is_acquisition());
        assert!(ErrorKind::FileTooLarge { size: 10, max: 5 }.is_decoding());
        assert!(ErrorKind::InferenceTimeout {
            timeout: Duration::from_secs(1)
        }
        .is_inference());
        assert!(!ErrorKind::ModelNotReady.is_acquisition());
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let json = serde_json::to_value(ErrorKind::FileTooLarge { size: 10, max: 5 }).unwrap();
        assert_eq!(json["kind"], "fileTooLarge");
        assert_eq!(json["size"], 10);

        let json = serde_json::to_value(ErrorKind::InferenceTimeout {
            timeout: Duration::from_millis(1500),
        })
        .unwrap();
        assert_eq!(json["timeout"], 1500);
    }
}
