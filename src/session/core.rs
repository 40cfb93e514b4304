use crate::config::Config;
use crate::decision_policy::{decide, ClassificationResult};
use crate::error::ErrorKind;
use crate::image_classifier::interface::ProbabilityVector;
use crate::image_source::raw_image::RawImage;
use crate::normalizer::tensor::InputTensor;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    Acquiring,
    Normalizing,
    Inferring,
    Result,
    Error,
}

impl Phase {
    /// Nothing is in flight.
    pub fn is_settled(&self) -> bool {
        matches!(self, Phase::Idle | Phase::Result | Phase::Error)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Acquiring => "acquiring",
            Phase::Normalizing => "normalizing",
            Phase::Inferring => "inferring",
            Phase::Result => "result",
            Phase::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Camera,
    Upload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageRequest {
    Camera,
    Upload { bytes: Vec<u8>, mime: Option<String> },
}

impl ImageRequest {
    pub fn kind(&self) -> SourceKind {
        match self {
            ImageRequest::Camera => SourceKind::Camera,
            ImageRequest::Upload { .. } => SourceKind::Upload,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Idle,
    Acquiring {
        request: RequestId,
        source: SourceKind,
    },
    Normalizing {
        request: RequestId,
        image: Arc<RawImage>,
    },
    Inferring {
        request: RequestId,
        image: Arc<RawImage>,
    },
    Result {
        image: Arc<RawImage>,
        result: ClassificationResult,
    },
    Error {
        image: Option<Arc<RawImage>>,
        error: ErrorKind,
    },
}

impl State {
    pub fn phase(&self) -> Phase {
        match self {
            State::Idle => Phase::Idle,
            State::Acquiring { .. } => Phase::Acquiring,
            State::Normalizing { .. } => Phase::Normalizing,
            State::Inferring { .. } => Phase::Inferring,
            State::Result { .. } => Phase::Result,
            State::Error { .. } => Phase::Error,
        }
    }

    /// Id of the request currently being worked on, if any.
    pub fn in_flight(&self) -> Option<RequestId> {
        match self {
            State::Acquiring { request, .. }
            | State::Normalizing { request, .. }
            | State::Inferring { request, .. } => Some(*request),
            State::Idle | State::Result { .. } | State::Error { .. } => None,
        }
    }

    pub fn image(&self) -> Option<&Arc<RawImage>> {
        match self {
            State::Normalizing { image, .. }
            | State::Inferring { image, .. }
            | State::Result { image, .. } => Some(image),
            State::Error { image, .. } => image.as_ref(),
            State::Idle | State::Acquiring { .. } => None,
        }
    }

    pub fn result(&self) -> Option<&ClassificationResult> {
        match self {
            State::Result { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorKind> {
        match self {
            State::Error { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum Event {
    AcquireRequested {
        request: RequestId,
        source: ImageRequest,
    },
    ImageAcquired {
        request: RequestId,
        result: Result<RawImage, ErrorKind>,
    },
    ImageNormalized {
        request: RequestId,
        tensor: InputTensor,
    },
    ClassifyDone {
        request: RequestId,
        result: Result<ProbabilityVector, ErrorKind>,
    },
    Reset,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::AcquireRequested { .. } => "AcquireRequested",
            Event::ImageAcquired { .. } => "ImageAcquired",
            Event::ImageNormalized { .. } => "ImageNormalized",
            Event::ClassifyDone { .. } => "ClassifyDone",
            Event::Reset => "Reset",
        }
    }

    /// Request id of a worker completion. Caller-initiated events have none.
    pub fn completion_of(&self) -> Option<RequestId> {
        match self {
            Event::ImageAcquired { request, .. }
            | Event::ImageNormalized { request, .. }
            | Event::ClassifyDone { request, .. } => Some(*request),
            Event::AcquireRequested { .. } | Event::Reset => None,
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Event::AcquireRequested {
                request,
                source: ImageRequest::Upload { bytes, mime },
            } => format!(
                "AcquireRequested {{ request: {}, upload: {} bytes, mime: {:?} }}",
                request,
                bytes.len(),
                mime
            ),
            Event::ImageAcquired {
                request,
                result: Ok(image),
            } => format!(
                "ImageAcquired {{ request: {}, image: {}x{} }}",
                request,
                image.width(),
                image.height()
            ),
            Event::ImageNormalized { request, tensor } => format!(
                "ImageNormalized {{ request: {}, tensor: {:?} }}",
                request,
                tensor.shape()
            ),
            event => format!("{:?}", event),
        }
    }
}

#[derive(Debug)]
pub enum Effect {
    AcquireCameraFrame {
        request: RequestId,
    },
    DecodeUpload {
        request: RequestId,
        bytes: Vec<u8>,
        mime: Option<String>,
    },
    Normalize {
        request: RequestId,
        image: Arc<RawImage>,
    },
    Classify {
        request: RequestId,
        tensor: InputTensor,
    },
}

impl Effect {
    pub fn to_display_string(&self) -> String {
        match self {
            Effect::AcquireCameraFrame { request } => {
                format!("AcquireCameraFrame {{ request: {} }}", request)
            }
            Effect::DecodeUpload {
                request,
                bytes,
                mime,
            } => format!(
                "DecodeUpload {{ request: {}, upload: {} bytes, mime: {:?} }}",
                request,
                bytes.len(),
                mime
            ),
            Effect::Normalize { request, image } => format!(
                "Normalize {{ request: {}, image: {}x{} }}",
                request,
                image.width(),
                image.height()
            ),
            Effect::Classify { request, tensor } => format!(
                "Classify {{ request: {}, tensor: {:?} }}",
                request,
                tensor.shape()
            ),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{event} is not allowed while {phase}")]
pub struct InvalidTransition {
    pub phase: Phase,
    pub event: &'static str,
}

/// A worker completion for a request that is no longer in flight.
pub fn is_stale(state: &State, event: &Event) -> bool {
    match event.completion_of() {
        Some(request) => state.in_flight() != Some(request),
        None => false,
    }
}

pub fn init() -> (State, Vec<Effect>) {
    (State::Idle, vec![])
}

/// The whole session lifecycle as a total function of (state, event).
///
/// Completions for a request that is no longer in flight, because the caller
/// reset in the meantime, leave the state untouched. Every other pair not
/// listed is an `InvalidTransition`.
pub fn transition(
    config: &Config,
    state: &State,
    event: Event,
) -> Result<(State, Vec<Effect>), InvalidTransition> {
    if is_stale(state, &event) {
        return Ok((state.clone(), vec![]));
    }

    match (state, event) {
        (_, Event::Reset) => Ok((State::Idle, vec![])),

        (State::Idle, Event::AcquireRequested { request, source }) => {
            let kind = source.kind();
            let effect = match source {
                ImageRequest::Camera => Effect::AcquireCameraFrame { request },
                ImageRequest::Upload { bytes, mime } => Effect::DecodeUpload {
                    request,
                    bytes,
                    mime,
                },
            };
            Ok((
                State::Acquiring {
                    request,
                    source: kind,
                },
                vec![effect],
            ))
        }

        (State::Acquiring { request, .. }, Event::ImageAcquired { result, .. }) => match result {
            Ok(image) => {
                let image = Arc::new(image);
                Ok((
                    State::Normalizing {
                        request: *request,
                        image: Arc::clone(&image),
                    },
                    vec![Effect::Normalize {
                        request: *request,
                        image,
                    }],
                ))
            }
            Err(error) => Ok((State::Error { image: None, error }, vec![])),
        },

        (State::Normalizing { request, image }, Event::ImageNormalized { tensor, .. }) => Ok((
            State::Inferring {
                request: *request,
                image: Arc::clone(image),
            },
            vec![Effect::Classify {
                request: *request,
                tensor,
            }],
        )),

        (State::Inferring { image, .. }, Event::ClassifyDone { result, .. }) => {
            let image = Arc::clone(image);
            let next = match result {
                Ok(probs) => match decide(&probs, config.confidence_threshold) {
                    ClassificationResult::Rejected { error } if !error.is_low_confidence() => {
                        State::Error {
                            image: Some(image),
                            error,
                        }
                    }
                    result => State::Result { image, result },
                },
                Err(error) => State::Error {
                    image: Some(image),
                    error,
                },
            };
            Ok((next, vec![]))
        }

        (state, event) => Err(InvalidTransition {
            phase: state.phase(),
            event: event.name(),
        }),
    }
}
