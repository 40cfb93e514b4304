use crate::error::ErrorKind;
use crate::normalizer::tensor::InputTensor;
use serde::Serialize;

/// Raw per-class scores in model output order. Scores are independent
/// confidences and need not sum to one.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityVector(Vec<f32>);

impl ProbabilityVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks the vector has `classes` scores, each a finite value in `[0, 1]`.
    pub fn validate(&self, classes: usize) -> Result<(), ErrorKind> {
        if self.0.len() != classes {
            return Err(ErrorKind::inference(format!(
                "model produced {} scores, expected {}",
                self.0.len(),
                classes
            )));
        }
        if let Some((index, score)) = self
            .0
            .iter()
            .enumerate()
            .find(|(_, score)| !(0.0..=1.0).contains(*score))
        {
            return Err(ErrorKind::inference(format!(
                "score {} at index {} is outside [0, 1]",
                score, index
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Ready,
    Failed { error: ErrorKind },
}

impl ModelStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, ModelStatus::Ready | ModelStatus::Failed { .. })
    }
}

/// A loaded model that runs one forward pass per call.
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, tensor: &InputTensor) -> Result<ProbabilityVector, ErrorKind>;
}
