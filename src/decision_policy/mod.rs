pub mod severity;

use crate::error::ErrorKind;
use crate::image_classifier::interface::ProbabilityVector;
use serde::Serialize;
use severity::SeverityClass;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityVerdict {
    pub severity: SeverityClass,
    pub confidence: f32,
    pub recommendations: &'static [&'static str],
}

/// Either a verdict or the reason there is none. Never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ClassificationResult {
    Severity(SeverityVerdict),
    Rejected { error: ErrorKind },
}

impl ClassificationResult {
    pub fn rejected(error: ErrorKind) -> Self {
        ClassificationResult::Rejected { error }
    }

    pub fn verdict(&self) -> Option<&SeverityVerdict> {
        match self {
            ClassificationResult::Severity(verdict) => Some(verdict),
            ClassificationResult::Rejected { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorKind> {
        match self {
            ClassificationResult::Severity(_) => None,
            ClassificationResult::Rejected { error } => Some(error),
        }
    }

    /// Confidence as shown on the result card, e.g. `"90.0%"`.
    pub fn confidence_percent(&self) -> Option<String> {
        self.verdict()
            .map(|verdict| format!("{:.1}%", verdict.confidence * 100.0))
    }
}

/// Index and value of the highest score; the first one wins a tie.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((index, score));
        }
    }
    best
}

/// Turns per-class scores into a verdict, or into `LowConfidence` when the top
/// score is under `confidence_threshold`.
pub fn decide(probs: &ProbabilityVector, confidence_threshold: f32) -> ClassificationResult {
    let scores = probs.as_slice();
    if scores.len() != SeverityClass::COUNT {
        return ClassificationResult::rejected(ErrorKind::inference(format!(
            "expected {} class scores, got {}",
            SeverityClass::COUNT,
            scores.len()
        )));
    }

    let Some((max_index, confidence)) = argmax(scores) else {
        return ClassificationResult::rejected(ErrorKind::inference("no class score is a number"));
    };
    if !confidence.is_finite() {
        return ClassificationResult::rejected(ErrorKind::inference(format!(
            "top class score {} is not finite",
            confidence
        )));
    }

    if confidence < confidence_threshold {
        return ClassificationResult::rejected(ErrorKind::LowConfidence {
            confidence,
            threshold: confidence_threshold,
        });
    }

    let Some(severity) = SeverityClass::from_index(max_index) else {
        return ClassificationResult::rejected(ErrorKind::inference(format!(
            "class index {} has no severity",
            max_index
        )));
    };

    ClassificationResult::Severity(SeverityVerdict {
        severity,
        confidence,
        recommendations: severity.recommendations(),
    })
}
