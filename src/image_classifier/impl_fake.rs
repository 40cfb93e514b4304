use crate::error::ErrorKind;
use crate::image_classifier::interface::{ImageClassifier, ProbabilityVector};
use crate::library::logger::interface::Logger;
use crate::normalizer::tensor::InputTensor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Stand-in model returning a scripted answer.
pub struct ImageClassifierFake {
    logger: Arc<dyn Logger + Send + Sync>,
    outcome: Result<Vec<f32>, ErrorKind>,
    delay: Duration,
    gate: Mutex<Option<Receiver<()>>>,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ImageClassifierFake {
    pub fn new(logger: Arc<dyn Logger + Send + Sync>, scores: Vec<f32>) -> Self {
        Self::with_outcome(logger, Ok(scores))
    }

    pub fn failing(logger: Arc<dyn Logger + Send + Sync>, error: ErrorKind) -> Self {
        Self::with_outcome(logger, Err(error))
    }

    fn with_outcome(
        logger: Arc<dyn Logger + Send + Sync>,
        outcome: Result<Vec<f32>, ErrorKind>,
    ) -> Self {
        Self {
            logger: logger.with_namespace("classifier").with_namespace("fake"),
            outcome,
            delay: Duration::ZERO,
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every call blocks until the returned sender fires once, which keeps a
    /// classification in flight for as long as a test needs.
    pub fn with_gate(self) -> (Self, Sender<()>) {
        let (release, gate) = channel();
        let fake = Self {
            gate: Mutex::new(Some(gate)),
            ..self
        };
        (fake, release)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most calls that were ever running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl ImageClassifier for ImageClassifierFake {
    fn classify(&self, tensor: &InputTensor) -> Result<ProbabilityVector, ErrorKind> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        let _ = self.logger.info(&format!(
            "Classifying {}x{} tensor with fake classifier...",
            tensor.side(),
            tensor.side()
        ));

        if let Ok(gate) = self.gate.lock() {
            if let Some(gate) = gate.as_ref() {
                let _ = gate.recv();
            }
        }

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.outcome.clone().map(ProbabilityVector::new)
    }
}
