use crate::decision_policy::severity::SeverityClass;
use crate::error::ErrorKind;
use crate::image_classifier::interface::{ImageClassifier, ModelStatus, ProbabilityVector};
use crate::library::logger::interface::Logger;
use crate::normalizer::tensor::InputTensor;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("model loading was already started (currently {status:?})")]
pub struct LoadAlreadyStarted {
    pub status: ModelStatus,
}

enum EngineState {
    Unloaded,
    Loading,
    Ready(Arc<dyn ImageClassifier + Send + Sync>),
    Failed(ErrorKind),
}

impl EngineState {
    fn status(&self) -> ModelStatus {
        match self {
            EngineState::Unloaded => ModelStatus::Unloaded,
            EngineState::Loading => ModelStatus::Loading,
            EngineState::Ready(_) => ModelStatus::Ready,
            EngineState::Failed(error) => ModelStatus::Failed {
                error: error.clone(),
            },
        }
    }
}

struct Shared {
    state: Mutex<EngineState>,
    settled: Condvar,
    /// Set while a forward pass runs, including one whose caller timed out.
    busy: Mutex<bool>,
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        lock(&self.state)
    }

    /// Waits until no pass is running or `deadline` passes. Returns whether
    /// the slot was claimed.
    fn claim(&self, deadline: Instant) -> bool {
        let mut busy = lock(&self.busy);
        while *busy {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            busy = match self.idle.wait_timeout(busy, remaining) {
                Ok((busy, _)) => busy,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        *busy = true;
        true
    }
}

/// Frees the pass slot when the worker finishes, panicked or not.
struct PassSlot(Arc<Shared>);

impl Drop for PassSlot {
    fn drop(&mut self) {
        *lock(&self.0.busy) = false;
        self.0.idle.notify_all();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Owns one model handle and its load lifecycle:
/// `Unloaded → Loading → Ready | Failed`.
///
/// Cloning shares the same handle; separate engines never share a model.
#[derive(Clone)]
pub struct InferenceEngine {
    shared: Arc<Shared>,
    timeout: Duration,
    logger: Arc<dyn Logger + Send + Sync>,
}

impl InferenceEngine {
    pub fn new(timeout: Duration, logger: Arc<dyn Logger + Send + Sync>) -> Self {
        Self::with_state(EngineState::Unloaded, timeout, logger)
    }

    /// An engine whose model is already loaded.
    pub fn ready(
        classifier: Arc<dyn ImageClassifier + Send + Sync>,
        timeout: Duration,
        logger: Arc<dyn Logger + Send + Sync>,
    ) -> Self {
        Self::with_state(EngineState::Ready(classifier), timeout, logger)
    }

    fn with_state(
        state: EngineState,
        timeout: Duration,
        logger: Arc<dyn Logger + Send + Sync>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                settled: Condvar::new(),
                busy: Mutex::new(false),
                idle: Condvar::new(),
            }),
            timeout,
            logger: logger.with_namespace("engine"),
        }
    }

    /// Runs `loader` once on a background thread. The outcome, success or
    /// failure, is visible to every later `classify` call.
    pub fn start_loading<F>(&self, loader: F) -> Result<(), LoadAlreadyStarted>
    where
        F: FnOnce() -> Result<Arc<dyn ImageClassifier + Send + Sync>, ErrorKind> + Send + 'static,
    {
        {
            let mut state = self.shared.lock();
            if !matches!(*state, EngineState::Unloaded) {
                return Err(LoadAlreadyStarted {
                    status: state.status(),
                });
            }
            *state = EngineState::Loading;
        }

        let _ = self.logger.info("Loading model...");
        let shared = Arc::clone(&self.shared);
        let logger = Arc::clone(&self.logger);

        std::thread::spawn(move || {
            let started = Instant::now();
            let loaded = catch_unwind(AssertUnwindSafe(loader))
                .unwrap_or_else(|_| Err(ErrorKind::model_load("model loader panicked")));

            let next = match loaded {
                Ok(classifier) => {
                    let _ = logger.info(&format!(
                        "Model ready after {} ms",
                        started.elapsed().as_millis()
                    ));
                    EngineState::Ready(classifier)
                }
                Err(error) => {
                    let _ = logger.error(&format!("Model failed to load: {}", error));
                    EngineState::Failed(error)
                }
            };

            *shared.lock() = next;
            shared.settled.notify_all();
        });

        Ok(())
    }

    pub fn status(&self) -> ModelStatus {
        self.shared.lock().status()
    }

    /// Blocks until loading has finished or `timeout` passes, whichever is
    /// first, and returns the status at that point.
    pub fn wait_until_settled(&self, timeout: Duration) -> ModelStatus {
        let state = self.shared.lock();
        let (state, _) = match self.shared.settled.wait_timeout_while(state, timeout, |state| {
            matches!(state, EngineState::Unloaded | EngineState::Loading)
        }) {
            Ok(result) => result,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.status()
    }

    /// Runs one forward pass. Fails fast with `ModelNotReady` unless the model
    /// is loaded, and with `InferenceTimeout` when the pass outlives the
    /// configured timeout. The tensor is consumed either way.
    ///
    /// At most one pass runs at a time. A pass abandoned by a timeout keeps
    /// the slot until it returns; a call that cannot get the slot within its
    /// timeout fails with `InferenceError`.
    pub fn classify(&self, tensor: InputTensor) -> Result<ProbabilityVector, ErrorKind> {
        let classifier = match &*self.shared.lock() {
            EngineState::Ready(classifier) => Arc::clone(classifier),
            _ => {
                let _ = self.logger.warn("Classification requested before the model is ready");
                return Err(ErrorKind::ModelNotReady);
            }
        };

        let started = Instant::now();
        let deadline = started + self.timeout;
        if !self.shared.claim(deadline) {
            let error = ErrorKind::inference("previous forward pass is still running");
            let _ = self.logger.error(&format!("Classification failed: {}", error));
            return Err(error);
        }

        let slot = PassSlot(Arc::clone(&self.shared));
        let (sender, receiver) = channel();
        std::thread::spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| classifier.classify(&tensor)))
                .unwrap_or_else(|_| Err(ErrorKind::inference("classifier panicked")));
            drop(tensor);
            drop(slot);
            let _ = sender.send(result);
        });

        let remaining = deadline.saturating_duration_since(Instant::now());
        let result = match receiver.recv_timeout(remaining) {
            Ok(result) => result.and_then(|scores| {
                scores.validate(SeverityClass::COUNT)?;
                Ok(scores)
            }),
            Err(RecvTimeoutError::Timeout) => Err(ErrorKind::InferenceTimeout {
                timeout: self.timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ErrorKind::inference(
                "inference worker exited without a result",
            )),
        };

        match &result {
            Ok(scores) => {
                let _ = self.logger.info(&format!(
                    "Classified in {} ms: {:?}",
                    started.elapsed().as_millis(),
                    scores.as_slice()
                ));
            }
            Err(error) => {
                let _ = self.logger.error(&format!("Classification failed: {}", error));
            }
        }

        result
    }
}
