use crate::config::Config;
use crate::decision_policy::ClassificationResult;
use crate::error::ErrorKind;
use crate::image_classifier::engine::InferenceEngine;
use crate::image_classifier::interface::ModelStatus;
use crate::image_source::device_camera::interface::DeviceCamera;
use crate::image_source::raw_image::RawImage;
use crate::library::cancel::CancelToken;
use crate::library::logger::interface::Logger;
use crate::session::core::{
    init, is_stale, transition, Effect, Event, ImageRequest, InvalidTransition, Phase, RequestId,
    State,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// What a caller can observe about the session at one instant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: Phase,
    #[serde(skip)]
    pub image: Option<Arc<RawImage>>,
    pub result: Option<ClassificationResult>,
    pub error: Option<ErrorKind>,
    pub model: ModelStatus,
}

struct Shared {
    state: Mutex<State>,
    changed: Condvar,
    next_request: AtomicU64,
    outcomes: AtomicUsize,
    /// Token of the request currently in flight.
    cancel: Mutex<Option<(RequestId, CancelToken)>>,
    /// Held by a camera worker for its whole capture, so a new capture waits
    /// for an abandoned one to close the device.
    camera_turn: Mutex<()>,
}

/// Owns the session state and runs each effect on its own thread, feeding
/// completions back through the same transition function.
#[derive(Clone)]
pub struct SessionController {
    pub(super) config: Config,
    pub(super) logger: Arc<dyn Logger + Send + Sync>,
    pub(super) device_camera: Arc<dyn DeviceCamera + Send + Sync>,
    pub(super) engine: InferenceEngine,
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        config: Config,
        logger: Arc<dyn Logger + Send + Sync>,
        device_camera: Arc<dyn DeviceCamera + Send + Sync>,
        engine: InferenceEngine,
    ) -> Self {
        let (initial, effects) = init();
        let controller = Self {
            config,
            logger: logger.with_namespace("session"),
            device_camera,
            engine,
            shared: Arc::new(Shared {
                state: Mutex::new(initial),
                changed: Condvar::new(),
                next_request: AtomicU64::new(1),
                outcomes: AtomicUsize::new(0),
                cancel: Mutex::new(None),
                camera_turn: Mutex::new(()),
            }),
        };
        controller.spawn_effects(effects);
        controller
    }

    pub fn capture_from_camera(&self) -> Result<RequestId, InvalidTransition> {
        self.request(ImageRequest::Camera)
    }

    pub fn submit_upload(
        &self,
        bytes: Vec<u8>,
        mime: Option<String>,
    ) -> Result<RequestId, InvalidTransition> {
        self.request(ImageRequest::Upload { bytes, mime })
    }

    /// Back to Idle from any phase. Work already in flight is cancelled where
    /// it can be, otherwise it finishes on its own thread, and either way its
    /// completion is dropped.
    pub fn reset(&self) -> Result<(), InvalidTransition> {
        self.dispatch(Event::Reset)
    }

    pub fn phase(&self) -> Phase {
        self.lock_state().phase()
    }

    pub fn model_status(&self) -> ModelStatus {
        self.engine.status()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock_state();
        self.snapshot_of(&state)
    }

    /// Number of requests that reached Result or Error.
    pub fn outcome_count(&self) -> usize {
        self.shared.outcomes.load(Ordering::SeqCst)
    }

    /// Blocks until `done` holds for the current state or the timeout runs out,
    /// then returns whatever the session looks like.
    pub fn wait_until<F>(&self, timeout: Duration, done: F) -> SessionSnapshot
    where
        F: Fn(&State) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock_state();
        while !done(&state) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = match self.shared.changed.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        self.snapshot_of(&state)
    }

    pub fn wait_until_settled(&self, timeout: Duration) -> SessionSnapshot {
        self.wait_until(timeout, |state| state.phase().is_settled())
    }

    fn request(&self, source: ImageRequest) -> Result<RequestId, InvalidTransition> {
        let request = self.shared.next_request.fetch_add(1, Ordering::SeqCst);
        self.dispatch(Event::AcquireRequested { request, source })?;
        Ok(request)
    }

    pub(super) fn dispatch(&self, event: Event) -> Result<(), InvalidTransition> {
        let effects = {
            let mut state = self.lock_state();

            if is_stale(&state, &event) {
                let _ = self.logger.warn(&format!(
                    "Discarding stale completion while {}: {}",
                    state.phase(),
                    event.to_display_string()
                ));
                return Ok(());
            }

            let _ = self.logger.info(&format!(
                "Processing event: {}",
                event.to_display_string()
            ));

            let (next, effects) = match transition(&self.config, &state, event) {
                Ok(next) => next,
                Err(e) => {
                    let _ = self.logger.error(&format!("Rejected: {}", e));
                    return Err(e);
                }
            };

            self.track_cancellation(&state, &next);

            if next.phase() != state.phase() {
                let _ = self
                    .logger
                    .info(&format!("Phase {} -> {}", state.phase(), next.phase()));
            }
            self.log_outcome(&next);

            *state = next;
            self.shared.changed.notify_all();
            effects
        };

        self.spawn_effects(effects);
        Ok(())
    }

    /// A new in-flight request gets a fresh token; leaving flight cancels it.
    fn track_cancellation(&self, current: &State, next: &State) {
        let mut cancel = lock(&self.shared.cancel);
        match (current.in_flight(), next.in_flight()) {
            (before, Some(request)) if before != Some(request) => {
                *cancel = Some((request, CancelToken::new()));
            }
            (Some(_), None) => {
                if let Some((_, token)) = cancel.take() {
                    token.cancel();
                }
            }
            _ => {}
        }
    }

    /// Token for `request`, already cancelled if the request is no longer the
    /// one in flight.
    pub(super) fn cancel_token(&self, request: RequestId) -> CancelToken {
        match &*lock(&self.shared.cancel) {
            Some((current, token)) if *current == request => token.clone(),
            _ => CancelToken::cancelled(),
        }
    }

    pub(super) fn camera_turn(&self) -> MutexGuard<'_, ()> {
        lock(&self.shared.camera_turn)
    }

    fn log_outcome(&self, next: &State) {
        match next {
            State::Result { result, .. } => {
                self.shared.outcomes.fetch_add(1, Ordering::SeqCst);
                match result {
                    ClassificationResult::Severity(verdict) => {
                        let _ = self.logger.info(&format!(
                            "Severity {} with confidence {:.3}",
                            verdict.severity, verdict.confidence
                        ));
                    }
                    ClassificationResult::Rejected { error } => {
                        let _ = self
                            .logger
                            .warn(&format!("{}. {}", error, error.user_message()));
                    }
                }
            }
            State::Error { error, .. } => {
                self.shared.outcomes.fetch_add(1, Ordering::SeqCst);
                let _ = self.logger.error(&format!("Analysis failed: {}", error));
            }
            _ => {}
        }
    }

    fn spawn_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            let controller = self.clone();
            std::thread::spawn(move || controller.run_effect(effect));
        }
    }

    fn snapshot_of(&self, state: &State) -> SessionSnapshot {
        SessionSnapshot {
            phase: state.phase(),
            image: state.image().cloned(),
            result: state.result().cloned(),
            error: state.error().cloned(),
            model: self.engine.status(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        lock(&self.shared.state)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
