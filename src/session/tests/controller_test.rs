use crate::config::Config;
use crate::decision_policy::severity::SeverityClass;
use crate::error::ErrorKind;
use crate::image_classifier::engine::InferenceEngine;
use crate::image_classifier::interface::ModelStatus;
use crate::image_source::device_camera::impl_fake::{CameraBehavior, DeviceCameraFake};
use crate::library::logger::impl_fake::LoggerFake;
use crate::library::logger::interface::Level;
use crate::session::controller::SessionController;
use crate::session::core::{Phase, State};
use crate::session::tests::fixture::{gray_frame, png_bytes, Fixture, CONFIDENT, SETTLE, UNSURE};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + SETTLE;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn wait_for_phase(f: &Fixture, phase: Phase) {
    let snapshot = f.session.wait_until(SETTLE, |state| state.phase() == phase);
    assert_eq!(snapshot.phase, phase);
}

#[test]
fn test_upload_end_to_end() {
    let f = Fixture::new(&CONFIDENT);

    f.session
        .submit_upload(png_bytes(224, 224), Some("image/png".to_string()))
        .unwrap();
    let snapshot = f.session.wait_until_settled(SETTLE);

    assert_eq!(snapshot.phase, Phase::Result);
    let result = snapshot.result.unwrap();
    let verdict = result.verdict().unwrap();
    assert_eq!(verdict.severity, SeverityClass::ExtremelyMild);
    assert_eq!(verdict.confidence, 0.9);
    assert_eq!(
        verdict.recommendations,
        SeverityClass::ExtremelyMild.recommendations()
    );
    assert_eq!(result.confidence_percent().as_deref(), Some("90.0%"));
    assert_eq!(snapshot.image.unwrap().width(), 224);
    assert_eq!(f.image_classifier.calls(), 1);
}

#[test]
fn test_camera_end_to_end_releases_device() {
    let f = Fixture::new(&CONFIDENT);

    f.session.capture_from_camera().unwrap();
    let snapshot = f.session.wait_until_settled(SETTLE);

    assert_eq!(snapshot.phase, Phase::Result);
    assert_eq!(snapshot.image.unwrap().height(), 480);
    assert!(!f.device_camera.is_held());
    assert_eq!(f.device_camera.open_count(), 1);
    assert_eq!(f.device_camera.close_count(), 1);
}

#[test]
fn test_permission_denied_holds_no_device() {
    let f = Fixture::new(&CONFIDENT);
    f.device_camera
        .set_behavior(CameraBehavior::FailOpen(ErrorKind::PermissionDenied));

    f.session.capture_from_camera().unwrap();
    let snapshot = f.session.wait_until_settled(SETTLE);

    assert_eq!(snapshot.phase, Phase::Error);
    assert_eq!(snapshot.error, Some(ErrorKind::PermissionDenied));
    assert!(snapshot.image.is_none());
    assert!(!f.device_camera.is_held());
    assert_eq!(f.image_classifier.calls(), 0);
}

#[test]
fn test_failed_grab_still_releases_device() {
    let f = Fixture::new(&CONFIDENT);
    f.device_camera
        .set_behavior(CameraBehavior::FailGrab(ErrorKind::DeviceUnavailable));

    f.session.capture_from_camera().unwrap();
    let snapshot = f.session.wait_until_settled(SETTLE);

    assert_eq!(snapshot.error, Some(ErrorKind::DeviceUnavailable));
    assert!(!f.device_camera.is_held());
    assert_eq!(f.device_camera.close_count(), 1);
}

#[test]
fn test_second_request_while_inferring_is_rejected() {
    let f = Fixture::gated(&CONFIDENT);

    f.session
        .submit_upload(png_bytes(64, 64), Some("image/png".to_string()))
        .unwrap();
    wait_for_phase(&f, Phase::Inferring);

    let rejected = f.session.capture_from_camera().unwrap_err();
    assert_eq!(rejected.phase, Phase::Inferring);
    assert!(f
        .session
        .submit_upload(png_bytes(64, 64), None)
        .is_err());
    assert_eq!(f.session.phase(), Phase::Inferring);

    f.release_classification();
    let snapshot = f.session.wait_until_settled(SETTLE);

    assert_eq!(snapshot.phase, Phase::Result);
    assert_eq!(f.session.outcome_count(), 1);
    assert_eq!(f.image_classifier.calls(), 1);
    assert_eq!(f.device_camera.open_count(), 0);
}

#[test]
fn test_reset_mid_flight_discards_late_result() {
    let f = Fixture::gated(&CONFIDENT);

    f.session.submit_upload(png_bytes(64, 64), None).unwrap();
    wait_for_phase(&f, Phase::Inferring);

    f.session.reset().unwrap();
    assert_eq!(f.session.phase(), Phase::Idle);

    f.release_classification();
    assert!(eventually(|| f
        .logger
        .messages_at(Level::Warn)
        .iter()
        .any(|m| m.starts_with("Discarding stale completion"))));

    assert_eq!(f.session.phase(), Phase::Idle);
    assert_eq!(f.session.outcome_count(), 0);
}

#[test]
fn test_new_request_after_reset_is_not_confused_with_old_one() {
    let f = Fixture::gated(&CONFIDENT);

    let first = f.session.submit_upload(png_bytes(64, 64), None).unwrap();
    wait_for_phase(&f, Phase::Inferring);
    f.session.reset().unwrap();

    let second = f.session.submit_upload(png_bytes(32, 32), None).unwrap();
    assert_ne!(first, second);
    wait_for_phase(&f, Phase::Inferring);

    f.release_classification();
    f.release_classification();
    let snapshot = f.session.wait_until_settled(SETTLE);

    assert_eq!(snapshot.phase, Phase::Result);
    assert_eq!(snapshot.image.unwrap().width(), 32);
    assert!(eventually(|| f.image_classifier.calls() == 2));
    assert_eq!(f.session.outcome_count(), 1);
}

#[test]
fn test_low_confidence_is_logged_as_warning() {
    let f = Fixture::new(&UNSURE);

    f.session.submit_upload(png_bytes(64, 64), None).unwrap();
    let snapshot = f.session.wait_until_settled(SETTLE);

    assert_eq!(snapshot.phase, Phase::Result);
    assert!(snapshot.error.is_none());
    assert!(snapshot
        .result
        .and_then(|r| r.error().cloned())
        .is_some_and(|e| e.is_low_confidence()));
    assert!(f
        .logger
        .messages_at(Level::Warn)
        .iter()
        .any(|m| m.contains("clearer image")));
    assert!(f.logger.messages_at(Level::Error).is_empty());
}

#[test]
fn test_unsupported_upload_goes_to_error() {
    let f = Fixture::new(&CONFIDENT);

    f.session
        .submit_upload(b"GIF89a not really".to_vec(), Some("image/gif".to_string()))
        .unwrap();
    let snapshot = f.session.wait_until_settled(SETTLE);

    assert!(matches!(
        snapshot.error,
        Some(ErrorKind::UnsupportedFormat { .. })
    ));
    assert_eq!(f.image_classifier.calls(), 0);
}

#[test]
fn test_model_not_ready_fails_fast() {
    let logger = LoggerFake::new();
    let config = Config::default();
    let camera = Arc::new(DeviceCameraFake::new(
        Arc::new(logger.clone()),
        CameraBehavior::Frame(gray_frame(32, 32)),
    ));
    let engine = InferenceEngine::new(config.inference_timeout, Arc::new(logger.clone()));
    let session = SessionController::new(config, Arc::new(logger.clone()), camera, engine);

    session.capture_from_camera().unwrap();
    let snapshot = session.wait_until_settled(SETTLE);

    assert_eq!(snapshot.error, Some(ErrorKind::ModelNotReady));
    assert_eq!(snapshot.model, ModelStatus::Unloaded);
}

#[test]
fn test_reset_from_idle_and_error() {
    let f = Fixture::new(&CONFIDENT);
    f.session.reset().unwrap();
    assert_eq!(f.session.phase(), Phase::Idle);

    f.device_camera
        .set_behavior(CameraBehavior::FailOpen(ErrorKind::DeviceBusy));
    f.session.capture_from_camera().unwrap();
    assert_eq!(f.session.wait_until_settled(SETTLE).phase, Phase::Error);

    assert!(f.session.capture_from_camera().is_err());
    f.session.reset().unwrap();
    assert!(matches!(
        f.session.wait_until(SETTLE, |s| *s == State::Idle).phase,
        Phase::Idle
    ));
}

#[test]
fn test_snapshot_serializes_for_callers() {
    let f = Fixture::new(&CONFIDENT);

    f.session.submit_upload(png_bytes(64, 64), None).unwrap();
    let snapshot = f.session.wait_until_settled(SETTLE);
    let json = serde_json::to_value(&snapshot).unwrap();

    assert_eq!(json["phase"], "result");
    assert_eq!(json["result"]["status"], "severity");
    assert_eq!(json["result"]["severity"], "extremelyMild");
    assert_eq!(json["model"]["state"], "ready");
    assert!(json.get("image").is_none());
}

#[test]
fn test_reset_mid_capture_then_recapture_succeeds() {
    let f = Fixture::slow_camera(&CONFIDENT, Duration::from_millis(300));

    let first = f.session.capture_from_camera().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    f.session.reset().unwrap();

    let second = f.session.capture_from_camera().unwrap();
    assert_ne!(first, second);
    let snapshot = f.session.wait_until_settled(SETTLE);

    assert_eq!(snapshot.phase, Phase::Result, "{:?}", snapshot.error);
    assert!(snapshot.result.unwrap().verdict().is_some());
    assert!(eventually(|| !f.device_camera.is_held()));
    assert_eq!(f.device_camera.open_count(), 2);
    assert_eq!(f.device_camera.close_count(), 2);
    assert!(f
        .logger
        .messages_at(Level::Warn)
        .iter()
        .any(|m| m.starts_with("Discarding stale completion")));
    assert_eq!(f.session.outcome_count(), 1);
}

#[test]
fn test_timed_out_passes_never_overlap() {
    let f = Fixture::slow_classifier(
        &CONFIDENT,
        Duration::from_millis(400),
        Duration::from_millis(50),
    );

    for _ in 0..3 {
        f.session
            .submit_upload(png_bytes(64, 64), Some("image/png".to_string()))
            .unwrap();
        let snapshot = f.session.wait_until_settled(SETTLE);
        assert_eq!(snapshot.phase, Phase::Error);
        assert!(snapshot.error.unwrap().is_inference());
        f.session.reset().unwrap();
    }

    std::thread::sleep(Duration::from_millis(500));
    assert!(f.image_classifier.calls() >= 1);
    assert_eq!(f.image_classifier.peak_concurrency(), 1);
}
