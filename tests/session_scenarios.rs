//! Acquisition session scenarios
//!
//! Each scripted frame is a 2x4 Mono8 patch whose saturated Laplacian
//! variance is known exactly, so the reported levels can be checked against
//! literal values.

use crabfocus::acquisition::{
    CancelToken, FocusSession, LoopState, ReportEvent, SessionConfig, StopReason,
};
use crabfocus::errors::{FocusError, TransportErrorKind};
use crabfocus::focus::{RoiPlacement, RoiSpec};
use crabfocus::testing::{CollectingReporter, RecordingDisplay, ScriptedOutcome, ScriptedSource};
use crabfocus::types::{Frame, PixelFormat};
use std::time::Duration;

fn patch(pixels: [u8; 8]) -> Frame {
    Frame::new(2, 4, PixelFormat::Mono8, pixels.to_vec()).unwrap()
}

/// A frame scoring `level` under the default saturated response.
fn frame_with_level(level: f64) -> Frame {
    let pixels = match level as u32 {
        12 => [0, 0, 0, 0, 3, 7, 0, 2],
        20 => [0, 0, 0, 0, 0, 1, 0, 7],
        31 => [0, 0, 0, 0, 0, 0, 0, 8],
        40 => [0, 0, 0, 0, 0, 7, 3, 2],
        55 => [0, 0, 0, 3, 0, 4, 8, 1],
        _ => panic!("no patch for level {}", level),
    };
    patch(pixels)
}

fn config(frame_budget: u64) -> SessionConfig {
    SessionConfig::default()
        .with_frame_budget(frame_budget)
        .with_retrieve_timeout(Duration::from_millis(50))
        .with_roi(RoiSpec::new(
            2,
            4,
            RoiPlacement::Fixed {
                offset_x: 0,
                offset_y: 0,
            },
        ))
}

fn assert_levels(actual: &[(f64, f64)], expected: &[(f64, f64)]) {
    assert_eq!(actual.len(), expected.len(), "{:?}", actual);
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            (a.0 - e.0).abs() < 1e-9 && (a.1 - e.1).abs() < 1e-9,
            "got {:?}, want {:?}",
            actual,
            expected
        );
    }
}

#[test]
fn test_patches_score_their_levels() {
    let meter = config(1).meter();
    for level in [12.5, 20.0, 31.0, 40.0, 55.0] {
        let measured = meter.measure(&frame_with_level(level)).unwrap().level;
        assert!((measured - level).abs() < 1e-9, "{} vs {}", measured, level);
    }
}

#[test]
fn test_best_tracks_running_maximum() {
    let source = ScriptedSource::new(vec![
        frame_with_level(12.5),
        frame_with_level(40.0),
        frame_with_level(31.0),
    ]);
    let mut session = FocusSession::new(source, CollectingReporter::new(), config(3));

    let summary = session.run().unwrap();

    assert_levels(
        &session.reporter().levels(),
        &[(12.5, 12.5), (40.0, 40.0), (31.0, 40.0)],
    );
    assert_eq!(summary.stop_reason, StopReason::BudgetExhausted);
    assert_eq!(summary.frames_requested, 3);
    assert_eq!(summary.frames_scored, 3);
    assert!((summary.best_focus - 40.0).abs() < 1e-9);
    assert!((summary.last_focus.unwrap() - 31.0).abs() < 1e-9);
    assert_eq!(session.state(), LoopState::Stopped);
}

#[test]
fn test_failed_frame_is_reported_and_skipped() {
    let source = ScriptedSource::new(vec![
        ScriptedOutcome::from(frame_with_level(20.0)),
        ScriptedOutcome::failed(0xE100_0014, "Payload incomplete"),
        ScriptedOutcome::from(frame_with_level(55.0)),
    ]);
    let mut session = FocusSession::new(source, CollectingReporter::new(), config(3));

    let summary = session.run().unwrap();
    let reporter = session.reporter();

    let order: Vec<&str> = reporter
        .events
        .iter()
        .map(|event| match event {
            ReportEvent::SessionStarted { .. } => "started",
            ReportEvent::Focus(_) => "focus",
            ReportEvent::FrameFailed(_) => "failed",
            ReportEvent::SessionEnded { .. } => "ended",
        })
        .collect();
    assert_eq!(order, vec!["started", "focus", "failed", "focus", "ended"]);

    assert_levels(&reporter.levels(), &[(20.0, 20.0), (55.0, 55.0)]);
    let failure = reporter.failures()[0];
    assert_eq!(failure.sequence, 2);
    assert_eq!(failure.code, 0xE100_0014);
    assert_eq!(failure.description, "Payload incomplete");

    assert_eq!(summary.frames_requested, 3);
    assert_eq!(summary.frames_failed, 1);
    assert_eq!(summary.frames_scored, 2);
}

#[test]
fn test_failed_frame_does_not_move_best() {
    let source = ScriptedSource::new(vec![
        ScriptedOutcome::from(frame_with_level(55.0)),
        ScriptedOutcome::failed(1, "sensor fault"),
        ScriptedOutcome::from(frame_with_level(20.0)),
    ]);
    let mut session = FocusSession::new(source, CollectingReporter::new(), config(3));
    session.run().unwrap();
    assert_levels(&session.reporter().levels(), &[(55.0, 55.0), (20.0, 55.0)]);
}

#[test]
fn test_timeout_ends_session_and_keeps_best() {
    let mut script: Vec<ScriptedOutcome> = [12.5, 40.0, 31.0, 20.0]
        .iter()
        .map(|&level| ScriptedOutcome::from(frame_with_level(level)))
        .collect();
    script.push(ScriptedOutcome::TimedOut);
    script.extend((0..5).map(|_| ScriptedOutcome::from(frame_with_level(55.0))));
    let source = ScriptedSource::new(script);
    let mut session = FocusSession::new(source, CollectingReporter::new(), config(10));

    let failure = session.run().unwrap_err();

    assert!(matches!(
        failure.error,
        FocusError::FatalTransport {
            kind: TransportErrorKind::Timeout,
            ..
        }
    ));
    assert_eq!(failure.error.code(), "TRANSPORT_TIMEOUT");
    assert_eq!(failure.summary.frames_scored, 4);
    assert_eq!(failure.summary.stop_reason, StopReason::Fatal);
    assert!((failure.summary.best_focus - 40.0).abs() < 1e-9);
    assert!((session.best_focus() - 40.0).abs() < 1e-9);

    let reporter = session.reporter();
    assert_eq!(reporter.levels().len(), 4);
    let (summary, error) = reporter.session_end().unwrap();
    assert!((summary.best_focus - 40.0).abs() < 1e-9);
    assert_eq!(error.unwrap().code, "TRANSPORT_TIMEOUT");

    let (source, _, _) = session.into_parts();
    assert_eq!(source.retrieve_calls(), 5);
    assert_eq!(source.stop_calls(), 1);
}

#[test]
fn test_transport_error_is_fatal() {
    let source = ScriptedSource::new(vec![
        ScriptedOutcome::from(frame_with_level(31.0)),
        ScriptedOutcome::Fatal(FocusError::disconnected("cable pulled")),
    ]);
    let mut session = FocusSession::new(source, CollectingReporter::new(), config(5));
    let failure = session.run().unwrap_err();
    assert_eq!(failure.error.code(), "TRANSPORT_DISCONNECTED");
    assert_eq!(failure.summary.frames_requested, 1);
    assert!((failure.summary.best_focus - 31.0).abs() < 1e-9);
}

#[test]
fn test_invalid_region_fails_fast() {
    let big_roi = SessionConfig::default()
        .with_frame_budget(5)
        .with_retrieve_timeout(Duration::from_millis(50));
    let source = ScriptedSource::new(vec![frame_with_level(40.0), frame_with_level(55.0)]);
    let mut session = FocusSession::new(source, CollectingReporter::new(), big_roi);

    let failure = session.run().unwrap_err();

    assert!(matches!(failure.error, FocusError::InvalidRegion { .. }));
    assert!(failure.error.is_fatal());
    assert_eq!(failure.summary.frames_requested, 1);
    assert!(session.reporter().levels().is_empty());
}

#[test]
fn test_unsupported_encoding_fails_fast() {
    let bayer = Frame::new(2, 4, PixelFormat::BayerRg8, vec![9; 8]).unwrap();
    let source = ScriptedSource::new(vec![bayer]);
    let mut session = FocusSession::new(source, CollectingReporter::new(), config(1));
    let failure = session.run().unwrap_err();
    assert_eq!(failure.error.code(), "UNSUPPORTED_ENCODING");
}

#[test]
fn test_source_exhaustion_stops_normally() {
    let source = ScriptedSource::new(vec![frame_with_level(12.5)]);
    let mut session = FocusSession::new(source, CollectingReporter::new(), config(10));
    let summary = session.run().unwrap();
    assert_eq!(summary.stop_reason, StopReason::SourceExhausted);
    assert_eq!(summary.frames_requested, 1);
}

#[test]
fn test_budget_counts_failed_frames() {
    let source = ScriptedSource::new(vec![
        ScriptedOutcome::failed(1, "a"),
        ScriptedOutcome::failed(2, "b"),
        ScriptedOutcome::from(frame_with_level(40.0)),
    ]);
    let mut session = FocusSession::new(source, CollectingReporter::new(), config(2));
    let summary = session.run().unwrap();
    assert_eq!(summary.stop_reason, StopReason::BudgetExhausted);
    assert_eq!(summary.frames_failed, 2);
    assert_eq!(summary.frames_scored, 0);
    assert_eq!(summary.best_focus, 0.0);
}

#[test]
fn test_cancel_takes_effect_between_frames() {
    let token = CancelToken::new();
    let source = ScriptedSource::new(vec![
        frame_with_level(12.5),
        frame_with_level(40.0),
        frame_with_level(31.0),
    ])
    .with_cancel_after(2, token.clone());
    let mut session =
        FocusSession::new(source, CollectingReporter::new(), config(3)).with_cancel_token(token);

    let summary = session.run().unwrap();

    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    // The frame in flight when the token fired is still reported in full
    assert_levels(&session.reporter().levels(), &[(12.5, 12.5), (40.0, 40.0)]);
}

#[test]
fn test_display_does_not_change_results() {
    let frames = || {
        ScriptedSource::new(vec![
            frame_with_level(20.0),
            frame_with_level(55.0),
            frame_with_level(12.5),
        ])
    };

    let mut plain = FocusSession::new(frames(), CollectingReporter::new(), config(3));
    plain.run().unwrap();

    let mut display = RecordingDisplay::default();
    let mut shown = FocusSession::new(frames(), CollectingReporter::new(), config(3))
        .with_display(&mut display);
    shown.run().unwrap();

    assert_eq!(plain.reporter().levels(), shown.reporter().levels());
    drop(shown);
    assert_eq!(display.shown.len(), 6);
}

#[test]
fn test_rerun_starts_from_zero() {
    let source = ScriptedSource::new(vec![frame_with_level(55.0), frame_with_level(12.5)]);
    let mut session = FocusSession::new(source, CollectingReporter::new(), config(1));
    session.run().unwrap();
    assert!((session.best_focus() - 55.0).abs() < 1e-9);

    session.run().unwrap();
    assert!((session.best_focus() - 12.5).abs() < 1e-9);
}

#[test]
fn test_open_failure_reports_session_end() {
    let source = ScriptedSource::new(vec![frame_with_level(12.5)])
        .with_open_error(FocusError::device("no camera"));
    let mut session = FocusSession::new(source, CollectingReporter::new(), config(1));
    let failure = session.run().unwrap_err();
    assert_eq!(failure.error.code(), "TRANSPORT_DEVICE");
    let (summary, error) = session.reporter().session_end().unwrap();
    assert_eq!(summary.frames_requested, 0);
    assert!(error.is_some());
}

#[test]
fn test_settings_reach_the_source() {
    let source = ScriptedSource::new(vec![frame_with_level(12.5)]);
    let mut session = FocusSession::new(source, CollectingReporter::new(), config(1));
    session.run().unwrap();
    let (source, _, _) = session.into_parts();
    let settings = source.settings().unwrap();
    assert_eq!(settings.pixel_format, PixelFormat::Mono8);
    assert_eq!(settings.exposure_time_us, 10_000.0);
}
