//! Contract tests: the focus pipeline must check its invariants at runtime,
//! not just happen to produce the right answer.

use crabfocus::acquisition::{FocusSession, SessionConfig};
use crabfocus::focus::{
    extract_region, normalize, BestFocusTracker, FocusMeter, FocusScorer, ResponseMode,
    RoiPlacement, RoiSpec,
};
use crabfocus::invariant_ppt::{
    clear_invariant_log, contract_test, was_checked, BEST_FOCUS_MONOTONIC,
    FOCUS_LEVEL_NON_NEGATIVE, NORMALIZED_KEEPS_SHAPE, REGION_MATCHES_ROI, ROI_WITHIN_FRAME,
};
use crabfocus::testing::{encode_gray, focus_target, CollectingReporter, ScriptedSource};
use crabfocus::types::{PixelFormat, Roi};
use std::time::Duration;

#[test]
fn contract_region_extraction() {
    clear_invariant_log();
    let frame = encode_gray(&focus_target(40, 30), PixelFormat::Mono8).unwrap();
    extract_region(&frame, &Roi::new(10, 10, 20, 20)).unwrap();
    contract_test("region extraction", &[ROI_WITHIN_FRAME, REGION_MATCHES_ROI]);
}

#[test]
fn contract_rejected_roi_checks_nothing() {
    clear_invariant_log();
    let frame = encode_gray(&focus_target(40, 30), PixelFormat::Mono8).unwrap();
    assert!(extract_region(&frame, &Roi::new(30, 10, 20, 20)).is_err());
    assert!(!was_checked(REGION_MATCHES_ROI));
}

#[test]
fn contract_normalize_and_score() {
    clear_invariant_log();
    let frame = encode_gray(&focus_target(24, 24), PixelFormat::Rgb8).unwrap();
    let region = normalize(&frame).unwrap();
    FocusScorer::new(ResponseMode::Saturated).score(&region);
    contract_test(
        "normalize and score",
        &[NORMALIZED_KEEPS_SHAPE, FOCUS_LEVEL_NON_NEGATIVE],
    );
}

#[test]
fn contract_tracker() {
    clear_invariant_log();
    let mut tracker = BestFocusTracker::new();
    tracker.update(3.0);
    contract_test("best-value tracker", &[BEST_FOCUS_MONOTONIC]);
}

#[test]
fn contract_meter_runs_full_pipeline() {
    clear_invariant_log();
    let meter = FocusMeter::new(
        RoiSpec::new(16, 16, RoiPlacement::Centered),
        ResponseMode::Saturated,
    );
    let frame = encode_gray(&focus_target(64, 48), PixelFormat::Mono12).unwrap();
    meter.measure(&frame).unwrap();
    contract_test(
        "focus meter",
        &[
            ROI_WITHIN_FRAME,
            REGION_MATCHES_ROI,
            NORMALIZED_KEEPS_SHAPE,
            FOCUS_LEVEL_NON_NEGATIVE,
        ],
    );
}

#[test]
fn contract_session_checks_every_stage() {
    clear_invariant_log();
    let frames = (0..3).map(|_| encode_gray(&focus_target(64, 48), PixelFormat::Mono8).unwrap());
    let config = SessionConfig::default()
        .with_frame_budget(3)
        .with_retrieve_timeout(Duration::from_millis(50))
        .with_roi(RoiSpec::new(32, 16, RoiPlacement::Centered));
    let mut session = FocusSession::new(
        ScriptedSource::new(frames.collect::<Vec<_>>()),
        CollectingReporter::new(),
        config,
    );
    session.run().unwrap();
    contract_test(
        "focus session",
        &[
            ROI_WITHIN_FRAME,
            REGION_MATCHES_ROI,
            NORMALIZED_KEEPS_SHAPE,
            FOCUS_LEVEL_NON_NEGATIVE,
            BEST_FOCUS_MONOTONIC,
        ],
    );
}
