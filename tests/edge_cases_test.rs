//! Comprehensive edge case and boundary condition tests.

use detection_audit::aggregator::aggregate;
use detection_audit::audit::{AuditOrchestrator, Unlimited, VerificationRequest};
use detection_audit::error::VerifierError;
use detection_audit::ground_truth::{ClassNames, FixedDimensions, InMemoryLabels, LabelRow};
use detection_audit::matching::GroundTruthValidator;
use detection_audit::metrics::{calculate_iou, yolo_to_xyxy};
use detection_audit::pipeline::{escalate, FunnelPipeline};
use detection_audit::threshold::triage;
use detection_audit::types::{
    BoundingBox, Confidence, Detection, FlagReason, HumanFlagReason, SuggestedAction,
    VlmVerification,
};
use std::cell::Cell;
use std::io;
use std::sync::{Arc, Mutex};

/// Formatted log output collected in memory.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, logs.text())
}

const UNUSABLE_CONFIDENCE: &str = "confidence value can't be converted to a number";

fn row(class_id: i64, cx: f64, cy: f64, w: f64, h: f64) -> LabelRow {
    LabelRow {
        class_id,
        x_center: cx,
        y_center: cy,
        width: w,
        height: h,
    }
}

fn validator_with(
    stem: &str,
    rows: Vec<LabelRow>,
) -> GroundTruthValidator<InMemoryLabels, FixedDimensions> {
    let mut labels = InMemoryLabels::new();
    labels.insert(stem, rows);
    GroundTruthValidator::with_probe(
        labels,
        FixedDimensions {
            width: 100,
            height: 100,
        },
        ClassNames::new(["cat", "dog"]),
    )
}

fn answering(
    answer: &'static str,
) -> impl Fn(&VerificationRequest) -> Result<String, VerifierError> {
    move |_req: &VerificationRequest| Ok(answer.to_string())
}

fn existing_image(dir: &tempfile::TempDir) -> Detection {
    let path = dir.path().join("frame.jpg");
    std::fs::write(&path, b"jpeg bytes").unwrap();
    Detection::new(path, "cat", 0.4, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
}

// ============================================================================
// GEOMETRY EDGE CASES
// ============================================================================

#[test]
fn test_iou_zero_area_boxes() {
    let point = BoundingBox::new(5.0, 5.0, 5.0, 5.0);
    assert_eq!(calculate_iou(&point, &point), 0.0, "Zero union must give 0, not NaN");
}

#[test]
fn test_iou_touching_edges() {
    let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
    assert_eq!(calculate_iou(&a, &b), 0.0);
}

#[test]
fn test_iou_contained_box() {
    let outer = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let inner = BoundingBox::new(0.0, 0.0, 5.0, 5.0);
    assert!((calculate_iou(&outer, &inner) - 0.25).abs() < 1e-12);
}

#[test]
fn test_yolo_box_not_clamped() {
    let bbox = yolo_to_xyxy(0.95, 0.5, 0.2, 0.2, 100, 100);
    assert!((bbox.x2 - 105.0).abs() < 1e-9, "Out-of-frame coordinates must be kept");
    assert!((bbox.x1 - 85.0).abs() < 1e-9);
}

// ============================================================================
// VALIDATION EDGE CASES
// ============================================================================

#[test]
fn test_class_mismatch_at_high_iou() {
    // Ground truth dog at (30,30)-(70,70); detection overlaps it with IoU 0.8.
    let validator = validator_with("img", vec![row(1, 0.5, 0.5, 0.4, 0.4)]);
    let detection = Detection::new("img.jpg", "cat", 0.9, BoundingBox::new(30.0, 30.0, 70.0, 62.0));

    let gt = BoundingBox::new(30.0, 30.0, 70.0, 70.0);
    assert!((calculate_iou(&gt, detection.bbox.as_ref().unwrap()) - 0.8).abs() < 1e-9);

    assert_eq!(
        validator.validate(&detection),
        Some(FlagReason::ClassMismatch {
            predicted: "cat".into(),
            expected: "dog".into(),
        })
    );
}

#[test]
fn test_iou_exactly_at_threshold_passes() {
    let validator = validator_with("img", vec![row(0, 0.5, 0.5, 0.4, 0.4)])
        .with_iou_threshold(0.8)
        .unwrap();
    let detection = Detection::new("img.jpg", "cat", 0.9, BoundingBox::new(30.0, 30.0, 70.0, 62.0));
    assert_eq!(validator.validate(&detection), None);
}

#[test]
fn test_low_iou_reports_best_value() {
    let validator = validator_with("img", vec![row(0, 0.5, 0.5, 0.4, 0.4)]);
    let detection = Detection::new("img.jpg", "cat", 0.9, BoundingBox::new(50.0, 30.0, 90.0, 70.0));
    match validator.validate(&detection) {
        Some(FlagReason::LowIou(iou)) => assert!((iou - 1.0 / 3.0).abs() < 1e-9),
        other => panic!("expected LowIou, got {other:?}"),
    }
}

#[test]
fn test_empty_label_file_is_low_iou() {
    let validator = validator_with("img", vec![]);
    let detection = Detection::new("img.jpg", "cat", 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(validator.validate(&detection), Some(FlagReason::LowIou(0.0)));
}

#[test]
fn test_zero_threshold_without_match_passes() {
    let validator = validator_with("img", vec![row(1, 0.1, 0.1, 0.05, 0.05)])
        .with_iou_threshold(0.0)
        .unwrap();
    let detection = Detection::new("img.jpg", "cat", 0.9, BoundingBox::new(80.0, 80.0, 90.0, 90.0));
    assert_eq!(validator.validate(&detection), None);
}

#[test]
fn test_unknown_class_id_uses_number() {
    let validator = validator_with("img", vec![row(42, 0.5, 0.5, 0.4, 0.4)]);
    let detection = Detection::new("img.jpg", "cat", 0.9, BoundingBox::new(30.0, 30.0, 70.0, 70.0));
    assert_eq!(
        validator.validate(&detection),
        Some(FlagReason::ClassMismatch {
            predicted: "cat".into(),
            expected: "42".into(),
        })
    );
}

#[test]
fn test_tie_keeps_first_ground_truth() {
    // Two identical boxes with different classes: the first one decides.
    let validator = validator_with(
        "img",
        vec![row(0, 0.5, 0.5, 0.4, 0.4), row(1, 0.5, 0.5, 0.4, 0.4)],
    );
    let detection = Detection::new("img.jpg", "cat", 0.9, BoundingBox::new(30.0, 30.0, 70.0, 70.0));
    assert_eq!(validator.validate(&detection), None);

    let dog = Detection::new("img.jpg", "dog", 0.9, BoundingBox::new(30.0, 30.0, 70.0, 70.0));
    assert!(matches!(
        validator.validate(&dog),
        Some(FlagReason::ClassMismatch { .. })
    ));
}

#[test]
fn test_sentinel_skips_ground_truth_lookup() {
    let validator = validator_with("other", vec![]);
    let sentinel = Detection::no_detection("img.jpg");
    assert_eq!(validator.validate(&sentinel), Some(FlagReason::NoObjectsFound));
}

#[test]
fn test_missing_ground_truth() {
    let validator = validator_with("other", vec![row(0, 0.5, 0.5, 0.4, 0.4)]);
    let detection = Detection::new("img.jpg", "cat", 0.9, BoundingBox::new(30.0, 30.0, 70.0, 70.0));
    assert_eq!(validator.validate(&detection), Some(FlagReason::MissingGroundTruth));
}

// ============================================================================
// TRIAGE EDGE CASES
// ============================================================================

#[test]
fn test_not_a_number_confidence_goes_to_audit() {
    let detection = Detection::new("a.jpg", "car", 0.0, BoundingBox::new(0.0, 0.0, 5.0, 5.0))
        .with_confidence(Confidence::Text("not-a-number".into()));
    assert_eq!(detection.confidence_value(), 0.0);

    let outcome = triage(vec![detection], 0.7).unwrap();
    assert!(outcome.confident.is_empty());
    assert_eq!(outcome.audit_required[0].flag_reason, Some(FlagReason::LowConfidence));
    assert_eq!(
        outcome.audit_required[0].confidence,
        Confidence::Text("not-a-number".into()),
        "The raw confidence must be kept"
    );
}

#[test]
fn test_unusable_confidence_is_logged() {
    let detection = Detection::new("a.jpg", "car", 0.0, BoundingBox::new(0.0, 0.0, 5.0, 5.0))
        .with_confidence(Confidence::Text("not-a-number".into()));
    let (_, logs) = capture_logs(|| triage(vec![detection], 0.7).unwrap());

    assert_eq!(logs.matches(UNUSABLE_CONFIDENCE).count(), 1);
    assert!(logs.contains("WARN"));
    assert!(logs.contains("not-a-number"));
}

#[test]
fn test_aggregation_reads_confidence_quietly() {
    let detection = Detection::new("a.jpg", "car", 0.0, BoundingBox::new(0.0, 0.0, 5.0, 5.0))
        .with_confidence(Confidence::Text("not-a-number".into()));
    let (stats, logs) = capture_logs(|| aggregate(vec![detection]));

    assert_eq!(stats.get("a.jpg").unwrap().max_conf, 0.0);
    assert!(!logs.contains(UNUSABLE_CONFIDENCE));
}

#[test]
fn test_funnel_warns_once_per_unusable_confidence() {
    let detection = Detection::new("a.jpg", "car", 0.0, BoundingBox::new(0.0, 0.0, 5.0, 5.0))
        .with_confidence(Confidence::Text("not-a-number".into()));
    let verifier = |_req: &VerificationRequest| -> Result<String, VerifierError> { Ok("YES".into()) };
    let mut pipeline = FunnelPipeline::new(
        validator_with("a", Vec::new()),
        AuditOrchestrator::with_limiter(verifier, Unlimited),
        0.7,
    )
    .unwrap();

    let (report, logs) = capture_logs(|| pipeline.run(vec![detection]).unwrap());

    assert_eq!(report.stats.audit_total, 1);
    assert_eq!(logs.matches(UNUSABLE_CONFIDENCE).count(), 1);
}

#[test]
fn test_numeric_string_confidence() {
    let detection = Detection::new("a.jpg", "car", 0.0, BoundingBox::new(0.0, 0.0, 5.0, 5.0))
        .with_confidence(Confidence::Text(" 0.85 ".into()));
    let outcome = triage(vec![detection], 0.7).unwrap();
    assert_eq!(outcome.confident.len(), 1);
}

#[test]
fn test_confidence_equal_to_threshold_is_confident() {
    let detection = Detection::new("a.jpg", "car", 0.7, BoundingBox::new(0.0, 0.0, 5.0, 5.0));
    let outcome = triage(vec![detection], 0.7).unwrap();
    assert_eq!(outcome.confident.len(), 1);
}

#[test]
fn test_nan_text_confidence_is_defaulted() {
    let detection = Detection::new("a.jpg", "car", 0.0, BoundingBox::new(0.0, 0.0, 5.0, 5.0))
        .with_confidence(Confidence::Text("NaN".into()));
    let outcome = triage(vec![detection], 0.0).unwrap();
    // A defaulted 0 still clears a zero threshold.
    assert_eq!(outcome.confident.len(), 1);
}

#[test]
fn test_sentinel_with_high_confidence() {
    let sentinel = Detection::no_detection("a.jpg").with_confidence(Confidence::Score(0.99));
    let outcome = triage(vec![sentinel], 0.5).unwrap();
    assert_eq!(outcome.audit_required[0].flag_reason, Some(FlagReason::NoObjectsFound));
}

// ============================================================================
// AGGREGATION EDGE CASES
// ============================================================================

#[test]
fn test_aggregate_empty() {
    let stats = aggregate(Vec::<Detection>::new());
    assert!(stats.is_empty());
}

#[test]
fn test_aggregate_sentinel_image() {
    let stats = aggregate(vec![Detection::no_detection("empty.jpg")]);
    let record = stats.get("empty.jpg").unwrap();
    assert!(record.detections.is_empty());
    assert_eq!(record.count, 1);
    assert_eq!(record.max_conf, 0.0);
}

#[test]
fn test_aggregate_keeps_first_seen_label_order() {
    let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
    let stats = aggregate(vec![
        Detection::new("a.jpg", "bus", 0.2, bbox),
        Detection::new("b.jpg", "car", 0.3, bbox),
        Detection::new("a.jpg", "car", 0.7, bbox),
        Detection::new("a.jpg", "bus", 0.5, bbox),
    ]);
    let a = stats.get("a.jpg").unwrap();
    assert_eq!(a.detections, vec!["bus", "car"]);
    assert_eq!(a.max_conf, 0.7);
    assert_eq!(a.count, 3);
    assert_eq!(stats.get("b.jpg").unwrap().count, 1);
}

// ============================================================================
// AUDIT EDGE CASES
// ============================================================================

#[test]
fn test_yes_sentence_approves() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = AuditOrchestrator::with_limiter(answering("I believe yes, there is."), Unlimited);
    let item = orchestrator.audit_one(existing_image(&dir));
    assert_eq!(item.vlm_verification, Some(VlmVerification::Yes));
    assert_eq!(item.vlm_suggested_action, Some(SuggestedAction::Approve));
}

#[test]
fn test_not_sure_escalates() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = AuditOrchestrator::with_limiter(answering("Not sure"), Unlimited);
    let batch = orchestrator.audit_batch(vec![existing_image(&dir)]).unwrap();

    let item = &batch.audited.entries()[0];
    assert_eq!(
        item.vlm_verification,
        Some(VlmVerification::Uncertain("NOT SURE".into()))
    );
    assert_eq!(item.vlm_suggested_action, Some(SuggestedAction::ManualReview));

    let human = escalate(batch.audited.iter());
    assert_eq!(human.len(), 1);
    assert_eq!(human[0].human_flag_reason, Some(HumanFlagReason::UncertainVlmResponse));
}

#[test]
fn test_missing_image_makes_no_call() {
    let calls = Cell::new(0usize);
    let verifier = |_req: &VerificationRequest| -> Result<String, VerifierError> {
        calls.set(calls.get() + 1);
        Ok("YES".into())
    };
    let mut orchestrator = AuditOrchestrator::with_limiter(&verifier, Unlimited);
    let item = orchestrator.audit_one(Detection::new(
        "/definitely/not/here.jpg",
        "cat",
        0.1,
        BoundingBox::new(0.0, 0.0, 1.0, 1.0),
    ));

    assert_eq!(item.vlm_verification, Some(VlmVerification::ImageNotFound));
    assert_eq!(item.vlm_suggested_action, Some(SuggestedAction::ManualReview));
    assert_eq!(calls.get(), 0);
}

#[test]
fn test_reaudit_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = AuditOrchestrator::with_limiter(answering("no"), Unlimited);
    let first = orchestrator.audit_one(existing_image(&dir));
    let second = orchestrator.audit_one(first.clone());
    assert_eq!(first, second);
    assert_eq!(second.vlm_suggested_action, Some(SuggestedAction::Reject));
}

#[test]
fn test_empty_batch() {
    let mut orchestrator = AuditOrchestrator::with_limiter(answering("yes"), Unlimited);
    let batch = orchestrator.audit_batch(Vec::new()).unwrap();
    assert!(batch.audited.is_empty());
    assert!(batch.is_complete());
}
