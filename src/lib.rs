//! # detection-audit
//!
//! A quality-assurance funnel for object-detection output.
//!
//! Raw detections are checked against YOLO-format ground-truth labels,
//! split by confidence, and everything that is not trusted is sent to an
//! external verifier (typically a vision-language model). Answers the
//! verifier cannot settle are escalated to a human.
//!
//! - **Geometry**: IoU and YOLO-normalized to pixel-corner conversion
//! - **Validation**: best-IoU matching with class checking
//! - **Triage**: confidence split with audit reasons
//! - **Aggregation**: per-image label, max-confidence and count summary
//! - **Audit**: rate-limited verifier calls with answer normalization
//!
//! ## Quick Start
//!
//! ```rust
//! use detection_audit::{triage, BoundingBox, Detection};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let detections = vec![
//!     Detection::new("img/a.jpg", "cat", 0.92, BoundingBox::new(10.0, 10.0, 50.0, 50.0)),
//!     Detection::new("img/b.jpg", "dog", 0.41, BoundingBox::new(0.0, 0.0, 20.0, 20.0)),
//!     Detection::no_detection("img/c.jpg"),
//! ];
//!
//! let outcome = triage(detections, 0.7)?;
//! assert_eq!(outcome.confident.len(), 1);
//! assert_eq!(outcome.audit_required.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Detection Format
//!
//! Detector output is a JSON array of records. An image with nothing found
//! carries `"label": null`:
//!
//! ```json
//! [
//!   {"image_path": "img/a.jpg", "label": "cat", "confidence": 0.92, "bbox": [10, 10, 50, 50]},
//!   {"image_path": "img/c.jpg", "label": null, "confidence": 0.0}
//! ]
//! ```

pub mod aggregator;
pub mod audit;
pub mod config;
pub mod error;
pub mod ground_truth;
pub mod loader;
pub mod matching;
pub mod metrics;
pub mod pipeline;
pub mod stats;
pub mod threshold;
pub mod types;

// Re-export commonly used types and functions
pub use aggregator::{aggregate, try_aggregate, AggregatedStats, DetectionAggregator};
pub use audit::{
    AuditBatch, AuditConfig, AuditLedger, AuditOrchestrator, FixedInterval, RateLimiter,
    Unlimited, VerificationRequest, Verifier,
};
pub use config::{ConfigFormat, ConfigLoader, FunnelConfig, OutputPaths};
pub use error::{AuditError, Result, VerifierError};
pub use ground_truth::{
    ClassNames, FixedDimensions, GroundTruthSource, ImageFileProbe, ImageProbe, InMemoryLabels,
    LabelDirectory, LabelRow,
};
pub use loader::{list_images, load_detections_from_file, load_detections_from_str};
pub use matching::{find_best_match, GroundTruthValidator};
pub use metrics::{calculate_iou, yolo_to_xyxy};
pub use pipeline::{defer_unaudited, escalate, FunnelPipeline, FunnelReport};
pub use stats::PipelineStats;
pub use threshold::{triage, TriageOutcome};
pub use types::{
    AggregationRecord, BoundingBox, Confidence, Detection, FlagReason, GroundTruthBox,
    HumanFlagReason, SuggestedAction, VlmVerification,
};

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Call once from a binary or demo; the library itself only emits events.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
