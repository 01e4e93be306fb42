//! Core data types for detections moving through the audit funnel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Axis-aligned bounding box in absolute pixel corner coordinates.
///
/// Serialized as a `[x1, y1, x2, y2]` array, the layout produced by the
/// upstream detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Create a new bounding box from its corners.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Get the box width (x2 - x1).
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    /// Get the box height (y2 - y1).
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Get the area of the bounding box.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Check if the bounding box is valid (positive dimensions).
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Confidence value exactly as it arrived from the detector.
///
/// Upstream records are loosely typed: the score may be a number, a numeric
/// string, `null`, absent, or something else entirely. The raw value is kept
/// so that re-serializing a record does not rewrite the input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confidence {
    Score(f64),
    Text(String),
    #[default]
    Missing,
    Other(serde_json::Value),
}

/// Outcome of reading a [`Confidence`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfidenceReading {
    /// A finite score taken from the input.
    Valid(f64),
    /// The input could not be read as a finite number; the value is 0.
    Defaulted,
}

impl ConfidenceReading {
    /// The numeric value, 0.0 when defaulted.
    pub fn value(&self) -> f64 {
        match self {
            ConfidenceReading::Valid(v) => *v,
            ConfidenceReading::Defaulted => 0.0,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, ConfidenceReading::Defaulted)
    }
}

impl Confidence {
    /// Parse the raw value without logging.
    ///
    /// Numeric strings are accepted after trimming. Non-finite values
    /// (`"nan"`, `"inf"`) count as malformed.
    pub fn read(&self) -> ConfidenceReading {
        let parsed = match self {
            Confidence::Score(v) => Some(*v),
            Confidence::Text(s) => s.trim().parse::<f64>().ok(),
            Confidence::Missing | Confidence::Other(_) => None,
        };
        match parsed {
            Some(v) if v.is_finite() => ConfidenceReading::Valid(v),
            _ => ConfidenceReading::Defaulted,
        }
    }
}

impl From<f64> for Confidence {
    fn from(v: f64) -> Self {
        Confidence::Score(v)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Score(v) => write!(f, "{v}"),
            Confidence::Text(s) => write!(f, "{s:?}"),
            Confidence::Missing => write!(f, "null"),
            Confidence::Other(v) => write!(f, "{v}"),
        }
    }
}

/// Why a detection was routed to the audit ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlagReason {
    NoObjectsFound,
    LowConfidence,
    #[serde(rename = "LowIoU")]
    LowIou(f64),
    ClassMismatch { predicted: String, expected: String },
    MissingGroundTruth,
    ImageReadError(String),
}

impl fmt::Display for FlagReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagReason::NoObjectsFound => write!(f, "No Objects Found"),
            FlagReason::LowConfidence => write!(f, "Low Confidence"),
            FlagReason::LowIou(iou) => write!(f, "Low IoU with GT ({iou:.2})"),
            FlagReason::ClassMismatch { predicted, expected } => {
                write!(f, "Class Mismatch (Det: {predicted}, GT: {expected})")
            }
            FlagReason::MissingGroundTruth => write!(f, "Missing Ground Truth File"),
            FlagReason::ImageReadError(cause) => {
                write!(f, "Error reading image dimensions: {cause}")
            }
        }
    }
}

/// Normalized answer of the external verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VlmVerification {
    Yes,
    No,
    /// Any other answer, upper-cased.
    Uncertain(String),
    ImageNotFound,
    Error,
}

impl VlmVerification {
    /// Map the verification to the action suggested to reviewers.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            VlmVerification::Yes => SuggestedAction::Approve,
            VlmVerification::No => SuggestedAction::Reject,
            VlmVerification::Uncertain(_)
            | VlmVerification::ImageNotFound
            | VlmVerification::Error => SuggestedAction::ManualReview,
        }
    }

    /// `YES` and `NO` are machine-resolved; everything else needs a human.
    pub fn is_conclusive(&self) -> bool {
        matches!(self, VlmVerification::Yes | VlmVerification::No)
    }
}

/// Disposition suggested for an audited detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestedAction {
    Approve,
    Reject,
    ManualReview,
}

/// Why an audited detection was escalated to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HumanFlagReason {
    UncertainVlmResponse,
    /// Never audited because the batch halted first.
    AuditHalted,
}

/// One predicted object instance, annotated in place by each funnel stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub image_path: PathBuf,
    /// Predicted class name; `None` marks an image with no detections.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_reason: Option<FlagReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlm_verification: Option<VlmVerification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlm_suggested_action: Option<SuggestedAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_flag_reason: Option<HumanFlagReason>,
}

impl Detection {
    /// Create a detection with a label, numeric confidence and box.
    pub fn new(
        image_path: impl Into<PathBuf>,
        label: impl Into<String>,
        confidence: f64,
        bbox: BoundingBox,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            label: Some(label.into()),
            confidence: Confidence::Score(confidence),
            bbox: Some(bbox),
            flag_reason: None,
            vlm_verification: None,
            vlm_suggested_action: None,
            human_flag_reason: None,
        }
    }

    /// Create the placeholder record for an image with zero detections.
    pub fn no_detection(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            label: None,
            confidence: Confidence::Missing,
            bbox: None,
            flag_reason: None,
            vlm_verification: None,
            vlm_suggested_action: None,
            human_flag_reason: None,
        }
    }

    /// Replace the raw confidence value.
    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// True for the no-detection sentinel.
    pub fn is_no_detection(&self) -> bool {
        self.label.is_none()
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Read the confidence, logging a warning when it has to default to 0.
    pub fn confidence_value(&self) -> f64 {
        let reading = self.confidence.read();
        if reading.is_defaulted() {
            warn!(
                image = %self.image_path.display(),
                raw = %self.confidence,
                "confidence value can't be converted to a number; using 0"
            );
        }
        reading.value()
    }
}

/// One labeled box from a ground-truth file, resolved to pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruthBox {
    pub class_name: String,
    pub bbox: BoundingBox,
}

/// Per-image rollup produced by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationRecord {
    /// Unique labels in first-seen order.
    pub detections: Vec<String>,
    pub max_conf: f64,
    pub count: usize,
}
