//! Confidence triage: splits detections into confident and audit-required.

use crate::error::{AuditError, Result};
use crate::types::{Detection, FlagReason};
use tracing::debug;

/// Confidence at or above which a detection is considered confident.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Result of [`triage`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriageOutcome {
    /// Detections at or above the threshold, unchanged.
    pub confident: Vec<Detection>,
    /// Demoted detections, each tagged with a `flag_reason`.
    pub audit_required: Vec<Detection>,
}

/// Partition detections by confidence.
///
/// The no-detection sentinel always goes to audit with `NoObjectsFound`.
/// Other detections go to audit with `LowConfidence` when their confidence
/// is below `threshold`. Unreadable confidence values count as 0 and are
/// logged as warnings. Labels and boxes are never modified.
///
/// # Errors
///
/// Returns an error if the threshold is not in the valid range [0.0, 1.0].
///
/// # Example
///
/// ```
/// use detection_audit::threshold::triage;
/// use detection_audit::types::{BoundingBox, Detection};
///
/// let detections = vec![
///     Detection::new("a.jpg", "car", 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
///     Detection::new("a.jpg", "car", 0.3, BoundingBox::new(5.0, 5.0, 10.0, 10.0)),
///     Detection::no_detection("b.jpg"),
/// ];
///
/// let outcome = triage(detections, 0.7).unwrap();
/// assert_eq!(outcome.confident.len(), 1);
/// assert_eq!(outcome.audit_required.len(), 2);
/// ```
pub fn triage<I>(detections: I, threshold: f64) -> Result<TriageOutcome>
where
    I: IntoIterator<Item = Detection>,
{
    validate_threshold(threshold)?;

    let mut outcome = TriageOutcome::default();

    for mut detection in detections {
        if detection.is_no_detection() {
            detection.flag_reason = Some(FlagReason::NoObjectsFound);
            outcome.audit_required.push(detection);
            continue;
        }

        let confidence = detection.confidence_value();
        if confidence >= threshold {
            outcome.confident.push(detection);
        } else {
            debug!(
                image = %detection.image_path.display(),
                confidence,
                threshold,
                "demoting low-confidence detection"
            );
            detection.flag_reason = Some(FlagReason::LowConfidence);
            outcome.audit_required.push(detection);
        }
    }

    Ok(outcome)
}

/// Validate that a threshold is in the valid range [0.0, 1.0].
pub(crate) fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AuditError::InvalidThreshold(format!(
            "Threshold must be between 0.0 and 1.0, got {}",
            threshold
        )));
    }
    Ok(())
}
