//! Ground-truth matching: decides whether a single detection is correct.

use crate::error::Result;
use crate::ground_truth::{ClassNames, GroundTruthSource, ImageFileProbe, ImageProbe, LabelRow};
use crate::metrics::iou::{calculate_iou, yolo_to_xyxy};
use crate::threshold::validate_threshold;
use crate::types::{BoundingBox, Detection, FlagReason, GroundTruthBox};
use tracing::debug;

/// Default minimum IoU for a detection to count as overlapping its ground truth.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.5;

/// The ground-truth box that overlaps a detection the most.
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch<'a> {
    pub index: usize,
    pub ground_truth: &'a GroundTruthBox,
    pub iou: f64,
}

/// Find the ground-truth box with the highest IoU against `bbox`.
///
/// Candidates are scanned in order and only a strictly greater IoU replaces
/// the current best, so on an exact tie the first candidate wins. A candidate
/// with IoU 0 is never selected.
///
/// # Example
///
/// ```
/// use detection_audit::matching::find_best_match;
/// use detection_audit::types::{BoundingBox, GroundTruthBox};
///
/// let gt = vec![
///     GroundTruthBox { class_name: "cat".into(), bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0) },
///     GroundTruthBox { class_name: "dog".into(), bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0) },
/// ];
/// let best = find_best_match(&BoundingBox::new(0.0, 0.0, 10.0, 10.0), &gt).unwrap();
/// assert_eq!(best.ground_truth.class_name, "cat");
/// ```
pub fn find_best_match<'a>(
    bbox: &BoundingBox,
    ground_truths: &'a [GroundTruthBox],
) -> Option<BestMatch<'a>> {
    let mut best: Option<BestMatch<'a>> = None;
    let mut best_iou = 0.0;

    for (index, gt) in ground_truths.iter().enumerate() {
        let iou = calculate_iou(bbox, &gt.bbox);
        if iou > best_iou {
            best_iou = iou;
            best = Some(BestMatch {
                index,
                ground_truth: gt,
                iou,
            });
        }
    }

    best
}

/// Checks detections against per-image ground truth.
///
/// The validator owns its collaborators: where label files come from, how
/// image sizes are read, and the class-name table used to name ground-truth
/// class ids.
#[derive(Debug, Clone)]
pub struct GroundTruthValidator<S, P = ImageFileProbe> {
    source: S,
    probe: P,
    class_names: ClassNames,
    iou_threshold: f64,
}

impl<S: GroundTruthSource> GroundTruthValidator<S, ImageFileProbe> {
    /// Validator that reads image sizes from disk.
    pub fn new(source: S, class_names: ClassNames) -> Self {
        Self::with_probe(source, ImageFileProbe, class_names)
    }
}

impl<S: GroundTruthSource, P: ImageProbe> GroundTruthValidator<S, P> {
    /// Validator with a custom image-size probe.
    pub fn with_probe(source: S, probe: P, class_names: ClassNames) -> Self {
        Self {
            source,
            probe,
            class_names,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }

    /// Set the minimum IoU.
    ///
    /// # Errors
    ///
    /// Returns `InvalidThreshold` if `iou_threshold` is outside [0.0, 1.0].
    pub fn with_iou_threshold(mut self, iou_threshold: f64) -> Result<Self> {
        validate_threshold(iou_threshold)?;
        self.iou_threshold = iou_threshold;
        Ok(self)
    }

    pub fn iou_threshold(&self) -> f64 {
        self.iou_threshold
    }

    pub fn class_names(&self) -> &ClassNames {
        &self.class_names
    }

    /// Convert label rows into named pixel-space boxes.
    pub fn ground_truth_boxes(
        &self,
        rows: &[LabelRow],
        img_width: u32,
        img_height: u32,
    ) -> Vec<GroundTruthBox> {
        rows.iter()
            .map(|row| GroundTruthBox {
                class_name: self.class_names.name(row.class_id),
                bbox: yolo_to_xyxy(
                    row.x_center,
                    row.y_center,
                    row.width,
                    row.height,
                    img_width,
                    img_height,
                ),
            })
            .collect()
    }

    /// Validate one detection.
    ///
    /// Returns `None` when the detection overlaps a ground-truth box by at
    /// least the IoU threshold and agrees with that box's class. Otherwise
    /// returns the reason it failed. The no-detection sentinel is reported as
    /// `NoObjectsFound` without touching the ground-truth store.
    pub fn validate(&self, detection: &Detection) -> Option<FlagReason> {
        let (Some(det_label), Some(det_bbox)) = (&detection.label, &detection.bbox) else {
            return Some(FlagReason::NoObjectsFound);
        };

        let image_path = detection.image_path();
        let Some(rows) = self.source.label_rows(image_path) else {
            return Some(FlagReason::MissingGroundTruth);
        };

        let (img_width, img_height) = match self.probe.dimensions(image_path) {
            Ok(dims) => dims,
            Err(cause) => return Some(FlagReason::ImageReadError(cause)),
        };

        let gt_boxes = self.ground_truth_boxes(&rows, img_width, img_height);
        let best = find_best_match(det_bbox, &gt_boxes);
        let best_iou = best.as_ref().map_or(0.0, |m| m.iou);

        if best_iou < self.iou_threshold {
            debug!(image = %image_path.display(), iou = best_iou, "low IoU against ground truth");
            return Some(FlagReason::LowIou(best_iou));
        }

        if let Some(best) = best {
            if &best.ground_truth.class_name != det_label {
                return Some(FlagReason::ClassMismatch {
                    predicted: det_label.clone(),
                    expected: best.ground_truth.class_name.clone(),
                });
            }
        }

        None
    }

    /// True when [`validate`](Self::validate) finds no problem.
    pub fn is_correct(&self, detection: &Detection) -> bool {
        self.validate(detection).is_none()
    }

    /// Split detections into those that pass and those that fail validation.
    ///
    /// Failing detections get their `flag_reason` set; passing ones are
    /// returned unchanged. Input order is kept within each side.
    pub fn partition(&self, detections: Vec<Detection>) -> (Vec<Detection>, Vec<Detection>) {
        let mut passed = Vec::new();
        let mut flagged = Vec::new();

        for mut detection in detections {
            match self.validate(&detection) {
                None => passed.push(detection),
                Some(reason) => {
                    detection.flag_reason = Some(reason);
                    flagged.push(detection);
                }
            }
        }

        (passed, flagged)
    }
}
