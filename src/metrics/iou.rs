//! Intersection over Union (IoU) calculation and YOLO box conversion.

use crate::types::BoundingBox;

/// Calculate the Intersection over Union (IoU) between two bounding boxes.
///
/// IoU is defined as the area of intersection divided by the area of union.
/// When the union area is zero (two degenerate boxes) the result is 0.0.
///
/// # Arguments
///
/// * `bbox1` - First bounding box
/// * `bbox2` - Second bounding box
///
/// # Returns
///
/// Returns a value between 0.0 (no overlap) and 1.0 (perfect overlap).
///
/// # Example
///
/// ```
/// use detection_audit::metrics::iou::calculate_iou;
/// use detection_audit::types::BoundingBox;
///
/// let bbox1 = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
/// let bbox2 = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
/// let iou = calculate_iou(&bbox1, &bbox2);
/// assert!(iou > 0.0 && iou < 1.0);
/// ```
pub fn calculate_iou(bbox1: &BoundingBox, bbox2: &BoundingBox) -> f64 {
    let x_left = bbox1.x1.max(bbox2.x1);
    let y_top = bbox1.y1.max(bbox2.y1);
    let x_right = bbox1.x2.min(bbox2.x2);
    let y_bottom = bbox1.y2.min(bbox2.y2);

    let intersection_area = (x_right - x_left).max(0.0) * (y_bottom - y_top).max(0.0);
    let union_area = bbox1.area() + bbox2.area() - intersection_area;

    if union_area == 0.0 {
        return 0.0;
    }

    intersection_area / union_area
}

/// Convert a YOLO box (normalized center x/y, width, height) to absolute
/// pixel corners.
///
/// No clamping is applied: boxes that spill past the frame keep their
/// out-of-frame coordinates.
///
/// # Example
///
/// ```
/// use detection_audit::metrics::iou::yolo_to_xyxy;
///
/// let bbox = yolo_to_xyxy(0.5, 0.5, 0.5, 0.5, 200, 100);
/// assert_eq!((bbox.x1, bbox.y1, bbox.x2, bbox.y2), (50.0, 25.0, 150.0, 75.0));
/// ```
pub fn yolo_to_xyxy(
    x_center: f64,
    y_center: f64,
    width: f64,
    height: f64,
    img_width: u32,
    img_height: u32,
) -> BoundingBox {
    let cx = x_center * f64::from(img_width);
    let cy = y_center * f64::from(img_height);
    let half_w = width * f64::from(img_width) / 2.0;
    let half_h = height * f64::from(img_height) / 2.0;

    BoundingBox::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
}
