//! Geometry and summary metrics used by the funnel stages.

pub mod iou;
pub mod accuracy;

pub use iou::{calculate_iou, yolo_to_xyxy};
pub use accuracy::accuracy_percent;
