//! Per-image aggregation of detection streams.

use crate::error::Result;
use crate::types::{AggregationRecord, Detection};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Rollups keyed by image path.
///
/// Serializes as a plain JSON object `{image_path: record}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregatedStats {
    records: BTreeMap<PathBuf, AggregationRecord>,
}

impl AggregatedStats {
    pub fn get<P: AsRef<Path>>(&self, image_path: P) -> Option<&AggregationRecord> {
        self.records.get(image_path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &AggregationRecord)> {
        self.records.iter()
    }

    /// Total number of detections folded across all images.
    pub fn total_count(&self) -> usize {
        self.records.values().map(|r| r.count).sum()
    }
}

/// Streaming, single-pass fold of detections into [`AggregatedStats`].
///
/// Detections are consumed one at a time so the input never has to be held
/// in memory. The fold is order-sensitive only for the order of labels in
/// each record; `count`, `max_conf` and the label set do not depend on
/// arrival order.
#[derive(Debug, Default)]
pub struct DetectionAggregator {
    stats: AggregatedStats,
}

impl DetectionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one detection into its image's record.
    ///
    /// The no-detection sentinel counts towards `count` and `max_conf` but
    /// contributes no label. An unusable confidence folds in as 0 without a
    /// log line; triage is the stage that reports it.
    pub fn fold(&mut self, detection: &Detection) {
        let confidence = detection.confidence.read().value();
        let label = detection.label.as_deref();

        match self.stats.records.entry(detection.image_path.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(AggregationRecord {
                    detections: label.map(str::to_owned).into_iter().collect(),
                    max_conf: confidence,
                    count: 1,
                });
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();
                if let Some(label) = label {
                    if !record.detections.iter().any(|seen| seen == label) {
                        record.detections.push(label.to_owned());
                    }
                }
                if confidence > record.max_conf {
                    record.max_conf = confidence;
                }
                record.count += 1;
            }
        }
    }

    /// Current state of the fold.
    pub fn stats(&self) -> &AggregatedStats {
        &self.stats
    }

    pub fn finish(self) -> AggregatedStats {
        self.stats
    }
}

/// Aggregate any iterator of detections.
///
/// # Example
///
/// ```
/// use detection_audit::aggregator::aggregate;
/// use detection_audit::types::{BoundingBox, Detection};
///
/// let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
/// let stats = aggregate(vec![
///     Detection::new("a.jpg", "car", 0.4, bbox),
///     Detection::new("a.jpg", "car", 0.9, bbox),
///     Detection::new("a.jpg", "bus", 0.6, bbox),
/// ]);
///
/// let record = stats.get("a.jpg").unwrap();
/// assert_eq!(record.detections, vec!["car", "bus"]);
/// assert_eq!(record.max_conf, 0.9);
/// assert_eq!(record.count, 3);
/// ```
pub fn aggregate<I, D>(detections: I) -> AggregatedStats
where
    I: IntoIterator<Item = D>,
    D: Borrow<Detection>,
{
    detections
        .into_iter()
        .fold(DetectionAggregator::new(), |mut agg, detection| {
            agg.fold(detection.borrow());
            agg
        })
        .finish()
}

/// Aggregate a fallible stream, stopping at the first error.
pub fn try_aggregate<I>(detections: I) -> Result<AggregatedStats>
where
    I: IntoIterator<Item = Result<Detection>>,
{
    let mut agg = DetectionAggregator::new();
    for detection in detections {
        agg.fold(&detection?);
    }
    Ok(agg.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Confidence};

    fn det(image: &str, label: &str, conf: f64) -> Detection {
        Detection::new(image, label, conf, BoundingBox::new(0.0, 0.0, 1.0, 1.0))
    }

    #[test]
    fn test_groups_by_image() {
        let stats = aggregate(&[det("a.jpg", "car", 0.5), det("b.jpg", "dog", 0.7), det("a.jpg", "car", 0.2)]);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats.get("a.jpg").unwrap().count, 2);
        assert_eq!(stats.get("a.jpg").unwrap().detections, vec!["car"]);
        assert_eq!(stats.get("a.jpg").unwrap().max_conf, 0.5);
        assert_eq!(stats.total_count(), 3);
    }

    #[test]
    fn test_malformed_confidence_counts_as_zero() {
        let bad = det("a.jpg", "car", 0.0).with_confidence(Confidence::Text("oops".into()));
        let stats = aggregate(vec![bad]);
        let record = stats.get("a.jpg").unwrap();
        assert_eq!(record.max_conf, 0.0);
        assert_eq!(record.count, 1);
    }

    #[test]
    fn test_sentinel_has_no_label() {
        let stats = aggregate(vec![Detection::no_detection("empty.jpg")]);
        let record = stats.get("empty.jpg").unwrap();
        assert!(record.detections.is_empty());
        assert_eq!(record.count, 1);
    }

    #[test]
    fn test_serializes_as_object() {
        let stats = aggregate(vec![det("a.jpg", "car", 0.5)]);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["a.jpg"]["count"], 1);
        assert_eq!(json["a.jpg"]["detections"][0], "car");
    }

    #[test]
    fn test_try_aggregate_stops_on_error() {
        let items: Vec<Result<Detection>> = vec![
            Ok(det("a.jpg", "car", 0.5)),
            Err(crate::error::AuditError::ConfigError("boom".into())),
        ];
        assert!(try_aggregate(items).is_err());
    }
}
