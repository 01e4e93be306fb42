//! Statistics tracking for a funnel run
//!
//! This module provides the counters recorded while a detection batch moves
//! through raw validation, confidence triage, verifier audit and human
//! escalation.

use crate::metrics::accuracy::accuracy_percent;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Counts collected during one funnel run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Total number of raw detections entering the funnel
    pub raw_total: usize,

    /// Raw detections that pass ground-truth validation
    pub raw_correct: usize,

    /// Detections at or above the confidence threshold
    pub filtered_total: usize,

    /// Confident detections that also pass ground-truth validation
    pub filtered_correct: usize,

    /// Items sent to the external verifier
    pub audit_total: usize,

    /// Audited items the verifier confirmed (`YES`)
    pub vlm_passed: usize,

    /// Audited items the verifier rejected (`NO`)
    pub vlm_rejected: usize,

    /// Items escalated to a human reviewer, pending ones included
    pub human_total: usize,

    /// Items left unaudited because the audit batch halted early
    pub pending_total: usize,
}

impl PipelineStats {
    /// Create a new `PipelineStats` with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Accuracy of the raw detector output, in percent
    pub fn raw_accuracy(&self) -> f64 {
        accuracy_percent(self.raw_correct, self.raw_total)
    }

    /// Accuracy of the confident subset, in percent
    pub fn clean_accuracy(&self) -> f64 {
        accuracy_percent(self.filtered_correct, self.filtered_total)
    }

    /// Audited items resolved by the verifier without a human
    pub fn machine_resolved(&self) -> usize {
        self.vlm_passed + self.vlm_rejected
    }

    /// Emit the summary through `tracing` at info level
    pub fn log_summary(&self) {
        info!(
            raw_total = self.raw_total,
            raw_correct = self.raw_correct,
            raw_accuracy = %format!("{:.2}%", self.raw_accuracy()),
            filtered_total = self.filtered_total,
            filtered_correct = self.filtered_correct,
            clean_accuracy = %format!("{:.2}%", self.clean_accuracy()),
            audit_total = self.audit_total,
            vlm_passed = self.vlm_passed,
            vlm_rejected = self.vlm_rejected,
            human_total = self.human_total,
            pending_total = self.pending_total,
            "funnel summary"
        );
    }

    /// Get a formatted string summary of the statistics
    pub fn summary_string(&self) -> String {
        format!(
            "PipelineStats {{ raw: {}/{} ({:.2}%), confident: {}/{} ({:.2}%), audited: {}, vlm_yes: {}, vlm_no: {}, human: {}, pending: {} }}",
            self.raw_correct,
            self.raw_total,
            self.raw_accuracy(),
            self.filtered_correct,
            self.filtered_total,
            self.clean_accuracy(),
            self.audit_total,
            self.vlm_passed,
            self.vlm_rejected,
            self.human_total,
            self.pending_total
        )
    }
}
