//! End-to-end funnel: validation, triage, audit and human escalation.

use crate::aggregator::{aggregate, AggregatedStats};
use crate::audit::{AuditLedger, AuditOrchestrator, FixedInterval, RateLimiter, Verifier};
use crate::config::{FunnelConfig, OutputPaths};
use crate::error::Result;
use crate::ground_truth::{GroundTruthSource, ImageFileProbe, ImageProbe, LabelDirectory};
use crate::loader::save_json_pretty;
use crate::matching::GroundTruthValidator;
use crate::stats::PipelineStats;
use crate::threshold::{triage, validate_threshold};
use crate::types::{Detection, HumanFlagReason, SuggestedAction, VlmVerification};
use tracing::{info, warn};

/// Select audited items that still need a human.
///
/// Anything whose verification is not exactly `YES` or `NO` is returned
/// with `human_flag_reason` set to `UncertainVlmResponse`. A `NO` counts as
/// resolved: the detection is rejected, not escalated.
pub fn escalate<'a, I>(audited: I) -> Vec<Detection>
where
    I: IntoIterator<Item = &'a Detection>,
{
    audited
        .into_iter()
        .filter(|item| {
            !item
                .vlm_verification
                .as_ref()
                .is_some_and(VlmVerification::is_conclusive)
        })
        .map(|item| {
            let mut flagged = item.clone();
            flagged.human_flag_reason = Some(HumanFlagReason::UncertainVlmResponse);
            flagged
        })
        .collect()
}

/// Hand items a halted batch never audited over to a human.
///
/// They keep no verification, get `MANUAL_REVIEW` as their action and are
/// tagged `AuditHalted`.
pub fn defer_unaudited(pending: &mut [Detection]) {
    for item in pending {
        item.vlm_suggested_action = Some(SuggestedAction::ManualReview);
        item.human_flag_reason = Some(HumanFlagReason::AuditHalted);
    }
}

/// Everything a funnel run produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunnelReport {
    pub stats: PipelineStats,
    /// Confident detections that also matched ground truth.
    pub accepted: Vec<Detection>,
    /// Items routed to the verifier, as they were before auditing.
    pub audit_required: AuditLedger,
    /// Audited items with their verification and suggested action.
    pub final_report: AuditLedger,
    /// Inconclusive audits followed by any unaudited items.
    pub human_review: Vec<Detection>,
    /// Items not audited because the audit batch halted. They are also at
    /// the end of `human_review`.
    pub pending: Vec<Detection>,
    pub aggregated: AggregatedStats,
}

impl FunnelReport {
    /// Write the four JSON artifacts.
    pub fn persist(&self, outputs: &OutputPaths) -> Result<()> {
        self.audit_required.persist(&outputs.audit_required)?;
        self.final_report.persist(&outputs.final_report)?;
        save_json_pretty(&self.human_review, &outputs.human_intervention)?;
        save_json_pretty(&self.aggregated, &outputs.aggregated)?;
        Ok(())
    }
}

/// The funnel with its collaborators wired in.
pub struct FunnelPipeline<S, P, V, L> {
    validator: GroundTruthValidator<S, P>,
    orchestrator: AuditOrchestrator<V, L>,
    confidence_threshold: f64,
}

impl<V: Verifier> FunnelPipeline<LabelDirectory, ImageFileProbe, V, FixedInterval> {
    /// Build the funnel described by `config` around `verifier`.
    ///
    /// Fails up front when the label directory or the class-name file
    /// cannot be used, or when the configuration is out of range.
    pub fn from_config(config: &FunnelConfig, verifier: V) -> Result<Self> {
        config.validate()?;
        let validator = GroundTruthValidator::new(config.open_labels()?, config.load_class_names()?)
            .with_iou_threshold(config.iou_threshold)?;
        let orchestrator =
            AuditOrchestrator::with_limiter(verifier, FixedInterval::new(config.rate_limit()))
                .with_config(config.audit_config());
        Self::new(validator, orchestrator, config.confidence_threshold)
    }
}

impl<S, P, V, L> FunnelPipeline<S, P, V, L>
where
    S: GroundTruthSource,
    P: ImageProbe,
    V: Verifier,
    L: RateLimiter,
{
    pub fn new(
        validator: GroundTruthValidator<S, P>,
        orchestrator: AuditOrchestrator<V, L>,
        confidence_threshold: f64,
    ) -> Result<Self> {
        validate_threshold(confidence_threshold)?;
        Ok(Self {
            validator,
            orchestrator,
            confidence_threshold,
        })
    }

    pub fn validator(&self) -> &GroundTruthValidator<S, P> {
        &self.validator
    }

    /// Run the whole funnel over one batch.
    ///
    /// # Errors
    ///
    /// Only batch-level failures are returned: a failed verifier preflight
    /// or a checkpoint that cannot be written. Per-detection problems are
    /// recorded on the detections. The preflight runs once, before any
    /// other stage.
    pub fn run(&mut self, detections: Vec<Detection>) -> Result<FunnelReport> {
        self.orchestrator.preflight()?;

        let mut stats = PipelineStats::new();
        let aggregated = aggregate(&detections);

        stats.raw_total = detections.len();
        stats.raw_correct = detections
            .iter()
            .filter(|d| self.validator.is_correct(d))
            .count();
        info!(
            raw_total = stats.raw_total,
            raw_correct = stats.raw_correct,
            "raw validation done"
        );

        let triaged = triage(detections, self.confidence_threshold)?;
        stats.filtered_total = triaged.confident.len();

        let (accepted, rejected) = self.validator.partition(triaged.confident);
        stats.filtered_correct = accepted.len();

        let audit_required: AuditLedger = triaged
            .audit_required
            .into_iter()
            .chain(rejected)
            .collect();
        stats.audit_total = audit_required.len();

        let mut batch = self.orchestrator.audit_prepared(audit_required.iter().cloned())?;
        let mut human_review = escalate(batch.audited.iter());
        if !batch.pending.is_empty() {
            warn!(
                pending = batch.pending.len(),
                "audit halted early; unaudited items go to human review"
            );
            defer_unaudited(&mut batch.pending);
            human_review.extend(batch.pending.iter().cloned());
        }

        for item in batch.audited.iter() {
            match item.vlm_verification {
                Some(VlmVerification::Yes) => stats.vlm_passed += 1,
                Some(VlmVerification::No) => stats.vlm_rejected += 1,
                _ => {}
            }
        }
        stats.human_total = human_review.len();
        stats.pending_total = batch.pending.len();
        stats.log_summary();

        Ok(FunnelReport {
            stats,
            accepted,
            audit_required,
            final_report: batch.audited,
            human_review,
            pending: batch.pending,
            aggregated,
        })
    }
}
