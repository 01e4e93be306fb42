//! Drives audit-required detections through the external verifier.
//!
//! Each item moves through `Pending -> Verified -> Disposed`: the verifier's
//! answer is normalized into a [`VlmVerification`] and mapped to a
//! [`SuggestedAction`](crate::types::SuggestedAction). Verifier failures and
//! missing images are outcomes, never errors, so one bad item cannot stop
//! a batch.

use super::ledger::AuditLedger;
use super::rate_limit::{FixedInterval, RateLimiter};
use super::verifier::{build_prompt, normalize_answer, VerificationRequest, Verifier, FALLBACK_LABEL};
use crate::error::Result;
use crate::types::{Detection, VlmVerification};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default spacing between verifier calls.
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_secs(1);

/// Knobs for a batch audit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditConfig {
    /// Timeout handed to the verifier with every request.
    pub verifier_timeout: Option<Duration>,
    /// Stop the batch after this many `ERROR` outcomes in a row.
    pub max_consecutive_errors: Option<usize>,
    /// Rewrite the audited prefix to this file after every item.
    pub checkpoint_path: Option<PathBuf>,
}

/// Why a batch stopped before auditing every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    ConsecutiveErrors(usize),
}

/// Result of [`AuditOrchestrator::audit_batch`].
///
/// Every input item is in exactly one of `audited` or `pending`, in input
/// order. `pending` is only non-empty when the batch was halted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditBatch {
    pub audited: AuditLedger,
    pub pending: Vec<Detection>,
    pub halted: Option<HaltReason>,
}

impl AuditBatch {
    pub fn is_complete(&self) -> bool {
        self.halted.is_none() && self.pending.is_empty()
    }
}

/// Sequential, rate-limited auditor.
pub struct AuditOrchestrator<V, L = FixedInterval> {
    verifier: V,
    limiter: L,
    config: AuditConfig,
}

impl<V: Verifier> AuditOrchestrator<V, FixedInterval> {
    /// Orchestrator with the default one-second spacing between calls.
    pub fn new(verifier: V) -> Self {
        Self::with_limiter(verifier, FixedInterval::new(DEFAULT_RATE_LIMIT))
    }
}

impl<V: Verifier, L: RateLimiter> AuditOrchestrator<V, L> {
    pub fn with_limiter(verifier: V, limiter: L) -> Self {
        Self {
            verifier,
            limiter,
            config: AuditConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AuditConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Batch-level readiness check of the verifier.
    pub fn preflight(&self) -> Result<()> {
        self.verifier.preflight()
    }

    /// Obtain a verification for one item without modifying it.
    ///
    /// Items whose image is not a file on disk get `IMAGE_NOT_FOUND` without
    /// a verifier call or a rate-limiter wait. With `verifier_timeout` set,
    /// an answer that arrives after the timeout is discarded as `ERROR`.
    pub fn verify_item(&mut self, item: &Detection) -> VlmVerification {
        if !item.image_path.is_file() {
            warn!(image = %item.image_path.display(), "skipping missing image");
            return VlmVerification::ImageNotFound;
        }

        let label = item.label.as_deref().unwrap_or(FALLBACK_LABEL);
        let request = VerificationRequest {
            image_path: item.image_path.clone(),
            label: label.to_owned(),
            prompt: build_prompt(label),
            timeout: self.config.verifier_timeout,
        };

        self.limiter.acquire();
        debug!(image = %item.image_path.display(), label, "auditing");

        let started = Instant::now();
        let result = self.verifier.verify(&request);
        let elapsed = started.elapsed();

        match result {
            Ok(_) if self.config.verifier_timeout.is_some_and(|limit| elapsed > limit) => {
                warn!(
                    image = %item.image_path.display(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "verifier answered after the timeout; discarding answer"
                );
                VlmVerification::Error
            }
            Ok(answer) => normalize_answer(&answer),
            Err(e) => {
                warn!(image = %item.image_path.display(), error = %e, "verifier call failed");
                VlmVerification::Error
            }
        }
    }

    /// Audit one item: set `vlm_verification` and `vlm_suggested_action`.
    ///
    /// Running this again on an already audited item with the same verifier
    /// answer produces the same annotations.
    pub fn audit_one(&mut self, mut item: Detection) -> Detection {
        let verification = self.verify_item(&item);
        item.vlm_suggested_action = Some(verification.suggested_action());
        item.vlm_verification = Some(verification);
        item
    }

    /// Audit items in order.
    ///
    /// Calls [`preflight`](Self::preflight) once before the first item. When
    /// `max_consecutive_errors` is reached the remaining items are returned
    /// untouched in `pending`. With a checkpoint path configured the audited
    /// prefix is rewritten atomically after each item.
    ///
    /// # Errors
    ///
    /// Returns an error if the preflight fails or a checkpoint cannot be
    /// written.
    pub fn audit_batch<I>(&mut self, items: I) -> Result<AuditBatch>
    where
        I: IntoIterator<Item = Detection>,
    {
        self.preflight()?;
        self.audit_prepared(items)
    }

    /// [`audit_batch`](Self::audit_batch) for callers that already ran the
    /// preflight.
    pub(crate) fn audit_prepared<I>(&mut self, items: I) -> Result<AuditBatch>
    where
        I: IntoIterator<Item = Detection>,
    {
        let mut batch = AuditBatch::default();
        let mut consecutive_errors = 0usize;
        let mut items = items.into_iter();

        while let Some(item) = items.next() {
            let audited = self.audit_one(item);

            match audited.vlm_verification {
                Some(VlmVerification::Error) => consecutive_errors += 1,
                Some(VlmVerification::ImageNotFound) => {}
                _ => consecutive_errors = 0,
            }
            batch.audited.push(audited);

            if let Some(path) = &self.config.checkpoint_path {
                batch.audited.persist(path)?;
            }

            if let Some(limit) = self.config.max_consecutive_errors {
                if consecutive_errors >= limit {
                    warn!(consecutive_errors, "halting audit after repeated verifier failures");
                    batch.halted = Some(HaltReason::ConsecutiveErrors(consecutive_errors));
                    batch.pending.extend(items.by_ref());
                    break;
                }
            }
        }

        info!(
            audited = batch.audited.len(),
            pending = batch.pending.len(),
            "audit batch finished"
        );
        Ok(batch)
    }
}
