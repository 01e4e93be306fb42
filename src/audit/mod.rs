//! External-verifier audit of detections that failed triage or validation.

pub mod ledger;
pub mod orchestrator;
pub mod rate_limit;
pub mod verifier;

pub use ledger::AuditLedger;
pub use orchestrator::{AuditBatch, AuditConfig, AuditOrchestrator, HaltReason, DEFAULT_RATE_LIMIT};
pub use rate_limit::{FixedInterval, RateLimiter, Unlimited};
pub use verifier::{build_prompt, normalize_answer, VerificationRequest, Verifier, FALLBACK_LABEL};
