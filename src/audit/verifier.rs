//! External semantic verifier interface and answer normalization.

use crate::error::{Result, VerifierError};
use crate::types::VlmVerification;
use std::path::PathBuf;
use std::time::Duration;

/// Label used in the prompt when a detection has no label.
pub const FALLBACK_LABEL: &str = "object";

/// One question sent to the verifier.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRequest {
    pub image_path: PathBuf,
    pub label: String,
    pub prompt: String,
    /// Upper bound the verifier must respect; exceeding it is reported as
    /// [`VerifierError::Timeout`].
    pub timeout: Option<Duration>,
}

/// Build the yes/no question asked about a predicted label.
pub fn build_prompt(label: &str) -> String {
    format!(
        "You are a quality control expert. An object detector reported a {label}. \
         Is there actually a {label} in this image? Answer only YES or NO."
    )
}

/// An oracle that answers free-text questions about an image.
///
/// Implemented for closures so tests and demos can script answers:
///
/// ```
/// use detection_audit::audit::{Verifier, VerificationRequest};
/// use detection_audit::error::VerifierError;
///
/// let always_yes = |_: &VerificationRequest| -> Result<String, VerifierError> {
///     Ok("Yes".to_string())
/// };
/// assert!(always_yes.preflight().is_ok());
/// ```
pub trait Verifier {
    /// Ask the question in `request` and return the raw answer text.
    fn verify(&self, request: &VerificationRequest) -> std::result::Result<String, VerifierError>;

    /// Check, once per batch, that the verifier can be used at all
    /// (credentials present, endpoint configured).
    fn preflight(&self) -> Result<()> {
        Ok(())
    }
}

impl<F> Verifier for F
where
    F: Fn(&VerificationRequest) -> std::result::Result<String, VerifierError>,
{
    fn verify(&self, request: &VerificationRequest) -> std::result::Result<String, VerifierError> {
        self(request)
    }
}

/// Normalize a free-text answer.
///
/// The answer is trimmed and upper-cased, then split into alphanumeric
/// words. A `YES` word wins over a `NO` word when both appear; any other
/// answer is `UNCERTAIN` with the upper-cased text. Words are matched whole,
/// so `NOT` or `NOTHING` do not count as `NO`.
///
/// # Example
///
/// ```
/// use detection_audit::audit::normalize_answer;
/// use detection_audit::types::VlmVerification;
///
/// assert_eq!(normalize_answer("I believe yes, there is."), VlmVerification::Yes);
/// assert_eq!(normalize_answer("Not sure"), VlmVerification::Uncertain("NOT SURE".into()));
/// ```
pub fn normalize_answer(answer: &str) -> VlmVerification {
    let upper = answer.trim().to_uppercase();
    let has_word = |word: &str| {
        upper
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| token == word)
    };

    if has_word("YES") {
        VlmVerification::Yes
    } else if has_word("NO") {
        VlmVerification::No
    } else {
        VlmVerification::Uncertain(upper)
    }
}
