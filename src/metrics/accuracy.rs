//! Pass-rate helpers for funnel stage summaries.

/// Percentage of `correct` out of `total`, or 0.0 when `total` is 0.
///
/// # Example
///
/// ```
/// use detection_audit::metrics::accuracy::accuracy_percent;
///
/// assert_eq!(accuracy_percent(3, 4), 75.0);
/// assert_eq!(accuracy_percent(0, 0), 0.0);
/// ```
pub fn accuracy_percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 / total as f64 * 100.0
}
