//! Load prediction from recent history.

/// Predicted load of a node: the arithmetic mean of its window.
///
/// A node with no samples yet is assumed idle.
pub fn predict_load(window: &[u32]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let sum: u64 = window.iter().map(|&v| u64::from(v)).sum();
    sum as f64 / window.len() as f64
}
