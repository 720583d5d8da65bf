/// Results scoring below this are flagged as low-confidence
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.75;

/// Confidence score from the transcription stage's average token probability
pub fn score(average_probability: f64) -> f64 {
    if average_probability.is_finite() {
        average_probability.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Mean over chunks that reported a confidence at all
pub fn combine(chunk_confidences: &[f64]) -> f64 {
    let reported: Vec<f64> = chunk_confidences
        .iter()
        .copied()
        .filter(|c| c.is_finite() && *c > 0.0)
        .collect();

    if reported.is_empty() {
        0.0
    } else {
        reported.iter().sum::<f64>() / reported.len() as f64
    }
}

pub fn is_low(score: f64, threshold: f64) -> bool {
    score < threshold
}
