//! Query fusion: blend a text embedding with a caller-supplied vector.

use quarry_core::error::{QuarryError, Result};

/// Combine `text` and an optional `custom` vector into one query vector.
///
/// Both inputs are truncated to their shared length, summed component-wise
/// with the given weights, then L2-normalized. A zero-norm sum is returned
/// as is. Without a custom vector, or with an empty one, the text embedding
/// is returned unchanged.
pub fn combine(
    text: &[f32],
    custom: Option<&[f32]>,
    weight_text: f32,
    weight_custom: f32,
) -> Result<Vec<f32>> {
    if !weight_text.is_finite() || !weight_custom.is_finite() {
        return Err(QuarryError::InvalidParameters(format!(
            "fusion weights must be finite (got {}, {})",
            weight_text, weight_custom
        )));
    }

    let Some(custom) = custom.filter(|c| !c.is_empty()) else {
        return Ok(text.to_vec());
    };

    let mut combined: Vec<f32> = text
        .iter()
        .zip(custom.iter())
        .map(|(t, c)| weight_text * t + weight_custom * c)
        .collect();

    let norm = combined
        .iter()
        .map(|x| (*x as f64).powi(2))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        for value in &mut combined {
            *value = (*value as f64 / norm) as f32;
        }
    }

    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_identity_without_custom() {
        let text = vec![3.0, 4.0];
        assert_eq!(combine(&text, None, 0.7, 0.3).unwrap(), text);
    }

    #[test]
    fn test_empty_custom_is_identity() {
        let text = vec![0.0, 1.0, 0.0];
        assert_eq!(combine(&text, Some(&[]), 0.7, 0.3).unwrap(), text);
    }

    #[test]
    fn test_weighted_sum_is_normalized() {
        let fused = combine(&[1.0, 0.0], Some(&[0.0, 1.0]), 0.7, 0.3).unwrap();
        assert!((norm(&fused) - 1.0).abs() < 1e-6);
        // Direction follows the weights.
        assert!((fused[0] / fused[1] - 0.7 / 0.3).abs() < 1e-4);
    }

    #[test]
    fn test_truncates_to_shared_length() {
        let fused = combine(&[1.0, 0.0, 5.0], Some(&[1.0, 0.0]), 0.5, 0.5).unwrap();
        assert_eq!(fused.len(), 2);
        assert!((fused[0] - 1.0).abs() < 1e-6);
        assert_eq!(fused[1], 0.0);
    }

    #[test]
    fn test_zero_norm_is_unnormalized() {
        let fused = combine(&[1.0, -1.0], Some(&[-1.0, 1.0]), 0.5, 0.5).unwrap();
        assert_eq!(fused, vec![0.0, 0.0]);
    }

    #[test]
    fn test_non_finite_weights_rejected() {
        assert!(matches!(
            combine(&[1.0], Some(&[1.0]), f32::INFINITY, 0.3),
            Err(QuarryError::InvalidParameters(_))
        ));
        assert!(matches!(
            combine(&[1.0], None, 0.7, f32::NAN),
            Err(QuarryError::InvalidParameters(_))
        ));
    }
}
