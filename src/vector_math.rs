use candle_core::{Device, Tensor};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("vectors must not be empty")]
    Empty,
    #[error("vector length mismatch: {0} != {1}")]
    LengthMismatch(usize, usize),
    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Result<f32, VectorError> {
    if query.is_empty() || candidate.is_empty() {
        return Err(VectorError::Empty);
    }
    if query.len() != candidate.len() {
        return Err(VectorError::LengthMismatch(query.len(), candidate.len()));
    }

    let device = Device::Cpu;
    let query_tensor = Tensor::from_slice(query, query.len(), &device)?;
    let candidate_tensor = Tensor::from_slice(candidate, candidate.len(), &device)?;

    let dot = (&query_tensor * &candidate_tensor)?
        .sum_all()?
        .to_scalar::<f32>()?;

    let query_norm = l2_norm(&query_tensor)?;
    let candidate_norm = l2_norm(&candidate_tensor)?;
    let denom = query_norm * candidate_norm;
    if denom <= f32::EPSILON {
        return Ok(0.0);
    }

    Ok(dot / denom)
}

/// Cosine distance, `1 - cosine_similarity`; 0 for identical directions.
pub fn cosine_distance(query: &[f32], candidate: &[f32]) -> Result<f32, VectorError> {
    Ok(1.0 - cosine_similarity(query, candidate)?)
}

/// Numerically stable softmax over a flat logit vector.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>, VectorError> {
    if logits.is_empty() {
        return Err(VectorError::Empty);
    }
    let tensor = Tensor::from_slice(logits, logits.len(), &Device::Cpu)?;
    let probs = candle_nn::ops::softmax_last_dim(&tensor.unsqueeze(0)?)?.squeeze(0)?;
    Ok(probs.to_vec1::<f32>()?)
}

fn l2_norm(tensor: &Tensor) -> Result<f32, VectorError> {
    let squared = (tensor * tensor)?;
    let norm = squared.sum_all()?.sqrt()?;
    Ok(norm.to_scalar::<f32>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    #[test]
    fn cosine_is_one_for_identical_vectors() {
        let vec = vec![1.0, 2.0, 3.0, 4.0];
        let score = cosine_similarity(&vec, &vec).expect("cosine should work");
        assert!(approx_eq(score, 1.0));
        assert!(approx_eq(cosine_distance(&vec, &vec).unwrap(), 0.0));
    }

    #[test]
    fn cosine_is_zero_for_orthogonal_vectors() {
        let score = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).expect("cosine should work");
        assert!(approx_eq(score, 0.0));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = cosine_similarity(&[1.0, 0.0], &[1.0]).unwrap_err();
        assert!(matches!(err, VectorError::LengthMismatch(2, 1)));
        assert!(matches!(
            cosine_similarity(&[], &[]).unwrap_err(),
            VectorError::Empty
        ));
    }

    #[test]
    fn softmax_sums_to_one_and_keeps_order() {
        let probs = softmax(&[2.0, -1.0, 0.5]).unwrap();
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(probs[0] > probs[2] && probs[2] > probs[1]);
    }

    #[test]
    fn softmax_handles_large_logits() {
        let probs = softmax(&[1000.0, 1000.0]).unwrap();
        assert!(approx_eq(probs[0], 0.5));
        assert!(approx_eq(probs[1], 0.5));
    }
}
