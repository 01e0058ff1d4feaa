use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vector_math::{self, VectorError};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to load classifier: {0}")]
    Load(String),
    #[error("tokenization failed: {0}")]
    Tokenize(String),
    #[error("inference failed: {0}")]
    Inference(#[from] candle_core::Error),
    #[error("model produced {got} logits for {expected} labels")]
    LabelMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Math(#[from] VectorError),
}

/// Detected emotion plus the full probability distribution over the model's
/// label set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionResult {
    pub label: String,
    pub scores: BTreeMap<String, f32>,
}

impl EmotionResult {
    /// Pairs probabilities with labels by index and picks the arg-max.
    /// Ties go to the lowest index.
    pub fn from_probabilities(
        labels: &[String],
        probabilities: &[f32],
    ) -> Result<Self, ClassifierError> {
        if labels.is_empty() || labels.len() != probabilities.len() {
            return Err(ClassifierError::LabelMismatch {
                expected: labels.len(),
                got: probabilities.len(),
            });
        }

        let mut best = 0;
        for (idx, prob) in probabilities.iter().enumerate() {
            if *prob > probabilities[best] {
                best = idx;
            }
        }

        let scores = labels
            .iter()
            .cloned()
            .zip(probabilities.iter().copied())
            .collect();

        Ok(Self {
            label: labels[best].clone(),
            scores,
        })
    }

    pub fn from_logits(labels: &[String], logits: &[f32]) -> Result<Self, ClassifierError> {
        if labels.len() != logits.len() {
            return Err(ClassifierError::LabelMismatch {
                expected: labels.len(),
                got: logits.len(),
            });
        }
        let probabilities = vector_math::softmax(logits)?;
        Self::from_probabilities(labels, &probabilities)
    }
}

/// A sequence classifier loaded once and shared across requests.
///
/// `predict` is synchronous and CPU-bound; async callers should run it on the
/// blocking pool.
pub trait EmotionClassifier: Send + Sync {
    /// The fixed label set, in model output order.
    fn labels(&self) -> &[String];

    fn predict(&self, text: &str) -> Result<EmotionResult, ClassifierError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec![
            "negative".to_string(),
            "neutral".to_string(),
            "positive".to_string(),
        ]
    }

    #[test]
    fn scores_sum_to_one_and_label_is_argmax() {
        let result = EmotionResult::from_logits(&labels(), &[2.1, 0.3, -1.2]).unwrap();

        let total: f32 = result.scores.values().sum();
        assert!((total - 1.0).abs() < 1e-4);

        let (max_label, _) = result
            .scores
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(&result.label, max_label);
        assert_eq!(result.label, "negative");
    }

    #[test]
    fn score_keys_match_label_set() {
        let result = EmotionResult::from_logits(&labels(), &[0.0, 0.0, 5.0]).unwrap();
        let keys: Vec<&String> = result.scores.keys().collect();
        assert_eq!(keys, vec!["negative", "neutral", "positive"]);
        assert_eq!(result.label, "positive");
    }

    #[test]
    fn ties_resolve_to_first_label() {
        let result = EmotionResult::from_probabilities(&labels(), &[0.4, 0.4, 0.2]).unwrap();
        assert_eq!(result.label, "negative");
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = EmotionResult::from_logits(&labels(), &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::LabelMismatch { expected: 3, got: 2 }
        ));
    }

    #[test]
    fn serializes_as_label_and_scores() {
        let result = EmotionResult::from_probabilities(&labels(), &[0.1, 0.2, 0.7]).unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["label"], "positive");
        assert!(value["scores"]["neutral"].as_f64().is_some());
    }
}
