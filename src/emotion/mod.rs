//! Emotion detection: a pretrained sequence classifier behind a trait so the
//! request path can be exercised without model weights.

mod classifier;
mod model;

pub use classifier::{ClassifierError, EmotionClassifier, EmotionResult};
pub use model::{encode, prepare_tokenizer, EncodedInput, SequenceClassifier};
