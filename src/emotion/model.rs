//! In-process RoBERTa sequence classifier.
//!
//! Expects a Hugging Face style model directory:
//! - `config.json` (architecture + `id2label`)
//! - `tokenizer.json`, or `vocab.json` + `merges.txt` for byte-level BPE
//! - `model.safetensors`, or `pytorch_model.bin`

use std::fs;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{
    Config as RobertaConfig, XLMRobertaForSequenceClassification,
};
use serde_json::Value;
use tokenizers::models::bpe::BPE;
use tokenizers::pre_tokenizers::byte_level::ByteLevel;
use tokenizers::processors::roberta::RobertaProcessing;
use tokenizers::{Tokenizer, TruncationParams};

use super::classifier::{ClassifierError, EmotionClassifier, EmotionResult};

/// RoBERTa reserves `pad_token_id + 1` leading positions.
const ROBERTA_POSITION_OFFSET: usize = 2;

pub struct SequenceClassifier {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    device: Device,
}

/// Token ids for one input after the truncation policy was applied.
#[derive(Debug, Clone)]
pub struct EncodedInput {
    pub ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub truncated: bool,
}

impl SequenceClassifier {
    pub fn load(
        model_dir: &Path,
        max_input_tokens: usize,
        label_override: Option<&[String]>,
    ) -> Result<Self, ClassifierError> {
        let config_path = model_dir.join("config.json");
        let raw = fs::read_to_string(&config_path).map_err(|err| {
            ClassifierError::Load(format!("{}: {}", config_path.display(), err))
        })?;
        let mut config_value: Value = serde_json::from_str(&raw).map_err(|err| {
            ClassifierError::Load(format!("{}: {}", config_path.display(), err))
        })?;

        let labels = resolve_labels(&config_value, label_override)?;
        let max_input_tokens = clamp_to_positions(&config_value, max_input_tokens);
        fill_config_defaults(&mut config_value);
        let config: RobertaConfig = serde_json::from_value(config_value)
            .map_err(|err| ClassifierError::Load(format!("unsupported config.json: {}", err)))?;

        let tokenizer = prepare_tokenizer(load_tokenizer(model_dir)?, max_input_tokens)?;

        let device = Device::Cpu;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaForSequenceClassification::new(labels.len(), &config, vb)
            .map_err(|err| ClassifierError::Load(format!("weights do not match config: {}", err)))?;

        tracing::info!(
            model_dir = %model_dir.display(),
            labels = ?labels,
            max_input_tokens,
            "Emotion classifier loaded"
        );

        Ok(Self {
            model,
            tokenizer,
            labels,
            device,
        })
    }
}

impl EmotionClassifier for SequenceClassifier {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&self, text: &str) -> Result<EmotionResult, ClassifierError> {
        let encoded = encode(&self.tokenizer, text)?;
        if encoded.truncated {
            tracing::debug!(
                kept_tokens = encoded.ids.len(),
                "classifier input truncated"
            );
        }

        let input_ids = Tensor::new(encoded.ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let attention_mask =
            Tensor::new(encoded.attention_mask.as_slice(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;

        let logits = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids)?
            .squeeze(0)?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?;

        EmotionResult::from_logits(&self.labels, &logits)
    }
}

/// Labels ordered by id from `id2label`, or the override if one is given.
fn resolve_labels(
    config: &Value,
    label_override: Option<&[String]>,
) -> Result<Vec<String>, ClassifierError> {
    let mut indexed: Vec<(usize, String)> = config
        .get("id2label")
        .and_then(|v| v.as_object())
        .map(|map| {
            map.iter()
                .filter_map(|(id, label)| {
                    let id = id.parse::<usize>().ok()?;
                    Some((id, label.as_str()?.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();
    indexed.sort_by_key(|(id, _)| *id);

    let model_labels: Vec<String> = if indexed.is_empty() {
        let num_labels = config
            .get("num_labels")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| {
                ClassifierError::Load("config.json has neither id2label nor num_labels".into())
            })?;
        (0..num_labels).map(|i| format!("LABEL_{}", i)).collect()
    } else {
        indexed.into_iter().map(|(_, label)| label).collect()
    };

    match label_override {
        Some(names) if names.len() != model_labels.len() => Err(ClassifierError::Load(format!(
            "classifier.labels has {} entries but the model has {} labels",
            names.len(),
            model_labels.len()
        ))),
        Some(names) => Ok(names.to_vec()),
        None => Ok(model_labels),
    }
}

fn clamp_to_positions(config: &Value, requested: usize) -> usize {
    let Some(max_positions) = config
        .get("max_position_embeddings")
        .and_then(|v| v.as_u64())
    else {
        return requested;
    };
    let usable = (max_positions as usize).saturating_sub(ROBERTA_POSITION_OFFSET);
    if usable > 0 && requested > usable {
        tracing::warn!(
            requested,
            usable,
            "classifier.max_input_tokens exceeds model positions; clamping"
        );
        return usable;
    }
    requested
}

fn fill_config_defaults(config: &mut Value) {
    let Some(map) = config.as_object_mut() else {
        return;
    };
    map.entry("position_embedding_type")
        .or_insert_with(|| Value::String("absolute".to_string()));
    map.entry("pad_token_id").or_insert_with(|| Value::from(1));
}

fn load_tokenizer(model_dir: &Path) -> Result<Tokenizer, ClassifierError> {
    let tokenizer_path = model_dir.join("tokenizer.json");
    if tokenizer_path.exists() {
        return Tokenizer::from_file(&tokenizer_path).map_err(|err| {
            ClassifierError::Load(format!("{}: {}", tokenizer_path.display(), err))
        });
    }

    let vocab = model_dir.join("vocab.json");
    let merges = model_dir.join("merges.txt");
    if !vocab.exists() || !merges.exists() {
        return Err(ClassifierError::Load(format!(
            "no tokenizer.json or vocab.json + merges.txt in {}",
            model_dir.display()
        )));
    }

    let bpe = BPE::from_file(&vocab.to_string_lossy(), &merges.to_string_lossy())
        .build()
        .map_err(|err| ClassifierError::Load(format!("byte-level BPE: {}", err)))?;
    let mut tokenizer = Tokenizer::new(bpe);
    tokenizer.with_pre_tokenizer(Some(ByteLevel::new(false, true, true)));
    tokenizer.with_post_processor(Some(RobertaProcessing::default()));
    Ok(tokenizer)
}

/// Applies the input-length contract: right-side truncation to
/// `max_input_tokens`, no padding.
pub fn prepare_tokenizer(
    mut tokenizer: Tokenizer,
    max_input_tokens: usize,
) -> Result<Tokenizer, ClassifierError> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_input_tokens,
            ..Default::default()
        }))
        .map_err(|err| ClassifierError::Load(format!("truncation: {}", err)))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

pub fn encode(tokenizer: &Tokenizer, text: &str) -> Result<EncodedInput, ClassifierError> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|err| ClassifierError::Tokenize(err.to_string()))?;

    Ok(EncodedInput {
        ids: encoding.get_ids().to_vec(),
        attention_mask: encoding.get_attention_mask().to_vec(),
        truncated: !encoding.get_overflowing().is_empty(),
    })
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>, ClassifierError> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        let bytes = fs::read(&safetensors).map_err(|err| {
            ClassifierError::Load(format!("{}: {}", safetensors.display(), err))
        })?;
        return VarBuilder::from_buffered_safetensors(bytes, DType::F32, device)
            .map_err(|err| ClassifierError::Load(format!("{}: {}", safetensors.display(), err)));
    }

    let pth = model_dir.join("pytorch_model.bin");
    if pth.exists() {
        return VarBuilder::from_pth(&pth, DType::F32, device)
            .map_err(|err| ClassifierError::Load(format!("{}: {}", pth.display(), err)));
    }

    Err(ClassifierError::Load(format!(
        "no model.safetensors or pytorch_model.bin in {}",
        model_dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use candle_nn::VarMap;
    use serde_json::json;

    use super::*;

    /// Writes a one-layer, randomly initialised XLM-RoBERTa classifier with a
    /// word-level tokenizer. Positions allow 8 tokens including `<s>`/`</s>`.
    fn write_tiny_model(dir: &Path) {
        let config = json!({
            "hidden_size": 8,
            "num_hidden_layers": 1,
            "num_attention_heads": 2,
            "intermediate_size": 16,
            "hidden_act": "gelu",
            "hidden_dropout_prob": 0.0,
            "attention_probs_dropout_prob": 0.0,
            "max_position_embeddings": 10,
            "type_vocab_size": 1,
            "vocab_size": 16,
            "layer_norm_eps": 1e-5,
            "pad_token_id": 1,
            "id2label": { "0": "LABEL_0", "1": "LABEL_1", "2": "LABEL_2" }
        });
        fs::write(dir.join("config.json"), config.to_string()).unwrap();

        let tokenizer = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": {
                "type": "RobertaProcessing",
                "sep": ["</s>", 2],
                "cls": ["<s>", 0],
                "trim_offsets": true,
                "add_prefix_space": false
            },
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": {
                    "<s>": 0, "<pad>": 1, "</s>": 2, "<unk>": 3,
                    "i": 4, "am": 5, "feeling": 6, "so": 7, "anxious": 8,
                    "and": 9, "stressed": 10, "recently": 11
                },
                "unk_token": "<unk>"
            }
        });
        fs::write(dir.join("tokenizer.json"), tokenizer.to_string()).unwrap();

        let mut model_config = config;
        fill_config_defaults(&mut model_config);
        let model_config: RobertaConfig = serde_json::from_value(model_config).unwrap();

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        XLMRobertaForSequenceClassification::new(3, &model_config, vb).unwrap();
        varmap.save(dir.join("model.safetensors")).unwrap();
    }

    fn assert_distribution(result: &EmotionResult, labels: &[String]) {
        let keys: Vec<&String> = result.scores.keys().collect();
        assert_eq!(keys, labels.iter().collect::<Vec<_>>());

        let total: f32 = result.scores.values().sum();
        assert!((total - 1.0).abs() < 1e-4, "scores sum to {}", total);

        let best = result.scores[&result.label];
        assert!(result.scores.values().all(|score| *score <= best));
    }

    #[test]
    fn tiny_model_predicts_a_distribution_over_its_labels() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_model(dir.path());

        let classifier = SequenceClassifier::load(dir.path(), 512, None).unwrap();
        assert_eq!(classifier.labels(), ["LABEL_0", "LABEL_1", "LABEL_2"]);

        let result = classifier.predict("i am anxious").unwrap();
        assert_distribution(&result, classifier.labels());

        let again = classifier.predict("i am anxious").unwrap();
        assert_eq!(result, again);
    }

    #[test]
    fn tiny_model_accepts_long_and_empty_inputs() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_model(dir.path());

        // 512 is clamped to the 8 usable positions, so this must not overflow.
        let classifier = SequenceClassifier::load(dir.path(), 512, None).unwrap();

        let long = "i am feeling so anxious and stressed recently ".repeat(20);
        let result = classifier.predict(&long).unwrap();
        assert_distribution(&result, classifier.labels());

        let result = classifier.predict("").unwrap();
        assert_distribution(&result, classifier.labels());
    }

    #[test]
    fn tiny_model_uses_configured_label_names() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_model(dir.path());
        let names = vec![
            "negative".to_string(),
            "neutral".to_string(),
            "positive".to_string(),
        ];

        let classifier = SequenceClassifier::load(dir.path(), 512, Some(&names)).unwrap();
        let result = classifier.predict("i am so stressed").unwrap();

        assert!(names.contains(&result.label));
        assert_distribution(&result, &names);
    }

    fn word_level_tokenizer() -> Tokenizer {
        let tokenizer_json = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": {
                    "[UNK]": 0, "i": 1, "am": 2, "feeling": 3, "so": 4,
                    "anxious": 5, "and": 6, "stressed": 7, "recently": 8
                },
                "unk_token": "[UNK]"
            }
        });
        Tokenizer::from_str(&tokenizer_json.to_string()).unwrap()
    }

    #[test]
    fn long_inputs_are_cut_to_max_tokens() {
        let tokenizer = prepare_tokenizer(word_level_tokenizer(), 4).unwrap();

        let encoded = encode(&tokenizer, "i am feeling so anxious and stressed recently").unwrap();

        assert_eq!(encoded.ids, vec![1, 2, 3, 4]);
        assert_eq!(encoded.attention_mask, vec![1, 1, 1, 1]);
        assert!(encoded.truncated);
    }

    #[test]
    fn short_inputs_are_untouched() {
        let tokenizer = prepare_tokenizer(word_level_tokenizer(), 16).unwrap();

        let encoded = encode(&tokenizer, "i am anxious").unwrap();

        assert_eq!(encoded.ids, vec![1, 2, 5]);
        assert!(!encoded.truncated);
    }

    #[test]
    fn labels_follow_id_order() {
        let config = json!({
            "id2label": { "2": "positive", "0": "negative", "1": "neutral" }
        });
        let labels = resolve_labels(&config, None).unwrap();
        assert_eq!(labels, vec!["negative", "neutral", "positive"]);
    }

    #[test]
    fn labels_fall_back_to_num_labels() {
        let labels = resolve_labels(&json!({ "num_labels": 2 }), None).unwrap();
        assert_eq!(labels, vec!["LABEL_0", "LABEL_1"]);
        assert!(resolve_labels(&json!({}), None).is_err());
    }

    #[test]
    fn label_override_must_match_model_size() {
        let config = json!({
            "id2label": { "0": "LABEL_0", "1": "LABEL_1", "2": "LABEL_2" }
        });
        let names = vec![
            "negative".to_string(),
            "neutral".to_string(),
            "positive".to_string(),
        ];
        assert_eq!(resolve_labels(&config, Some(&names)).unwrap(), names);
        assert!(resolve_labels(&config, Some(&names[..2])).is_err());
    }

    #[test]
    fn max_tokens_are_clamped_to_model_positions() {
        let config = json!({ "max_position_embeddings": 514 });
        assert_eq!(clamp_to_positions(&config, 4096), 512);
        assert_eq!(clamp_to_positions(&config, 128), 128);
        assert_eq!(clamp_to_positions(&json!({}), 4096), 4096);
    }

    #[test]
    fn missing_model_directory_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let err = match SequenceClassifier::load(dir.path(), 512, None) {
            Ok(_) => panic!("empty directory should not load"),
            Err(err) => err,
        };
        assert!(matches!(err, ClassifierError::Load(msg) if msg.contains("config.json")));
    }

    #[test]
    fn missing_tokenizer_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_tokenizer(dir.path()).unwrap_err();
        assert!(matches!(err, ClassifierError::Load(msg) if msg.contains("tokenizer.json")));
    }
}
