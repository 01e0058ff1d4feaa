//! Typed view over the merged `config.yml` + `secrets.yaml` tree.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub classifier: ClassifierSettings,
    pub rag: RagSettings,
    pub llm: LlmSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub file: bool,
    pub file_name: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
            file_name: "server.log".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Directory holding `config.json`, `tokenizer.json` and the weights.
    pub model_dir: String,
    /// Inputs are cut to this many tokens, special tokens included.
    pub max_input_tokens: usize,
    /// Replaces the model's `id2label` names, in id order.
    pub labels: Option<Vec<String>>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            model_dir: "models/twitter-roberta-base-sentiment".to_string(),
            max_input_tokens: 512,
            labels: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub db_path: String,
    pub collection: String,
    pub top_k: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            db_path: "chroma_db/rag.db".to_string(),
            collection: "emotion_kb".to_string(),
            top_k: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Azure,
    OpenRouter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub azure_api_version: String,
    pub openrouter_site_url: Option<String>,
    pub openrouter_app_name: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            timeout_secs: 60,
            temperature: None,
            max_tokens: None,
            azure_api_version: "2024-02-15-preview".to_string(),
            openrouter_site_url: None,
            openrouter_app_name: None,
        }
    }
}
