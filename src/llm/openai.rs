//! Client for OpenAI-compatible chat-completion and embedding endpoints.
//!
//! One client serves three flavors that differ only in auth headers, URL
//! shape and whether `model` goes into the body: OpenAI itself, Azure
//! OpenAI deployments, and OpenRouter.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::LlmError;
use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::config::{LlmSettings, ProviderKind};
use crate::rag::Embedder;

const DEFAULT_OPENROUTER_SITE_URL: &str = "http://localhost";
const DEFAULT_OPENROUTER_APP_NAME: &str = "Empathy Backend";

#[derive(Clone)]
pub struct OpenAiProvider {
    kind: ProviderKind,
    base_url: String,
    model: String,
    embedding_model: String,
    azure_api_version: String,
    client: Client,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    pub fn new(settings: &LlmSettings) -> anyhow::Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        anyhow::ensure!(
            !api_key.is_empty(),
            "missing LLM API key (set llm.api_key or OPENAI_API_KEY)"
        );
        anyhow::ensure!(!settings.model.trim().is_empty(), "missing LLM model name");

        let headers = build_headers(settings, api_key)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build LLM HTTP client")?;

        Ok(Self {
            kind: settings.provider,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            embedding_model: settings.embedding_model.clone(),
            azure_api_version: settings.azure_api_version.clone(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        match self.kind {
            ProviderKind::Azure => format!(
                "{}/{}?api-version={}",
                self.base_url, path, self.azure_api_version
            ),
            ProviderKind::OpenAi | ProviderKind::OpenRouter => {
                format!("{}/{}", self.base_url, path)
            }
        }
    }

    /// Azure deployments carry the model in the URL and reject it in the body.
    fn with_model(&self, mut body: Value, model: &str) -> Value {
        if self.kind != ProviderKind::Azure {
            if let Some(obj) = body.as_object_mut() {
                obj.insert("model".to_string(), json!(model));
            }
        }
        body
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response, LlmError> {
        let res = self.client.post(url).json(body).send().await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), text));
        }

        Ok(res)
    }
}

fn build_headers(settings: &LlmSettings, api_key: &str) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    match settings.provider {
        ProviderKind::Azure => {
            headers.insert(
                "api-key",
                HeaderValue::from_str(api_key).context("invalid LLM API key")?,
            );
        }
        ProviderKind::OpenAi | ProviderKind::OpenRouter => {
            let auth = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth).context("invalid LLM API key")?,
            );
        }
    }

    if settings.provider == ProviderKind::OpenRouter {
        let site_url = settings
            .openrouter_site_url
            .as_deref()
            .unwrap_or(DEFAULT_OPENROUTER_SITE_URL);
        let app_name = settings
            .openrouter_app_name
            .as_deref()
            .unwrap_or(DEFAULT_OPENROUTER_APP_NAME);
        headers.insert(
            "HTTP-Referer",
            HeaderValue::from_str(site_url).context("invalid OpenRouter site url")?,
        );
        headers.insert(
            "X-Title",
            HeaderValue::from_str(app_name).context("invalid OpenRouter app name")?,
        );
    }

    Ok(headers)
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        match self.kind {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Azure => "azure",
            ProviderKind::OpenRouter => "openrouter",
        }
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError> {
        let url = self.endpoint("chat/completions");

        let mut body = json!({ "messages": request.messages });
        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
        }
        let body = self.with_model(body, &self.model);

        let payload: ChatCompletionResponse = self.post(&url, &body).await?.json().await?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl Embedder for OpenAiProvider {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint("embeddings");
        let body = self.with_model(json!({ "input": inputs }), &self.embedding_model);

        let payload: EmbeddingResponse = self.post(&url, &body).await?.json().await?;

        let mut data = payload.data;
        if data.len() != inputs.len() {
            return Err(LlmError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                data.len()
            )));
        }
        data.sort_by_key(|item| item.index);

        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}
