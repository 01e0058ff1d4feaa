use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::error::ConfigError;
use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_config;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 10] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "access_key",
    "access_token",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "max_input_tokens", "tokenizer"];

type EnvOverride = (&'static str, &'static [&'static str]);

/// Applied after the YAML files are merged. Later entries win, so
/// `EMPATHY_PORT` beats the platform-provided `PORT`.
const SERVER_ENV_OVERRIDES: [EnvOverride; 3] = [
    ("PORT", &["server", "port"]),
    ("EMPATHY_PORT", &["server", "port"]),
    ("EMPATHY_HOST", &["server", "host"]),
];

/// Only the variables of the configured `llm.provider` are read.
const OPENAI_ENV_OVERRIDES: [EnvOverride; 2] = [
    ("OPENAI_API_KEY", &["llm", "api_key"]),
    ("OPENAI_BASE_URL", &["llm", "base_url"]),
];

const AZURE_ENV_OVERRIDES: [EnvOverride; 2] = [
    ("AZURE_OPENAI_API_KEY", &["llm", "api_key"]),
    ("AZURE_OPENAI_DEPLOYMENT", &["llm", "model"]),
];

const OPENROUTER_ENV_OVERRIDES: [EnvOverride; 4] = [
    ("OPENROUTER_API_KEY", &["llm", "api_key"]),
    ("OPENROUTER_BASE_URL", &["llm", "base_url"]),
    ("OPENROUTER_SITE_URL", &["llm", "openrouter_site_url"]),
    ("OPENROUTER_APP_NAME", &["llm", "openrouter_app_name"]),
];

const OPENROUTER_DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("EMPATHY_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    pub fn load_config(&self) -> Result<Value, ConfigError> {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.secrets_path())?;
        let mut merged = deep_merge(&public_config, &secrets_config);
        apply_env_overrides(&mut merged, |key| env::var(key).ok());
        Ok(merged)
    }

    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        let config = self.load_config()?;
        settings_from_value(config)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

pub fn settings_from_value(config: Value) -> Result<Settings, ConfigError> {
    validate_config(&config)?;
    Ok(serde_json::from_value(config)?)
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_yaml::from_str::<Value>(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Object(_) => Ok(value),
        _ => Ok(Value::Object(Map::new())),
    }
}

fn apply_env_overrides<F>(config: &mut Value, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = |key: &str| {
        lookup(key)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
    };

    apply_overrides(config, &SERVER_ENV_OVERRIDES, &env);

    let provider = config
        .pointer("/llm/provider")
        .and_then(Value::as_str)
        .unwrap_or("openai")
        .to_lowercase();

    match provider.as_str() {
        "azure" => {
            apply_overrides(config, &AZURE_ENV_OVERRIDES, &env);
            // Deployments are addressed by URL, not by a model field.
            if let (Some(endpoint), Some(deployment)) =
                (env("AZURE_OPENAI_ENDPOINT"), env("AZURE_OPENAI_DEPLOYMENT"))
            {
                let base_url = format!(
                    "{}/openai/deployments/{}",
                    endpoint.trim_end_matches('/'),
                    deployment
                );
                ensure_object_path(config, &["llm", "base_url"], Value::String(base_url));
            }
        }
        "openrouter" => {
            if config.pointer("/llm/base_url").map_or(true, Value::is_null) {
                ensure_object_path(
                    config,
                    &["llm", "base_url"],
                    Value::String(OPENROUTER_DEFAULT_BASE_URL.to_string()),
                );
            }
            apply_overrides(config, &OPENROUTER_ENV_OVERRIDES, &env);
        }
        _ => apply_overrides(config, &OPENAI_ENV_OVERRIDES, &env),
    }
}

fn apply_overrides<F>(config: &mut Value, overrides: &[EnvOverride], env: &F)
where
    F: Fn(&str) -> Option<String>,
{
    for &(var, path) in overrides {
        let Some(raw) = env(var) else {
            continue;
        };
        let value = match (path.last(), raw.parse::<u64>()) {
            (Some(&"port"), Ok(number)) => Value::from(number),
            _ => Value::String(raw),
        };
        ensure_object_path(config, path, value);
    }
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
