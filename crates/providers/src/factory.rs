//! Build the configured model client.

use dossier_config::AppConfig;
use dossier_core::error::ProviderError;
use dossier_core::model::ToolDefinition;
use std::time::Duration;
use tracing::info;

use crate::openai_compat::OpenAiCompatClient;

/// Backends that run locally and accept any API key.
const LOCAL_BACKENDS: &[&str] = &["ollama", "vllm", "llamacpp", "llama.cpp"];

/// Build the client for `config.default_provider`, advertising `tools`.
///
/// Per-provider settings under `[providers.<name>]` take precedence over
/// the top-level defaults.
pub fn build_from_config(
    config: &AppConfig,
    tools: Vec<ToolDefinition>,
) -> Result<OpenAiCompatClient, ProviderError> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .or_else(|| default_base_url(name))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "no api_url for provider '{name}'; set [providers.{name}].api_url"
            ))
        })?;

    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone());
    let api_key = match api_key {
        Some(key) => key,
        None if LOCAL_BACKENDS.contains(&name) => name.to_string(),
        None => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{name}'; set DOSSIER_API_KEY or run `dossier onboard`"
            )));
        }
    };

    let model = provider_config
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone());

    info!(provider = name, model = %model, base_url = %base_url, "Model client configured");

    Ok(OpenAiCompatClient::new(name, base_url, api_key, model)
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens)
        .with_json_mode(config.json_mode)
        .with_http_timeout(Duration::from_secs(config.orchestration.model_timeout_secs))
        .with_tools(tools))
}

/// Get the default base URL for well-known backends.
pub fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "ollama" => "http://localhost:11434/v1",
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "fireworks" => "https://api.fireworks.ai/inference/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.to_string())
}
