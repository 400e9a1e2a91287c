//! Ollama client plus the captioning and analysis providers built on it

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::types::Ambiguities;

use super::analysis::{ambiguities_from_value, parse_json_response, AnalysisProvider};
use super::prompt::PromptBuilder;
use super::vision::ImageSummarizer;

/// Ollama API client with retry for text generation
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: LlmConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_retries = self.config.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt < max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            error = %e,
                            "Request failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::collaborator("Unknown error")))
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// One `/api/generate` call
    async fn generate_once(
        &self,
        model: &str,
        prompt: &str,
        format: Option<&str>,
        images: Option<Vec<String>>,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url);
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            format,
            images,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::collaborator(format!("Generation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::collaborator(format!(
                "Generation failed: HTTP {} - {}",
                status, body
            )));
        }

        let generate_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| {
                Error::collaborator(format!("Failed to parse generation response: {}", e))
            })?;

        Ok(generate_response.response)
    }

    /// JSON-mode generation with retry, parsed into a value
    pub async fn generate_json(&self, prompt: &str) -> Result<Value> {
        let model = self.config.analysis_model.as_str();
        tracing::debug!(model, prompt_chars = prompt.len(), "Generating JSON");

        let raw = self
            .retry_request(|| self.generate_once(model, prompt, Some("json"), None))
            .await?;
        parse_json_response(&raw)
    }

    /// Describe an image with the vision model; single attempt
    pub async fn describe_image(&self, prompt: &str, image: &[u8]) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let text = self
            .generate_once(&self.config.vision_model, prompt, None, Some(vec![encoded]))
            .await?;
        Ok(text.trim().to_string())
    }
}

/// Captions images with a multimodal Ollama model
pub struct OllamaVision {
    client: Arc<OllamaClient>,
}

impl OllamaVision {
    pub fn from_client(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageSummarizer for OllamaVision {
    async fn summarize_image(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            Error::collaborator(format!("Failed to read image {}: {}", path.display(), e))
        })?;
        self.client
            .describe_image(PromptBuilder::caption_prompt(), &bytes)
            .await
    }

    fn name(&self) -> &str {
        "ollama-vision"
    }
}

/// Runs the three analysis calls with JSON-mode generation
pub struct OllamaAnalyst {
    client: Arc<OllamaClient>,
}

impl OllamaAnalyst {
    pub fn from_client(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnalysisProvider for OllamaAnalyst {
    async fn analyze_requirements(&self, corpus: &str) -> Result<Value> {
        let value = self
            .client
            .generate_json(&PromptBuilder::requirements_prompt(corpus))
            .await?;
        if !value.is_object() {
            return Err(Error::collaborator("Requirements response is not a JSON object"));
        }
        Ok(value)
    }

    async fn identify_ambiguities(&self, requirements: &Value) -> Result<Ambiguities> {
        let value = self
            .client
            .generate_json(&PromptBuilder::ambiguities_prompt(requirements))
            .await?;
        ambiguities_from_value(&value)
    }

    async fn recommend_tech_stack(&self, requirements: &Value) -> Result<Value> {
        self.client
            .generate_json(&PromptBuilder::tech_stack_prompt(requirements))
            .await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_shape() {
        let request = GenerateRequest {
            model: "llava:7b",
            prompt: "describe",
            stream: false,
            format: None,
            images: Some(vec!["aGVsbG8=".to_string()]),
            options: GenerateOptions { temperature: 0.3 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llava:7b");
        assert_eq!(json["stream"], false);
        assert!(json.get("format").is_none());
        assert_eq!(json["images"][0], "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_after_retries() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            max_retries: 0,
            ..LlmConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();

        assert!(!client.health_check().await.unwrap());
        let result = client.generate_json("prompt").await;
        assert!(matches!(result, Err(Error::Collaborator(_))));
    }

    #[tokio::test]
    async fn test_vision_missing_image_is_collaborator_error() {
        let client = Arc::new(OllamaClient::new(&LlmConfig::default()).unwrap());
        let vision = OllamaVision::from_client(client);
        let result = vision.summarize_image(Path::new("/nonexistent/image.png")).await;
        assert!(matches!(result, Err(Error::Collaborator(_))));
    }
}
