//! HTTP 服务实现
//!
//! 两种线协议：OpenAI 兼容的 chat completions 与 Ollama 的 generate。
//! 每次调用的超时由 HTTP 客户端承载。

use async_trait::async_trait;
use serde_json::json;

use crate::config::ProviderConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::provider::Provider;

fn build_client(config: &ProviderConfig) -> PipelineResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| PipelineError::Config(format!("HTTP客户端构建失败: {}", e)))
}

fn status_error(status: reqwest::StatusCode, body: &str) -> PipelineError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        PipelineError::RateLimited
    } else {
        PipelineError::Provider(format!("HTTP {}: {}", status, body))
    }
}

/// OpenAI 兼容的 chat completions 服务
pub struct ChatCompletionProvider {
    client: reqwest::Client,
    name: &'static str,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatCompletionProvider {
    pub fn new(
        config: &ProviderConfig,
        name: &'static str,
        default_url: &str,
    ) -> PipelineResult<Self> {
        Ok(Self {
            client: build_client(config)?,
            name,
            api_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| default_url.to_string()),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Provider for ChatCompletionProvider {
    async fn invoke(&self, prompt: &str) -> PipelineResult<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.2,
        });

        let mut request = self.client.post(&self.api_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let payload: serde_json::Value = response.json().await?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| PipelineError::Provider("响应缺少 choices[0].message.content".to_string()))
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// 本地 Ollama 服务
pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig) -> PipelineResult<Self> {
        Ok(Self {
            client: build_client(config)?,
            api_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434/api/generate".to_string()),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn invoke(&self, prompt: &str) -> PipelineResult<String> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let response = self.client.post(&self.api_url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let payload: serde_json::Value = response.json().await?;
        payload["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| PipelineError::Provider("响应缺少 response 字段".to_string()))
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}
