//! 外部文本转换服务接入层
//!
//! 服务类型是封闭集合，由配置枚举经工厂选择，全部实现同一个
//! `Provider` 能力；网络、超时、限流错误均视为可重试。

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::error::PipelineResult;

pub use http::{ChatCompletionProvider, OllamaProvider};

/// 外部服务协作者
#[async_trait]
pub trait Provider: Send + Sync {
    /// 发送提示词并返回原始文本响应
    async fn invoke(&self, prompt: &str) -> PipelineResult<String>;

    /// 服务名（用于日志）
    fn name(&self) -> &'static str;
}

/// 服务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI 兼容的 chat completions 接口
    #[default]
    OpenAi,
    /// DeepSeek（同一线协议，不同默认地址）
    DeepSeek,
    /// 本地 Ollama
    Ollama,
}

/// 按配置构造服务实例
pub fn create_provider(config: &ProviderConfig) -> PipelineResult<Box<dyn Provider>> {
    let provider: Box<dyn Provider> = match config.kind {
        ProviderKind::OpenAi => Box::new(ChatCompletionProvider::new(
            config,
            "openai",
            "https://api.openai.com/v1/chat/completions",
        )?),
        ProviderKind::DeepSeek => Box::new(ChatCompletionProvider::new(
            config,
            "deepseek",
            "https://api.deepseek.com/chat/completions",
        )?),
        ProviderKind::Ollama => Box::new(OllamaProvider::new(config)?),
    };
    Ok(provider)
}
