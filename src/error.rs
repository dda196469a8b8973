//! 管道统一错误处理
//!
//! 提供结构化错误类型和可重试性分类

use thiserror::Error;

/// 管道错误类型
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    /// 配置错误（致命，处理开始前中止）
    #[error("配置错误: {0}")]
    Config(String),

    /// 外部服务调用错误（可重试）
    #[error("服务调用错误: {0}")]
    Provider(String),

    /// 请求速率限制
    #[error("请求速率过快，已达到限制")]
    RateLimited,

    /// 调用超时
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 结构化响应解析错误（不重试）
    #[error("解析错误: {0}")]
    Parse(String),

    /// 缓存错误（本地恢复，不向上传播）
    #[error("缓存错误: {0}")]
    Cache(String),

    /// 校验失败（工作单元级终态）
    #[error("内容校验失败: {errors:?}")]
    Validation { errors: Vec<String> },

    /// 文件写入错误（工作单元级终态）
    #[error("写入错误: {0}")]
    Write(String),

    /// 文件读取错误
    #[error("读取错误: {0}")]
    Read(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl PipelineError {
    /// 检查错误是否可重试
    ///
    /// 只有外部依赖的瞬时故障可重试；解析与配置错误重试没有意义。
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Provider(_) => true,
            PipelineError::Timeout(_) => true,
            PipelineError::RateLimited => true,
            PipelineError::Config(_) => false,
            PipelineError::Parse(_) => false,
            PipelineError::Cache(_) => false,
            PipelineError::Validation { .. } => false,
            PipelineError::Write(_) => false,
            PipelineError::Read(_) => false,
            PipelineError::Serialization(_) => false,
            PipelineError::Internal(_) => false,
        }
    }

    /// 检查错误是否为运行级致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Config(_))
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        PipelineError::Read(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        PipelineError::Serialization(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(error: toml::de::Error) -> Self {
        PipelineError::Config(format!("TOML解析错误: {}", error))
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            PipelineError::Timeout(error.to_string())
        } else {
            PipelineError::Provider(error.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for PipelineError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        PipelineError::Timeout(format!("异步操作超时: {}", error))
    }
}

/// 错误结果类型别名
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PipelineError::Provider("connection reset".into()).is_retryable());
        assert!(PipelineError::Timeout("30s".into()).is_retryable());
        assert!(PipelineError::RateLimited.is_retryable());
        assert!(!PipelineError::Parse("missing field".into()).is_retryable());
        assert!(!PipelineError::Config("bad locale".into()).is_retryable());
        assert!(!PipelineError::Validation { errors: vec!["unbalanced".into()] }.is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(PipelineError::Config("x".into()).is_fatal());
        assert!(!PipelineError::Provider("x".into()).is_fatal());
    }
}
