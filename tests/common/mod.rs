// 集成测试公共模块
//
// 提供脚本化的模拟服务、响应构造器和测试配置

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use lingo::config::PipelineConfig;
use lingo::error::{PipelineError, PipelineResult};
use lingo::fs::{FileSystem, LocalFileSystem};
use lingo::provider::Provider;

/// 脚本化的模拟服务
///
/// 处理函数收到 (调用序号, 提示词)，返回原始响应或错误。
pub struct MockProvider {
    handler: Box<dyn Fn(usize, &str) -> PipelineResult<String> + Send + Sync>,
    calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(usize, &str) -> PipelineResult<String> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 每次调用都失败的服务
    pub fn always_failing() -> Self {
        Self::new(|_, _| Err(PipelineError::Provider("simulated outage".to_string())))
    }

    /// 调用计数器句柄（装箱给客户端前克隆出来）
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn invoke(&self, prompt: &str) -> PipelineResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(n, prompt)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// 构造一个提取调用的JSON响应
pub fn extraction_response(texts: &[(&str, &str)], content: &str) -> String {
    let texts: serde_json::Map<String, serde_json::Value> = texts
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    serde_json::json!({ "texts": texts, "content": content }).to_string()
}

/// 构造一个围栏包裹的翻译调用响应
pub fn translation_response(pairs: &[(&str, &str)]) -> String {
    let translations: serde_json::Map<String, serde_json::Value> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    format!(
        "```json\n{}\n```",
        serde_json::json!({ "translations": translations })
    )
}

/// 测试用基础配置：重试间隔极短，缓存默认关闭
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.provider.retry_base_delay_ms = 1;
    config.provider.max_retries = 1;
    config.cache.enabled = false;
    config.cache.persistent = false;
    config
}

/// 源文件写回失败的文件系统包装器
///
/// 语言文件（.json）照常写入，其余写入模拟磁盘错误。
pub struct SourceWriteFailFs {
    inner: LocalFileSystem,
}

impl SourceWriteFailFs {
    pub fn new() -> Self {
        Self {
            inner: LocalFileSystem,
        }
    }
}

#[async_trait]
impl FileSystem for SourceWriteFailFs {
    async fn read(&self, path: &Path) -> PipelineResult<String> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, content: &str) -> PipelineResult<()> {
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            return self.inner.write(path, content).await;
        }
        Err(PipelineError::Write(format!(
            "{}: simulated disk failure",
            path.display()
        )))
    }

    async fn ensure_dir(&self, path: &Path) -> PipelineResult<()> {
        self.inner.ensure_dir(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path).await
    }
}
