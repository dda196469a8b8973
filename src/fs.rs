//! 文件系统抽象
//!
//! 管道经由该接口读写文件，失败以工作单元级错误浮出；
//! 测试可注入内存实现。

use std::path::Path;

use async_trait::async_trait;

use crate::error::{PipelineError, PipelineResult};

/// 文件系统协作者
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn read(&self, path: &Path) -> PipelineResult<String>;
    async fn write(&self, path: &Path, content: &str) -> PipelineResult<()>;
    async fn ensure_dir(&self, path: &Path) -> PipelineResult<()>;
    async fn exists(&self, path: &Path) -> bool;
}

/// 本地文件系统实现
#[derive(Debug, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read(&self, path: &Path) -> PipelineResult<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::Read(format!("{}: {}", path.display(), e)))
    }

    async fn write(&self, path: &Path, content: &str) -> PipelineResult<()> {
        tokio::fs::write(path, content)
            .await
            .map_err(|e| PipelineError::Write(format!("{}: {}", path.display(), e)))
    }

    async fn ensure_dir(&self, path: &Path) -> PipelineResult<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| PipelineError::Write(format!("{}: {}", path.display(), e)))
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}
