//! # Lingo Library
//!
//! 批量处理源文件的国际化管道：调用外部文本转换服务提取内嵌文案、
//! 为每段文本派生稳定键、把结果聚合为语言文件，并容忍外部依赖的
//! 慢速、限流与偶发畸形响应。
//!
//! ## 模块组织
//!
//! - `pipeline` - 扫描、改写、校验与运行编排
//! - `client` - 外部调用客户端（重试、解析、批次降级）
//! - `provider` - 外部服务接入（封闭的服务类型集合）
//! - `storage` - 响应缓存与聚合文本存储
//! - `keygen` - 稳定键派生
//! - `config` - 配置加载与验证
//! - `error` - 统一错误类型
//! - `fs` - 文件系统抽象

pub mod client;
pub mod config;
pub mod error;
pub mod fs;
pub mod keygen;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod storage;

// Re-export commonly used items for convenience
pub use client::{CallClient, ExtractionRecord};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use fs::{FileSystem, LocalFileSystem};
pub use keygen::KeyGenerator;
pub use pipeline::{Orchestrator, ProcessingStats};
pub use provider::{create_provider, Provider, ProviderKind};
pub use storage::{AggregateTextStore, ResponseCache};
