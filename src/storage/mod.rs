//! 存储模块 - 响应缓存与聚合文本存储
//!
//! - **cache**: 外部调用结果的内容寻址缓存（TTL、容量淘汰、快照持久化）
//! - **store**: 运行级 最终键 -> 原文 聚合存储与语言文件读写

pub mod cache;
pub mod store;

pub use cache::{cache_key, CacheEntry, CacheStats, CallKind, ResponseCache};
pub use store::{AggregateTextStore, LocaleWriter, MergeOutcome, MergeStats};
