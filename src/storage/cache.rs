//! 响应缓存模块
//!
//! 外部调用结果的内容寻址缓存：相同 (调用类别, 输入内容) 总是命中相同条目，
//! 支持TTL过期、容量淘汰和单文件快照持久化。
//!
//! 缓存只起参考作用：任何读写或持久化失败都退化为未命中/未保存，
//! 绝不阻断调用方。

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::CacheSettings;

// ============================================================================
// 核心类型
// ============================================================================

/// 调用类别，参与缓存键计算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// 文本提取调用
    Extraction,
    /// 批量翻译调用
    Translation,
}

impl CallKind {
    fn tag(&self) -> &'static str {
        match self {
            CallKind::Extraction => "ext",
            CallKind::Translation => "tr",
        }
    }
}

/// 计算内容寻址缓存键
///
/// 纯函数：相同 (kind, content) 恒产出相同键，支持跨运行记忆。
pub fn cache_key(content: &str, kind: CallKind) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.tag().as_bytes());
    hasher.update(b":");
    hasher.update(content.as_bytes());
    format!("{}:{}", kind.tag(), hasher.finalize().to_hex())
}

/// 缓存条目
///
/// 创建后不可变，只能整体删除或过期。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// 解析后的调用结果
    pub data: serde_json::Value,
    /// 创建时间（毫秒时间戳）
    pub created_at: i64,
    /// 过期时间（毫秒时间戳）
    pub expires_at: i64,
    /// 结果数据的内容哈希，加载时用于完整性校验
    pub content_hash: String,
}

impl CacheEntry {
    fn new(data: serde_json::Value, ttl: Duration, now: i64) -> Self {
        let content_hash = hash_value(&data);
        Self {
            data,
            created_at: now,
            expires_at: now + ttl.as_millis() as i64,
            content_hash,
        }
    }

    /// 检查条目在给定时刻是否已过期
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

fn hash_value(data: &serde_json::Value) -> String {
    let serialized = data.to_string();
    blake3::hash(serialized.as_bytes()).to_hex().to_string()
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub expired: u64,
    pub evictions: u64,
    pub persist_failures: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// ============================================================================
// 缓存实现
// ============================================================================

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// 创建顺序队列，容量淘汰时从最旧的开始
    order: VecDeque<String>,
    stats: CacheStats,
}

/// 响应缓存
pub struct ResponseCache {
    inner: RwLock<CacheInner>,
    default_ttl: Duration,
    max_entries: usize,
    persist_path: Option<PathBuf>,
}

impl ResponseCache {
    /// 按配置创建缓存，持久化开启时从磁盘快照恢复
    pub fn new(settings: &CacheSettings) -> Self {
        let persist_path = if settings.persistent {
            Some(settings.path.clone())
        } else {
            None
        };

        let mut inner = CacheInner {
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStats::default(),
        };

        if let Some(path) = &persist_path {
            if path.exists() {
                match Self::load_snapshot(path) {
                    Ok(loaded) => {
                        tracing::debug!("缓存快照已加载: {} 条", loaded.len());
                        let mut pairs: Vec<(String, CacheEntry)> = loaded.into_iter().collect();
                        pairs.sort_by_key(|(_, e)| e.created_at);
                        for (key, entry) in pairs {
                            inner.order.push_back(key.clone());
                            inner.entries.insert(key, entry);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("缓存快照加载失败，以空缓存继续: {}", e);
                    }
                }
            }
        }

        Self {
            inner: RwLock::new(inner),
            default_ttl: settings.ttl(),
            max_entries: settings.max_entries,
            persist_path,
        }
    }

    /// 创建不持久化的内存缓存
    pub fn in_memory(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                stats: CacheStats::default(),
            }),
            default_ttl,
            max_entries,
            persist_path: None,
        }
    }

    /// 读取缓存项，过期条目在访问时惰性删除
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = now_ms();
        let mut inner = self.inner.write().unwrap();

        let lookup = inner.entries.get(key).map(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.data.clone())
            }
        });

        match lookup {
            Some(Some(data)) => {
                inner.stats.hits += 1;
                Some(data)
            }
            Some(None) => {
                inner.entries.remove(key);
                inner.order.retain(|k| k != key);
                inner.stats.expired += 1;
                inner.stats.misses += 1;
                None
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// 检查键是否存在且未过期
    pub fn has(&self, key: &str) -> bool {
        let now = now_ms();
        let mut inner = self.inner.write().unwrap();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return false,
        };
        if expired {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
            inner.stats.expired += 1;
            false
        } else {
            true
        }
    }

    /// 写入缓存项，超出容量时按创建顺序淘汰最旧条目
    pub fn set(&self, key: &str, data: serde_json::Value, ttl: Option<Duration>) {
        let entry = CacheEntry::new(data, ttl.unwrap_or(self.default_ttl), now_ms());
        let mut inner = self.inner.write().unwrap();

        if inner.entries.insert(key.to_string(), entry).is_some() {
            inner.order.retain(|k| k != key);
        }
        inner.order.push_back(key.to_string());
        inner.stats.sets += 1;

        while inner.entries.len() > self.max_entries {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                inner.stats.evictions += 1;
            } else {
                break;
            }
        }
    }

    /// 删除缓存项
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        inner.order.retain(|k| k != key);
        inner.entries.remove(key).is_some()
    }

    /// 清空缓存
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.entries.clear();
        inner.order.clear();
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 获取统计快照
    pub fn stats(&self) -> CacheStats {
        self.inner.read().unwrap().stats.clone()
    }

    /// 将当前内容整体写回快照文件
    ///
    /// 持久化失败只记录日志，内存缓存继续工作。
    pub async fn persist(&self) {
        let Some(path) = &self.persist_path else {
            return;
        };

        let snapshot: HashMap<String, CacheEntry> = {
            let inner = self.inner.read().unwrap();
            inner.entries.clone()
        };

        let serialized = match serde_json::to_string(&snapshot) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("缓存快照序列化失败: {}", e);
                self.inner.write().unwrap().stats.persist_failures += 1;
                return;
            }
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
        }

        if let Err(e) = tokio::fs::write(path, serialized).await {
            tracing::warn!("缓存快照写入失败: {}", e);
            self.inner.write().unwrap().stats.persist_failures += 1;
        }
    }

    /// 加载快照文件，跳过已过期和校验失败的条目
    fn load_snapshot(path: &Path) -> Result<HashMap<String, CacheEntry>, String> {
        let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let parsed: HashMap<String, CacheEntry> =
            serde_json::from_str(&raw).map_err(|e| e.to_string())?;

        let now = now_ms();
        let mut result = HashMap::new();
        for (key, entry) in parsed {
            if entry.is_expired(now) {
                continue;
            }
            if hash_value(&entry.data) != entry.content_hash {
                tracing::warn!("缓存条目完整性校验失败，已跳过: {}", key);
                continue;
            }
            result.insert(key, entry);
        }
        Ok(result)
    }
}
