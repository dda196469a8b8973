//! 聚合文本存储
//!
//! 运行级的 最终键 -> 原文 映射。并发任务的合并顺序不确定，
//! 因此合并必须幂等：相同映射重复写入是空操作，冲突保留先写者。

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::config::OutputConfig;
use crate::error::PipelineResult;
use crate::fs::FileSystem;

/// 单次合并的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// 新键写入
    Inserted,
    /// 相同键相同文本，空操作
    Unchanged,
    /// 相同键不同文本，新映射被丢弃
    Conflict,
}

/// 合并统计
#[derive(Debug, Clone, Default)]
pub struct MergeStats {
    pub inserted: usize,
    pub unchanged: usize,
    pub conflicts: usize,
}

struct StoreInner {
    entries: BTreeMap<String, String>,
    warnings: Vec<String>,
    stats: MergeStats,
}

/// 聚合文本存储
pub struct AggregateTextStore {
    inner: Mutex<StoreInner>,
}

impl AggregateTextStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: BTreeMap::new(),
                warnings: Vec::new(),
                stats: MergeStats::default(),
            }),
        }
    }

    /// 从既有的语言文件内容恢复（增量运行）
    pub fn load_existing(&self, entries: &HashMap<String, String>) {
        let mut inner = self.inner.lock().unwrap();
        for (key, text) in entries {
            inner.entries.insert(key.clone(), text.clone());
        }
    }

    /// 幂等合并一条映射
    ///
    /// 冲突时保留先写者的映射，丢弃新值并记录警告；存储中
    /// 永远不会出现同一键对应两个不同文本。
    pub fn merge(&self, key: &str, text: &str) -> MergeOutcome {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner.entries.get(key).cloned();
        match existing {
            None => {
                inner.entries.insert(key.to_string(), text.to_string());
                inner.stats.inserted += 1;
                MergeOutcome::Inserted
            }
            Some(existing) if existing == text => {
                inner.stats.unchanged += 1;
                MergeOutcome::Unchanged
            }
            Some(existing) => {
                let warning = format!(
                    "键 {:?} 已映射到 {:?}，丢弃冲突的新映射 {:?}",
                    key, existing, text
                );
                tracing::warn!("{}", warning);
                inner.warnings.push(warning);
                inner.stats.conflicts += 1;
                MergeOutcome::Conflict
            }
        }
    }

    /// 当前内容快照（键有序，输出确定性）
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.lock().unwrap().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 合并过程中记录的警告
    pub fn warnings(&self) -> Vec<String> {
        self.inner.lock().unwrap().warnings.clone()
    }

    pub fn stats(&self) -> MergeStats {
        self.inner.lock().unwrap().stats.clone()
    }
}

impl Default for AggregateTextStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 语言文件读写
// ============================================================================

/// 语言文件写入器
pub struct LocaleWriter<'a> {
    output: &'a OutputConfig,
}

impl<'a> LocaleWriter<'a> {
    pub fn new(output: &'a OutputConfig) -> Self {
        Self { output }
    }

    /// 将映射写为一个区域的语言文件
    pub async fn write_locale(
        &self,
        fs: &dyn FileSystem,
        locale: &str,
        entries: &BTreeMap<String, String>,
    ) -> PipelineResult<PathBuf> {
        let path = self.output.locale_path(locale);
        fs.ensure_dir(&self.output.dir).await?;

        let serialized = if self.output.pretty {
            serde_json::to_string_pretty(entries)?
        } else {
            serde_json::to_string(entries)?
        };

        fs.write(&path, &serialized).await?;
        tracing::info!("语言文件已写入: {} ({} 条)", path.display(), entries.len());
        Ok(path)
    }

    /// 读取既有语言文件，文件不存在或无法解析时返回空映射
    pub async fn read_locale(&self, fs: &dyn FileSystem, locale: &str) -> HashMap<String, String> {
        let path = self.output.locale_path(locale);
        if !fs.exists(&path).await {
            return HashMap::new();
        }
        match fs.read(&path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!("语言文件解析失败，忽略既有内容 {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) => {
                tracing::warn!("语言文件读取失败，忽略既有内容: {}", e);
                HashMap::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_idempotent() {
        let store = AggregateTextStore::new();
        assert_eq!(store.merge("k1", "A"), MergeOutcome::Inserted);
        assert_eq!(store.merge("k1", "A"), MergeOutcome::Unchanged);
        assert_eq!(store.len(), 1);
        assert!(store.warnings().is_empty());
    }

    #[test]
    fn test_merge_conflict_keeps_first_writer() {
        let store = AggregateTextStore::new();
        store.merge("k1", "A");
        assert_eq!(store.merge("k1", "B"), MergeOutcome::Conflict);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.get("k1"), Some(&"A".to_string()));
        assert_eq!(store.warnings().len(), 1);
        assert_eq!(store.stats().conflicts, 1);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let store = AggregateTextStore::new();
        store.merge("zhu_ye", "主页");
        store.merge("an_niu", "按钮");
        let keys: Vec<_> = store.snapshot().into_keys().collect();
        assert_eq!(keys, vec!["an_niu".to_string(), "zhu_ye".to_string()]);
    }
}
