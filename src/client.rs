//! 外部调用客户端
//!
//! 在可插拔的外部服务之上提供：带指数退避的重试、围栏代码块容忍的
//! 结构化响应解析、按批次隔离的部分失败降级，以及调用前的缓存查询。

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::config::ProviderConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::prompts;
use crate::provider::Provider;
use crate::storage::{cache_key, CallKind, ResponseCache};

/// 提取调用的结构化结果
///
/// 占位键只在单个工作单元内有效，跨单元不会复用。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// 占位键 -> 原文
    pub texts: HashMap<String, String>,
    /// 占位键改写后的内容
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct TranslationPayload {
    translations: HashMap<String, String>,
}

/// 客户端统计
#[derive(Debug, Default)]
pub struct ClientStats {
    pub calls: AtomicU64,
    pub retries: AtomicU64,
    pub cache_hits: AtomicU64,
    pub degraded_batches: AtomicU64,
}

/// 外部调用客户端
pub struct CallClient {
    provider: Box<dyn Provider>,
    cache: Option<Arc<ResponseCache>>,
    max_retries: usize,
    retry_base_delay: Duration,
    stats: ClientStats,
}

impl CallClient {
    pub fn new(
        provider: Box<dyn Provider>,
        cache: Option<Arc<ResponseCache>>,
        config: &ProviderConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
            stats: ClientStats::default(),
        }
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// 带重试的调用：初次失败后最多追加 `max_retries` 次，
    /// 重试间隔按 `base * 2^attempt` 指数退避，耗尽后抛出最后一个错误。
    pub async fn invoke_with_retry(
        &self,
        prompt: &str,
        max_retries: usize,
    ) -> PipelineResult<String> {
        let mut last_error = None;

        for attempt in 0..=max_retries {
            self.stats.calls.fetch_add(1, Ordering::Relaxed);
            match self.provider.invoke(prompt).await {
                Ok(raw) => {
                    if attempt > 0 {
                        tracing::info!("{} 调用在第 {} 次重试后成功", self.provider.name(), attempt);
                    }
                    return Ok(raw);
                }
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if attempt < max_retries {
                        let delay = self.retry_base_delay * 2_u32.pow(attempt as u32);
                        tracing::warn!(
                            "{} 调用失败，{:.1}秒后进行第 {} 次重试: {}",
                            self.provider.name(),
                            delay.as_secs_f32(),
                            attempt + 1,
                            e
                        );
                        self.stats.retries.fetch_add(1, Ordering::Relaxed);
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| PipelineError::Internal("重试循环未产生错误".to_string())))
    }

    /// 解析结构化响应
    ///
    /// 容忍响应被围栏代码块包裹；JSON无效或缺少必需字段
    /// 一律视为解析错误，不产出部分结果。
    pub fn parse_structured<T: DeserializeOwned>(&self, raw: &str) -> PipelineResult<T> {
        let payload = extract_json_payload(raw);
        serde_json::from_str(payload).map_err(|e| PipelineError::Parse(e.to_string()))
    }

    /// 提取调用：先查缓存，未命中时调用服务并回填
    pub async fn extract(&self, category: &str, content: &str) -> PipelineResult<ExtractionRecord> {
        let prompt = prompts::extraction_prompt(category, content);
        let key = cache_key(&prompt, CallKind::Extraction);

        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get(&key) {
                match serde_json::from_value::<ExtractionRecord>(value) {
                    Ok(record) => {
                        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(record);
                    }
                    Err(e) => {
                        // 旧格式条目视为未命中
                        tracing::debug!("缓存条目反序列化失败，按未命中处理: {}", e);
                    }
                }
            }
        }

        let raw = self.invoke_with_retry(&prompt, self.max_retries).await?;
        let record: ExtractionRecord = self.parse_structured(&raw)?;

        if let Some(cache) = &self.cache {
            if let Ok(value) = serde_json::to_value(&record) {
                cache.set(&key, value, None);
                cache.persist().await;
            }
        }

        Ok(record)
    }

    /// 批量翻译：按 `batch_size` 分批，失败批次逐项回退为原文
    pub async fn translate_batch(
        &self,
        pairs: &[(String, String)],
        batch_size: usize,
        source_locale: &str,
        target_locale: &str,
    ) -> Vec<(String, String)> {
        self.batch_process(
            pairs,
            batch_size,
            |batch| self.translate_single_batch(batch, source_locale, target_locale),
            |(key, text)| (key.clone(), text.clone()),
        )
        .await
    }

    /// 按固定大小分批处理
    ///
    /// 每个批次对应恰好一次外部调用，失败隔离因此以批次为粒度：
    /// 某批失败（重试耗尽或解析失败）时该批全部条目回退为默认值，
    /// 其余批次不受影响，整个运行不会因此中止。
    pub async fn batch_process<T, U, F, Fut, FB>(
        &self,
        items: &[T],
        batch_size: usize,
        transform: F,
        fallback: FB,
    ) -> Vec<U>
    where
        T: Clone,
        F: Fn(Vec<T>) -> Fut,
        Fut: Future<Output = PipelineResult<Vec<U>>>,
        FB: Fn(&T) -> U,
    {
        let mut results = Vec::with_capacity(items.len());

        for batch in items.chunks(batch_size.max(1)) {
            match transform(batch.to_vec()).await {
                Ok(out) if out.len() == batch.len() => results.extend(out),
                Ok(out) => {
                    tracing::warn!(
                        "批次结果数量不符（期望 {}，实际 {}），整批回退",
                        batch.len(),
                        out.len()
                    );
                    self.stats.degraded_batches.fetch_add(1, Ordering::Relaxed);
                    results.extend(batch.iter().map(&fallback));
                }
                Err(e) => {
                    tracing::warn!("批次处理失败，整批回退: {}", e);
                    self.stats.degraded_batches.fetch_add(1, Ordering::Relaxed);
                    results.extend(batch.iter().map(&fallback));
                }
            }
        }

        results
    }

    /// 翻译一个批次（恰好一次外部调用）
    async fn translate_single_batch(
        &self,
        batch: Vec<(String, String)>,
        source_locale: &str,
        target_locale: &str,
    ) -> PipelineResult<Vec<(String, String)>> {
        let payload: serde_json::Map<String, serde_json::Value> = batch
            .iter()
            .map(|(k, t)| (k.clone(), serde_json::Value::String(t.clone())))
            .collect();
        let payload = serde_json::Value::Object(payload).to_string();
        let prompt = prompts::translation_prompt(source_locale, target_locale, &payload);
        let key = cache_key(&prompt, CallKind::Translation);

        let translations: HashMap<String, String> = {
            let cached = self.cache.as_ref().and_then(|cache| {
                cache.get(&key).and_then(|value| {
                    serde_json::from_value::<HashMap<String, String>>(value).ok()
                })
            });

            match cached {
                Some(map) => {
                    self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                    map
                }
                None => {
                    let raw = self.invoke_with_retry(&prompt, self.max_retries).await?;
                    let parsed: TranslationPayload = self.parse_structured(&raw)?;
                    if let Some(cache) = &self.cache {
                        if let Ok(value) = serde_json::to_value(&parsed.translations) {
                            cache.set(&key, value, None);
                            cache.persist().await;
                        }
                    }
                    parsed.translations
                }
            }
        };

        // 批次内保持输入顺序；服务遗漏的键逐项回退为原文
        Ok(batch
            .into_iter()
            .map(|(k, original)| {
                let translated = translations.get(&k).cloned().unwrap_or_else(|| {
                    tracing::debug!("键 {} 缺少译文，保留原文", k);
                    original.clone()
                });
                (k, translated)
            })
            .collect())
    }
}

/// 从原始响应中取出JSON负载
///
/// 优先取围栏代码块内的内容，否则退回整段文本。
fn extract_json_payload(raw: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("围栏正则恒合法")
    });

    match fence.captures(raw) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(raw),
        None => raw.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_payload_from_fence() {
        let raw = "说明文字\n```json\n{\"a\": 1}\n```\n结尾";
        assert_eq!(extract_json_payload(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_payload_plain() {
        assert_eq!(extract_json_payload("  {\"a\": 1} \n"), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_payload_unlabeled_fence() {
        let raw = "```\n{\"texts\": {}}\n```";
        assert_eq!(extract_json_payload(raw), "{\"texts\": {}}");
    }
}
