//! 运行编排器
//!
//! 持有一次运行的全部聚合状态，以受限并发驱动工作单元集合，
//! 按 提取 → 键解析 → 改写 → 校验 → 写回 的顺序推进每个单元，
//! 之后执行可选的翻译阶段并产出运行统计。
//!
//! 单元级失败从不中止整个运行，只记入统计；唯一的运行级致命
//! 错误是配置错误，在处理开始前就已暴露。

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::client::CallClient;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::fs::FileSystem;
use crate::keygen::KeyGenerator;
use crate::pipeline::filters::TextFilter;
use crate::pipeline::scanner::{self, WorkUnit};
use crate::pipeline::transform;
use crate::pipeline::validator::Validator;
use crate::provider::create_provider;
use crate::storage::{AggregateTextStore, LocaleWriter, ResponseCache};

/// 工作单元状态机
///
/// `Failed` 是从任意状态可达的失败终态；否定的校验判定使单元
/// 带着校验诊断进入 `Failed`，文件不会被写回。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Scanned,
    ContentRead,
    Extracted,
    KeysResolved,
    Transformed,
    Validated,
    Written,
    Failed,
}

/// 单个工作单元的处理结果
#[derive(Debug)]
pub struct UnitReport {
    pub path: PathBuf,
    pub state: UnitState,
    /// 合并入聚合存储的文本条数
    pub extracted: usize,
    /// 失败时：到达过的最后状态与错误
    pub error: Option<(UnitState, PipelineError)>,
}

/// 运行统计
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub units_total: usize,
    pub units_processed: usize,
    pub texts_extracted: usize,
    pub texts_translated: usize,
    pub failed_units: Vec<String>,
    pub duration_ms: u64,
}

/// 运行编排器
pub struct Orchestrator {
    config: PipelineConfig,
    client: CallClient,
    cache: Option<Arc<ResponseCache>>,
    keygen: KeyGenerator,
    store: AggregateTextStore,
    filter: TextFilter,
    fs: Arc<dyn FileSystem>,
    validator: Arc<dyn Validator>,
}

impl Orchestrator {
    /// 按配置构造完整管道（工厂选择外部服务，缓存按需启用）
    pub fn new(
        config: PipelineConfig,
        fs: Arc<dyn FileSystem>,
        validator: Arc<dyn Validator>,
    ) -> PipelineResult<Self> {
        let provider = create_provider(&config.provider)?;
        let cache = if config.cache.enabled {
            Some(Arc::new(ResponseCache::new(&config.cache)))
        } else {
            None
        };
        let client = CallClient::new(provider, cache.clone(), &config.provider);
        Ok(Self::with_parts(config, client, cache, fs, validator))
    }

    /// 用现成的客户端组装编排器（测试注入点）
    pub fn with_parts(
        config: PipelineConfig,
        client: CallClient,
        cache: Option<Arc<ResponseCache>>,
        fs: Arc<dyn FileSystem>,
        validator: Arc<dyn Validator>,
    ) -> Self {
        let keygen = KeyGenerator::new(config.keys.clone());
        Self {
            config,
            client,
            cache,
            keygen,
            store: AggregateTextStore::new(),
            filter: TextFilter::new(),
            fs,
            validator,
        }
    }

    /// 处理根目录下的全部工作单元
    pub async fn run(&self, root: &Path) -> PipelineResult<ProcessingStats> {
        let start = Instant::now();
        let mut stats = ProcessingStats::default();
        let writer = LocaleWriter::new(&self.config.output);

        // 增量运行：既有主语言文件恢复键状态，保证键跨运行稳定
        let existing = writer
            .read_locale(self.fs.as_ref(), &self.config.output.source_locale)
            .await;
        if !existing.is_empty() {
            tracing::info!("加载既有语言条目 {} 条", existing.len());
            self.keygen.load_existing(&existing);
            self.store.load_existing(&existing);
        }

        let units = scanner::scan(root, &self.config.scan);
        stats.units_total = units.len();
        tracing::info!("扫描到 {} 个工作单元", units.len());

        // 受限并发：同时在途的单元数不超过配置值，其余排队；
        // 任一单元失败不会取消其它单元
        let semaphore = Semaphore::new(self.config.concurrency);
        let semaphore = &semaphore;
        let tasks = units.into_iter().map(|unit| async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    return UnitReport {
                        path: unit.path.clone(),
                        state: UnitState::Failed,
                        extracted: 0,
                        error: Some((
                            UnitState::Scanned,
                            PipelineError::Internal(format!("获取并发许可失败: {}", e)),
                        )),
                    }
                }
            };
            self.process_unit(unit).await
        });
        let reports = join_all(tasks).await;

        for report in &reports {
            match &report.error {
                None => {
                    stats.units_processed += 1;
                    stats.texts_extracted += report.extracted;
                }
                Some((reached, error)) => {
                    tracing::warn!(
                        "工作单元失败（止于 {:?}）{}: {}",
                        reached,
                        report.path.display(),
                        error
                    );
                    stats.failed_units.push(report.path.display().to_string());
                }
            }
        }

        // 主语言输出：聚合存储本身就是源语言的内容
        let snapshot = self.store.snapshot();
        writer
            .write_locale(
                self.fs.as_ref(),
                &self.config.output.source_locale,
                &snapshot,
            )
            .await?;

        // 翻译阶段：逐目标区域批量翻译，失败批次降级为原文
        if !self.config.output.target_locales.is_empty() && !snapshot.is_empty() {
            let pairs: Vec<(String, String)> = snapshot
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            for locale in &self.config.output.target_locales {
                tracing::info!("开始翻译 {} 条到 {}", pairs.len(), locale);
                let translated = self
                    .client
                    .translate_batch(
                        &pairs,
                        self.config.batch_size,
                        &self.config.output.source_locale,
                        locale,
                    )
                    .await;
                stats.texts_translated += translated.len();

                let map: BTreeMap<String, String> = translated.into_iter().collect();
                writer.write_locale(self.fs.as_ref(), locale, &map).await?;
            }
        }

        // 运行结束的显式收尾：缓存落盘
        if let Some(cache) = &self.cache {
            cache.persist().await;
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        self.log_summary(&stats);
        Ok(stats)
    }

    /// 推进单个工作单元的状态机
    async fn process_unit(&self, unit: WorkUnit) -> UnitReport {
        let mut state = UnitState::Scanned;
        let path = unit.path.clone();
        match self.advance_unit(&unit, &mut state).await {
            Ok(extracted) => UnitReport {
                path,
                state,
                extracted,
                error: None,
            },
            Err(error) => UnitReport {
                path,
                state: UnitState::Failed,
                extracted: 0,
                error: Some((state, error)),
            },
        }
    }

    async fn advance_unit(&self, unit: &WorkUnit, state: &mut UnitState) -> PipelineResult<usize> {
        let content = self.fs.read(&unit.path).await?;
        *state = UnitState::ContentRead;

        let record = self
            .client
            .extract(unit.category.name(), &content)
            .await?;
        *state = UnitState::Extracted;

        if record.texts.is_empty() {
            tracing::debug!("无可提取文本: {}", unit.path.display());
            *state = UnitState::Written;
            return Ok(0);
        }

        // 键解析。键生成本身是同步临界区，占位键按字典序处理，
        // 同一运行内的结果与调度顺序无关（冲突后缀除外）。
        let mut placeholders: Vec<(&String, &String)> = record.texts.iter().collect();
        placeholders.sort();

        let mut mapping: HashMap<String, String> = HashMap::new();
        let mut kept: Vec<(String, String)> = Vec::new();
        for (placeholder, text) in placeholders {
            if self.filter.should_keep(text) {
                let key = self.keygen.generate_key(text);
                mapping.insert(placeholder.clone(), key.clone());
                kept.push((key, text.clone()));
            } else {
                // 非文案内容不进入存储，占位处还原为原文
                tracing::debug!("过滤非文案条目 {:?}", text);
                mapping.insert(placeholder.clone(), text.clone());
            }
        }
        *state = UnitState::KeysResolved;

        let outcome = transform::apply_key_mapping(&record.content, &mapping);
        *state = UnitState::Transformed;

        let verdict = self.validator.validate(&outcome.content, unit.category).await;
        for warning in &verdict.warnings {
            tracing::debug!("校验警告 {}: {}", unit.path.display(), warning);
        }
        if !verdict.valid {
            return Err(PipelineError::Validation {
                errors: verdict.errors,
            });
        }
        *state = UnitState::Validated;

        self.fs.write(&unit.path, &outcome.content).await?;
        *state = UnitState::Written;

        for (key, text) in &kept {
            self.store.merge(key, text);
        }
        Ok(kept.len())
    }

    /// 聚合存储的只读访问（测试与上层报告用）
    pub fn store(&self) -> &AggregateTextStore {
        &self.store
    }

    fn log_summary(&self, stats: &ProcessingStats) {
        let client_stats = self.client.stats();
        tracing::info!(
            "运行完成: 单元 {}/{}，提取 {} 条，翻译 {} 条，耗时 {}ms",
            stats.units_processed,
            stats.units_total,
            stats.texts_extracted,
            stats.texts_translated,
            stats.duration_ms
        );
        if !stats.failed_units.is_empty() {
            tracing::warn!(
                "{} 个单元失败: {}",
                stats.failed_units.len(),
                stats.failed_units.join(", ")
            );
        }
        let merge_warnings = self.store.warnings();
        if !merge_warnings.is_empty() {
            tracing::warn!("合并冲突 {} 次（保留先写者）", merge_warnings.len());
        }
        if let Some(cache) = &self.cache {
            let cache_stats = cache.stats();
            tracing::info!(
                "缓存: 命中率 {:.1}%，{} 条在存",
                cache_stats.hit_rate() * 100.0,
                cache.len()
            );
        }
        tracing::debug!(
            "外部调用 {} 次，重试 {} 次，降级批次 {} 个",
            client_stats
                .calls
                .load(std::sync::atomic::Ordering::Relaxed),
            client_stats
                .retries
                .load(std::sync::atomic::Ordering::Relaxed),
            client_stats
                .degraded_batches
                .load(std::sync::atomic::Ordering::Relaxed)
        );
    }
}
