//! 管道端到端集成测试
//!
//! 用脚本化的模拟服务走完 扫描 → 提取 → 键解析 → 改写 → 校验 →
//! 写回 → 聚合 → 翻译 的完整流程

use std::path::Path;
use std::sync::Arc;

use lingo::client::CallClient;
use lingo::config::PipelineConfig;
use lingo::fs::{FileSystem, LocalFileSystem};
use lingo::pipeline::{Orchestrator, StructuralValidator};

mod common {
    include!("common/mod.rs");
}

use common::{extraction_response, test_config, translation_response, MockProvider, SourceWriteFailFs};

fn orchestrator_with(
    config: PipelineConfig,
    provider: MockProvider,
    fs: Arc<dyn FileSystem>,
) -> Orchestrator {
    let client = CallClient::new(Box::new(provider), None, &config.provider);
    Orchestrator::with_parts(config, client, None, fs, Arc::new(StructuralValidator))
}

fn config_for(root: &Path) -> PipelineConfig {
    let mut config = test_config();
    config.keys.max_length = 10;
    config.output.dir = root.join("locales");
    config
}

fn read_locale(root: &Path, locale: &str) -> serde_json::Value {
    let raw = std::fs::read_to_string(root.join("locales").join(format!("{}.json", locale)))
        .expect("locale file should exist");
    serde_json::from_str(&raw).expect("locale file should be valid JSON")
}

/// 端到端基线：占位映射 {"__P1__": "提交"} 产出键 ti_jiao、
/// 改写后的内容和对应的聚合条目
#[tokio::test]
async fn test_end_to_end_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::write(root.join("src/form.ts"), r#"call("提交")"#).unwrap();

    let provider = MockProvider::new(|_, _| {
        Ok(extraction_response(
            &[("__P1__", "提交")],
            r#"call("__P1__")"#,
        ))
    });
    let orchestrator = orchestrator_with(config_for(root), provider, Arc::new(LocalFileSystem));

    let stats = orchestrator.run(root).await.expect("run should succeed");

    assert_eq!(stats.units_total, 1);
    assert_eq!(stats.units_processed, 1);
    assert_eq!(stats.texts_extracted, 1);
    assert!(stats.failed_units.is_empty());

    let rewritten = std::fs::read_to_string(root.join("src/form.ts")).unwrap();
    assert_eq!(rewritten, r#"call("ti_jiao")"#);

    let locale = read_locale(root, "zh-CN");
    assert_eq!(locale, serde_json::json!({"ti_jiao": "提交"}));
    println!("✅ End-to-end extraction passed - ti_jiao derived, content rewritten, store merged");
}

/// 否定校验判定使单元失败，文件不被写回，运行继续
#[tokio::test]
async fn test_validation_failure_blocks_write() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(root.join("broken.ts"), r#"call("提交")"#).unwrap();

    // 服务返回了括号不配对的改写内容
    let provider = MockProvider::new(|_, _| {
        Ok(extraction_response(
            &[("__P1__", "提交")],
            r#"call("__P1__") }"#,
        ))
    });
    let orchestrator = orchestrator_with(config_for(root), provider, Arc::new(LocalFileSystem));

    let stats = orchestrator.run(root).await.expect("run itself must not abort");

    assert_eq!(stats.units_processed, 0);
    assert_eq!(stats.failed_units.len(), 1);

    // 原文件保持原样
    let untouched = std::fs::read_to_string(root.join("broken.ts")).unwrap();
    assert_eq!(untouched, r#"call("提交")"#);

    // 失败单元不产生聚合条目
    assert_eq!(read_locale(root, "zh-CN"), serde_json::json!({}));
}

/// 翻译阶段：成功的区域得到译文，失败的区域整批回退为原文，
/// 两者都不计入失败单元
#[tokio::test]
async fn test_translation_phase_with_batch_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(root.join("ui.ts"), r#"t("提交");t("取消")"#).unwrap();

    let provider = MockProvider::new(|_, prompt| {
        if prompt.contains("待翻译内容") {
            if prompt.contains("ja-JP") {
                return Err(lingo::error::PipelineError::Provider(
                    "simulated outage".to_string(),
                ));
            }
            return Ok(translation_response(&[
                ("ti_jiao", "Submit"),
                ("qu_xiao", "Cancel"),
            ]));
        }
        Ok(extraction_response(
            &[("__T0__", "提交"), ("__T1__", "取消")],
            r#"t("__T0__");t("__T1__")"#,
        ))
    });

    let mut config = config_for(root);
    config.output.target_locales = vec!["en-US".to_string(), "ja-JP".to_string()];
    let orchestrator = orchestrator_with(config, provider, Arc::new(LocalFileSystem));

    let stats = orchestrator.run(root).await.expect("run should succeed");

    assert!(stats.failed_units.is_empty(), "Batch degradation is not a unit failure");
    assert_eq!(stats.texts_translated, 4);

    let en = read_locale(root, "en-US");
    assert_eq!(
        en,
        serde_json::json!({"qu_xiao": "Cancel", "ti_jiao": "Submit"})
    );

    // 失败区域的文件仍然写出，内容为原文
    let ja = read_locale(root, "ja-JP");
    assert_eq!(ja, serde_json::json!({"qu_xiao": "取消", "ti_jiao": "提交"}));
    println!("✅ Translation phase passed - en translated, ja degraded to source text");
}

/// 相同文本跨单元复用同一个键，聚合合并幂等
#[tokio::test]
async fn test_duplicate_text_across_units_reuses_key() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(root.join("a.ts"), r#"t("提交")"#).unwrap();
    std::fs::write(root.join("b.ts"), r#"t("提交")"#).unwrap();

    let provider = MockProvider::new(|_, _| {
        Ok(extraction_response(&[("__T0__", "提交")], r#"t("__T0__")"#))
    });
    let orchestrator = orchestrator_with(config_for(root), provider, Arc::new(LocalFileSystem));

    let stats = orchestrator.run(root).await.expect("run should succeed");

    assert_eq!(stats.units_processed, 2);
    let locale = read_locale(root, "zh-CN");
    assert_eq!(locale, serde_json::json!({"ti_jiao": "提交"}));

    for file in ["a.ts", "b.ts"] {
        let content = std::fs::read_to_string(root.join(file)).unwrap();
        assert_eq!(content, r#"t("ti_jiao")"#);
    }
}

/// 写回失败是单元级错误：记入统计，不影响其它单元与聚合输出
#[tokio::test]
async fn test_write_error_records_unit_failure() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(root.join("c.ts"), r#"t("提交")"#).unwrap();

    let provider = MockProvider::new(|_, _| {
        Ok(extraction_response(&[("__T0__", "提交")], r#"t("__T0__")"#))
    });
    let orchestrator =
        orchestrator_with(config_for(root), provider, Arc::new(SourceWriteFailFs::new()));

    let stats = orchestrator.run(root).await.expect("run should succeed");

    assert_eq!(stats.units_processed, 0);
    assert_eq!(stats.failed_units.len(), 1);
    // 写回失败的单元不贡献聚合条目
    assert_eq!(read_locale(root, "zh-CN"), serde_json::json!({}));
}

/// 增量运行：既有语言文件中的键保持稳定
#[tokio::test]
async fn test_incremental_run_preserves_existing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(root.join("d.ts"), r#"t("提交")"#).unwrap();
    std::fs::create_dir_all(root.join("locales")).unwrap();
    std::fs::write(
        root.join("locales/zh-CN.json"),
        r#"{"custom_key": "提交"}"#,
    )
    .unwrap();

    let provider = MockProvider::new(|_, _| {
        Ok(extraction_response(&[("__T0__", "提交")], r#"t("__T0__")"#))
    });
    let orchestrator = orchestrator_with(config_for(root), provider, Arc::new(LocalFileSystem));

    orchestrator.run(root).await.expect("run should succeed");

    // 既有键被复用，不另生成 ti_jiao
    let content = std::fs::read_to_string(root.join("d.ts")).unwrap();
    assert_eq!(content, r#"t("custom_key")"#);
    let locale = read_locale(root, "zh-CN");
    assert_eq!(locale, serde_json::json!({"custom_key": "提交"}));
}

/// 非文案条目被过滤：占位处还原原文，不进入聚合存储
#[tokio::test]
async fn test_filtered_items_restored_inline() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(root.join("e.ts"), r#"t("提交");t("12345")"#).unwrap();

    let provider = MockProvider::new(|_, _| {
        Ok(extraction_response(
            &[("__T0__", "提交"), ("__T1__", "12345")],
            r#"t("__T0__");t("__T1__")"#,
        ))
    });
    let orchestrator = orchestrator_with(config_for(root), provider, Arc::new(LocalFileSystem));

    let stats = orchestrator.run(root).await.expect("run should succeed");

    assert_eq!(stats.texts_extracted, 1, "Only the real text reaches the store");
    let content = std::fs::read_to_string(root.join("e.ts")).unwrap();
    assert_eq!(content, r#"t("ti_jiao");t("12345")"#);
    assert_eq!(read_locale(root, "zh-CN"), serde_json::json!({"ti_jiao": "提交"}));
}

/// 无可提取文本的单元正常完成且不改写文件
#[tokio::test]
async fn test_unit_without_texts_is_left_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(root.join("plain.ts"), "export const n = 1;").unwrap();

    let provider =
        MockProvider::new(|_, _| Ok(extraction_response(&[], "export const n = 1;")));
    let orchestrator = orchestrator_with(config_for(root), provider, Arc::new(LocalFileSystem));

    let stats = orchestrator.run(root).await.expect("run should succeed");

    assert_eq!(stats.units_processed, 1);
    assert_eq!(stats.texts_extracted, 0);
    assert_eq!(
        std::fs::read_to_string(root.join("plain.ts")).unwrap(),
        "export const n = 1;"
    );
}

/// 受限并发下多个单元全部完成，互不取消
#[tokio::test]
async fn test_bounded_concurrency_processes_all_units() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    for i in 0..8 {
        std::fs::write(root.join(format!("f{}.ts", i)), format!(r#"t("文本{}")"#, i)).unwrap();
    }

    let provider = MockProvider::new(|_, prompt| {
        // 从提示词里带的源文件内容还原出对应的占位响应
        for i in 0..8 {
            if prompt.contains(&format!("文本{}", i)) {
                return Ok(extraction_response(
                    &[("__T0__", &format!("文本{}", i))],
                    r#"t("__T0__")"#,
                ));
            }
        }
        Err(lingo::error::PipelineError::Provider("unknown unit".to_string()))
    });

    let mut config = config_for(root);
    config.concurrency = 2;
    let orchestrator = orchestrator_with(config, provider, Arc::new(LocalFileSystem));

    let stats = orchestrator.run(root).await.expect("run should succeed");

    assert_eq!(stats.units_processed, 8);
    assert!(stats.failed_units.is_empty());
    assert_eq!(read_locale(root, "zh-CN").as_object().unwrap().len(), 8);
}
