//! 命令行入口

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lingo::config::PipelineConfig;
use lingo::fs::LocalFileSystem;
use lingo::pipeline::{Orchestrator, StructuralValidator};

#[derive(Parser, Debug)]
#[command(name = "lingo", version, about = "提取源文件中的文案并生成语言文件")]
struct Cli {
    /// 项目根目录
    #[arg(default_value = ".")]
    path: PathBuf,

    /// 配置文件路径（默认查找 lingo.toml / .lingo.toml）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 目标区域代码，可重复指定（覆盖配置文件）
    #[arg(short = 'l', long = "locale")]
    locales: Vec<String>,

    /// 并发上限（覆盖配置文件）
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// 禁用响应缓存
    #[arg(long)]
    no_cache: bool,

    /// 输出更详细的日志
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "lingo=debug" } else { "lingo=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let mut config = match PipelineConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if !cli.locales.is_empty() {
        config.output.target_locales = cli.locales;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }
    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        return ExitCode::FAILURE;
    }

    let orchestrator = match Orchestrator::new(
        config,
        Arc::new(LocalFileSystem),
        Arc::new(StructuralValidator),
    ) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match orchestrator.run(&cli.path).await {
        Ok(stats) => {
            if stats.failed_units.is_empty() {
                ExitCode::SUCCESS
            } else {
                // 部分失败：运行完成但以非零码退出，便于CI感知
                ExitCode::from(2)
            }
        }
        Err(e) => {
            tracing::error!("运行失败: {}", e);
            ExitCode::FAILURE
        }
    }
}
