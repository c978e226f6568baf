use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use jobmesh::app::{install_metrics_exporter, join_with_timeout};
use jobmesh::shutdown::wait_for_shutdown_signal;
use jobmesh::{AppMode, Application, ShutdownManager};
use jobmesh_core::{logging::init_logging, AppConfig};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Manager,
    Node,
}

impl From<ModeArg> for AppMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Manager => AppMode::Manager,
            ModeArg::Node => AppMode::Node,
        }
    }
}

/// HTTP 作业分发系统
#[derive(Debug, Parser)]
#[command(name = "jobmesh", version, about)]
struct Cli {
    /// 配置文件路径，缺省时依次查找默认位置
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 运行模式
    #[arg(short, long, value_enum, default_value = "manager")]
    mode: ModeArg,

    /// 覆盖配置中的节点名称（仅 node 模式）
    #[arg(long, value_name = "NAME")]
    node_name: Option<String>,

    /// 日志级别，缺省使用配置文件
    #[arg(short, long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式，缺省使用配置文件
    #[arg(long, value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).with_context(|| {
        format!(
            "加载配置失败: {}",
            cli.config.as_deref().unwrap_or("<默认路径>")
        )
    })?;
    if let Some(name) = cli.node_name {
        config.node.node_name = name;
    }

    let log_level = cli
        .log_level
        .unwrap_or_else(|| config.observability.log_level.clone());
    let log_format = cli
        .log_format
        .unwrap_or_else(|| config.observability.log_format.clone());
    init_logging(&log_level, &log_format)?;

    let mode = AppMode::from(cli.mode);
    info!("启动 JobMesh，运行模式: {:?}", mode);
    install_metrics_exporter(&config)?;

    let app = Application::bind(config, mode).await?;
    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;
    let mut app_handle = tokio::spawn(app.run(shutdown_rx));

    tokio::select! {
        _ = wait_for_shutdown_signal() => info!("收到关闭信号，开始优雅关闭..."),
        result = &mut app_handle => return result.context("应用任务异常退出")?,
    }

    shutdown_manager.shutdown().await;
    join_with_timeout(app_handle, Duration::from_secs(30)).await;
    info!("JobMesh 已退出");
    Ok(())
}
