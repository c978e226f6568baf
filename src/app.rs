use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use jobmesh_api::{create_manager_app, create_node_app};
use jobmesh_core::AppConfig;
use jobmesh_dispatcher::{JobManager, JobPurgeService, NodeLivenessMonitor, NodeRegistry};
use jobmesh_domain::{ManagerTransport, NodeTransport};
use jobmesh_infrastructure::{DatabaseManager, HttpManagerClient, HttpNodeClient};
use jobmesh_worker::WorkerNodeService;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 作业队列、分配引擎、节点存活监控与作业清理
    Manager,
    /// 单作业执行节点
    Node,
}

impl AppMode {
    pub fn bind_address(self, config: &AppConfig) -> &str {
        match self {
            AppMode::Manager => &config.manager.bind_address,
            AppMode::Node => &config.node.bind_address,
        }
    }
}

/// 主应用程序：持有已绑定的监听端口，`run` 直到收到关闭信号
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    listener: TcpListener,
}

impl Application {
    /// 按模式绑定配置中的监听地址
    pub async fn bind(config: AppConfig, mode: AppMode) -> Result<Self> {
        let address = mode.bind_address(&config).to_string();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("绑定地址失败: {address}"))?;
        Ok(Self::with_listener(config, mode, listener))
    }

    pub fn with_listener(config: AppConfig, mode: AppMode, listener: TcpListener) -> Self {
        Self {
            config,
            mode,
            listener,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("读取监听地址失败")
    }

    pub async fn run(self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);
        match self.mode {
            AppMode::Manager => run_manager(self.config, self.listener, shutdown_rx).await,
            AppMode::Node => run_node(self.config, self.listener, shutdown_rx).await,
        }
    }
}

async fn run_manager(
    config: AppConfig,
    listener: TcpListener,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let database = DatabaseManager::new(&config.database)
        .await
        .context("连接数据库失败")?;
    database.migrate().await.context("初始化数据库表结构失败")?;
    let repo = database.job_repository();

    let transport: Arc<dyn NodeTransport> = Arc::new(
        HttpNodeClient::new(config.manager.dispatch_timeout()).context("创建节点HTTP客户端失败")?,
    );
    let registry = Arc::new(NodeRegistry::new());
    let job_manager = Arc::new(JobManager::new(
        Arc::clone(&repo),
        transport,
        Arc::clone(&registry),
        config.manager.send_update_after_dispatch,
    ));
    job_manager
        .restore_registry()
        .await
        .context("恢复节点注册表失败")?;

    let monitor = Arc::new(NodeLivenessMonitor::new(
        registry,
        Arc::clone(&repo),
        job_manager.assign_trigger(),
        config.manager.allowed_node_down_time(),
        config.manager.liveness_check_interval(),
    ));
    let purge_service = Arc::new(JobPurgeService::new(
        repo,
        config.manager.purge_interval(),
        config.manager.purge_older_than(),
        config.manager.purge_jobs_batch_size,
    ));

    let background = vec![
        tokio::spawn(
            Arc::clone(&job_manager)
                .run_assignment_loop(config.manager.assign_interval(), shutdown_rx.resubscribe()),
        ),
        tokio::spawn(monitor.run(shutdown_rx.resubscribe())),
        tokio::spawn(purge_service.run(shutdown_rx.resubscribe())),
    ];

    info!("Manager 启动在 http://{}", listener.local_addr()?);
    axum::serve(listener, create_manager_app(job_manager))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .context("Manager HTTP服务运行失败")?;

    for handle in background {
        if let Err(e) = handle.await {
            error!("后台任务异常退出: {}", e);
        }
    }
    database.close().await;
    info!("Manager 已停止");
    Ok(())
}

async fn run_node(
    config: AppConfig,
    listener: TcpListener,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let transport: Arc<dyn ManagerTransport> = Arc::new(
        HttpManagerClient::new(
            config.node.manager_url.clone(),
            config.node.request_timeout(),
        )
        .context("创建Manager HTTP客户端失败")?,
    );
    let service = Arc::new(
        WorkerNodeService::new(&config.node, transport).context("创建Worker Node失败")?,
    );
    let app = create_node_app(Arc::clone(service.wrapper()));
    let service_task = tokio::spawn(Arc::clone(&service).run(shutdown_rx.resubscribe()));

    info!(
        "Worker Node 启动在 http://{}，对外地址 {}，Manager {}",
        listener.local_addr()?,
        service.base_url(),
        config.node.manager_url
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .context("Worker Node HTTP服务运行失败")?;

    if let Err(e) = service_task.await {
        error!("Worker Node 后台任务异常退出: {}", e);
    }
    Ok(())
}

/// 按配置安装 Prometheus 指标导出器
pub fn install_metrics_exporter(config: &AppConfig) -> Result<()> {
    if !config.observability.metrics_enabled {
        return Ok(());
    }

    let address: SocketAddr = config
        .observability
        .metrics_bind_address
        .parse()
        .with_context(|| format!("指标监听地址无效: {}", config.observability.metrics_bind_address))?;
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| anyhow::anyhow!("安装Prometheus指标导出器失败: {e}"))?;

    info!("Prometheus 指标导出器启动在 http://{}/metrics", address);
    Ok(())
}

/// 在关闭超时内等待应用退出
pub async fn join_with_timeout(
    handle: tokio::task::JoinHandle<Result<()>>,
    timeout: std::time::Duration,
) {
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(()))) => info!("应用已优雅关闭"),
        Ok(Ok(Err(e))) => error!("应用运行失败: {:#}", e),
        Ok(Err(e)) => error!("应用任务异常退出: {}", e),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }
}
