use std::sync::Arc;

use jobmesh_core::NodeConfig;
use jobmesh_domain::validation::normalize_node_url;
use jobmesh_domain::{routes, ManagerTransport};
use jobmesh_errors::MeshResult;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::components::{HeartbeatPinger, JobDetailSender, RetryingSender, WorkerWrapper};
use crate::handler_registry::HandlerRegistry;

/// `<节点名> (<主机名>)`，用作节点日志前缀
pub fn whoami(node_name: &str) -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("{node_name} ({host})")
}

/// Worker Node 运行时：执行包装器以及与 Manager 通信的后台发送器
pub struct WorkerNodeService {
    base_url: String,
    wrapper: Arc<WorkerWrapper>,
    progress: Arc<JobDetailSender>,
    startup_sender: RetryingSender<String>,
    pinger: HeartbeatPinger,
}

impl WorkerNodeService {
    pub fn new(config: &NodeConfig, transport: Arc<dyn ManagerTransport>) -> MeshResult<Self> {
        let base_url = normalize_node_url(&config.base_url)?;
        let registry = Arc::new(HandlerRegistry::from_config(&config.handlers)?);
        let whoami = whoami(&config.node_name);

        let progress = Arc::new(JobDetailSender::new(
            Arc::clone(&transport),
            config.progress_retry_interval(),
        ));
        let wrapper = Arc::new(WorkerWrapper::new(
            whoami,
            base_url.clone(),
            registry,
            Arc::clone(&transport),
            Arc::clone(&progress),
            config.status_retry_interval(),
        ));
        let startup_sender = RetryingSender::new(
            "node startup notification",
            routes::manager::NODE_INITIALIZED,
            config.startup_notification_interval(),
            Arc::clone(&transport),
            |url: &String| Value::String(url.clone()),
        );
        let pinger = HeartbeatPinger::new(transport, base_url.clone(), config.ping_interval());

        Ok(Self {
            base_url,
            wrapper,
            progress,
            startup_sender,
            pinger,
        })
    }

    pub fn wrapper(&self) -> &Arc<WorkerWrapper> {
        &self.wrapper
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 向 Manager 发送启动通知，确认后开放作业槽位并持续心跳直到关闭
    pub async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("{}: Worker Node 启动，对外地址 {}", self.wrapper.whoami(), self.base_url);
        let progress_task = tokio::spawn(Arc::clone(&self.progress).run(shutdown_rx.resubscribe()));

        let acknowledged = tokio::select! {
            delivered = self.startup_sender.arm(&self.base_url) => delivered.is_ok(),
            _ = shutdown_rx.recv() => false,
        };

        if acknowledged {
            self.wrapper.open_intake();
            info!(
                "{}: Manager 已确认节点启动，开始接收作业并发送心跳",
                self.wrapper.whoami()
            );
            self.pinger.run(shutdown_rx).await;
        } else {
            self.startup_sender.disarm();
        }

        self.wrapper.shutdown().await;
        if let Err(e) = progress_task.await {
            warn!("作业进度发送任务异常退出: {}", e);
        }
        info!("{}: Worker Node 已停止", self.wrapper.whoami());
    }
}
