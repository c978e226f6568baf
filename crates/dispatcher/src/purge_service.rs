use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobmesh_domain::JobRepository;
use jobmesh_errors::MeshResult;
use tokio::sync::broadcast;
use tracing::{error, info};

/// 定期清理过期的已结束作业；审计记录不受影响
pub struct JobPurgeService {
    repo: Arc<dyn JobRepository>,
    interval: Duration,
    older_than: Duration,
    batch_size: u32,
}

impl JobPurgeService {
    pub fn new(
        repo: Arc<dyn JobRepository>,
        interval: Duration,
        older_than: Duration,
        batch_size: u32,
    ) -> Self {
        Self {
            repo,
            interval,
            older_than,
            batch_size,
        }
    }

    pub async fn purge_once(&self) -> MeshResult<u64> {
        let older_than = chrono::Duration::from_std(self.older_than)
            .map_err(|e| jobmesh_errors::MeshError::config_error(format!("清理时间无效: {e}")))?;
        let purged = self
            .repo
            .purge_ended_jobs(Utc::now() - older_than, self.batch_size)
            .await?;
        if purged > 0 {
            info!("清理了 {} 个过期作业", purged);
        }
        Ok(purged)
    }

    pub async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "启动作业清理服务，间隔 {:?}，清理 {:?} 之前的作业",
            self.interval, self.older_than
        );
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.purge_once().await {
                        error!("清理作业失败: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，停止作业清理服务");
                    break;
                }
            }
        }
    }
}
