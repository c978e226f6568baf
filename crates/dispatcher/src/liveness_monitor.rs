use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobmesh_domain::JobRepository;
use jobmesh_errors::MeshResult;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, error, info, warn};

use crate::counters::{self, JOBS_REQUEUED};
use crate::node_registry::NodeRegistry;

/// 节点存活监控
///
/// 每隔 `allowed_down_time / 5` 扫描一次注册表。心跳超时的节点被判定死亡，
/// 其上未结束的作业以原 id 放回队列，等待下一轮分配。
pub struct NodeLivenessMonitor {
    registry: Arc<NodeRegistry>,
    repo: Arc<dyn JobRepository>,
    assign_trigger: Arc<Notify>,
    allowed_down_time: Duration,
    check_interval: Duration,
}

impl NodeLivenessMonitor {
    pub fn new(
        registry: Arc<NodeRegistry>,
        repo: Arc<dyn JobRepository>,
        assign_trigger: Arc<Notify>,
        allowed_down_time: Duration,
        check_interval: Duration,
    ) -> Self {
        Self {
            registry,
            repo,
            assign_trigger,
            allowed_down_time,
            check_interval,
        }
    }

    /// 执行一次扫描，返回本次判定死亡的节点
    pub async fn check_nodes(&self) -> MeshResult<Vec<String>> {
        let allowed = chrono::Duration::from_std(self.allowed_down_time)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1000));
        let expired = self.registry.expired_nodes(Utc::now(), allowed).await;
        let mut dead = Vec::with_capacity(expired.len());

        for node_url in expired {
            // 先回收作业再标记死亡；回收失败时下一轮会重试
            let requeued = match self.repo.requeue_unended_job_for_node(&node_url).await {
                Ok(requeued) => requeued,
                Err(e) => {
                    error!("回收节点 {} 上的作业失败: {}", node_url, e);
                    continue;
                }
            };
            self.registry.mark_dead(&node_url).await;
            warn!(
                "节点 {} 超过 {:?} 未发送心跳，判定为失效",
                node_url, self.allowed_down_time
            );

            if !requeued.is_empty() {
                counters::increment(JOBS_REQUEUED, requeued.len() as u64);
                info!(
                    "节点 {} 上的 {} 个作业已重新入队: {:?}",
                    node_url,
                    requeued.len(),
                    requeued
                );
                self.assign_trigger.notify_one();
            }
            dead.push(node_url);
        }

        Ok(dead)
    }

    pub async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "启动节点存活监控，允许宕机时间 {:?}，扫描间隔 {:?}",
            self.allowed_down_time, self.check_interval
        );
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.check_nodes().await {
                        Ok(dead) if !dead.is_empty() => debug!("本轮判定失效节点: {:?}", dead),
                        Ok(_) => {}
                        Err(e) => error!("节点存活检测失败: {}", e),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，停止节点存活监控");
                    break;
                }
            }
        }
    }
}
