use std::collections::HashMap;

use chrono::{DateTime, Utc};
use jobmesh_domain::{NodeStatus, WorkerNode};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 内存中的节点注册表，以规范化后的节点地址为键
#[derive(Default)]
pub struct NodeRegistry {
    nodes: RwLock<HashMap<String, WorkerNode>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录心跳；未知节点自动注册，状态恢复为 Alive
    pub async fn heartbeat(&self, url: &str) {
        self.heartbeat_at(url, Utc::now()).await
    }

    pub async fn heartbeat_at(&self, url: &str, at: DateTime<Utc>) {
        let mut nodes = self.nodes.write().await;
        match nodes.get_mut(url) {
            Some(node) => {
                if node.status != NodeStatus::Alive {
                    info!("节点 {} 恢复心跳", url);
                }
                node.heartbeat(at);
            }
            None => {
                info!("注册新节点: {}", url);
                nodes.insert(url.to_string(), WorkerNode::new(url.to_string(), at));
            }
        }
    }

    /// 派发或探活失败，在下次心跳前不参与分配
    pub async fn mark_suspect(&self, url: &str) {
        if let Some(node) = self.nodes.write().await.get_mut(url) {
            if node.status == NodeStatus::Alive {
                debug!("节点 {} 标记为可疑", url);
                node.status = NodeStatus::Suspect;
            }
        }
    }

    pub async fn mark_dead(&self, url: &str) {
        if let Some(node) = self.nodes.write().await.get_mut(url) {
            node.status = NodeStatus::Dead;
        }
    }

    /// 可参与分配的节点，按地址排序
    pub async fn alive_nodes(&self) -> Vec<String> {
        let nodes = self.nodes.read().await;
        let mut urls: Vec<String> = nodes
            .values()
            .filter(|node| node.status == NodeStatus::Alive)
            .map(|node| node.url.clone())
            .collect();
        urls.sort();
        urls
    }

    /// 超过允许宕机时间且尚未判定死亡的节点
    pub async fn expired_nodes(
        &self,
        now: DateTime<Utc>,
        allowed_down_time: chrono::Duration,
    ) -> Vec<String> {
        let nodes = self.nodes.read().await;
        nodes
            .values()
            .filter(|node| node.status != NodeStatus::Dead)
            .filter(|node| node.is_expired(now, allowed_down_time))
            .map(|node| node.url.clone())
            .collect()
    }

    pub async fn get(&self, url: &str) -> Option<WorkerNode> {
        self.nodes.read().await.get(url).cloned()
    }

    pub async fn snapshot(&self) -> Vec<WorkerNode> {
        let nodes = self.nodes.read().await;
        let mut snapshot: Vec<WorkerNode> = nodes.values().cloned().collect();
        snapshot.sort_by(|a, b| a.url.cmp(&b.url));
        snapshot
    }
}
