use std::sync::Arc;
use std::time::Duration;

use jobmesh_domain::{routes, ManagerTransport};
use jobmesh_errors::MeshResult;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info};

/// 定期把节点对外地址发送到 Manager 的心跳接口
pub struct HeartbeatPinger {
    transport: Arc<dyn ManagerTransport>,
    base_url: String,
    interval: Duration,
}

impl HeartbeatPinger {
    pub fn new(transport: Arc<dyn ManagerTransport>, base_url: String, interval: Duration) -> Self {
        Self {
            transport,
            base_url,
            interval,
        }
    }

    pub async fn ping_once(&self) -> MeshResult<()> {
        self.transport
            .post_json(
                routes::manager::HEARTBEAT,
                &Value::String(self.base_url.clone()),
            )
            .await
    }

    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut heartbeat_interval = interval(self.interval);
        heartbeat_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = heartbeat_interval.tick() => {
                    if let Err(e) = self.ping_once().await {
                        info!("向 Manager 发送心跳失败: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("心跳任务停止");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeManagerTransport;

    #[tokio::test]
    async fn test_pings_until_shutdown_and_ignores_failures() {
        let transport = Arc::new(FakeManagerTransport::new());
        transport.fail_next(routes::manager::HEARTBEAT, 2);
        let pinger = Arc::new(HeartbeatPinger::new(
            Arc::clone(&transport) as Arc<dyn ManagerTransport>,
            "http://node1:9050/".to_string(),
            Duration::from_millis(10),
        ));

        let (tx, rx) = broadcast::channel(1);
        let task = {
            let pinger = Arc::clone(&pinger);
            tokio::spawn(async move { pinger.run(rx).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        assert!(transport.attempts(routes::manager::HEARTBEAT) >= 3);
        let delivered = transport.delivered(routes::manager::HEARTBEAT);
        assert!(!delivered.is_empty());
        assert_eq!(delivered[0], Value::String("http://node1:9050/".to_string()));
    }
}
