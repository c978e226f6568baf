use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use jobmesh_domain::ManagerTransport;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

type PayloadBuilder<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;

/// 向 Manager 的某个接口投递一条消息，失败后按固定间隔重试，直到收到 2xx
///
/// 每个发送器同时只有一个投递在进行：再次 `arm` 会中止上一次的重试循环。
/// [`arm`](Self::arm) 返回的接收端在 Manager 确认后完成；投递被撤销或替换时返回错误。
/// 首次尝试立即发出，之后每次失败等待 `interval`。
pub struct RetryingSender<T> {
    name: &'static str,
    endpoint: &'static str,
    interval: Duration,
    transport: Arc<dyn ManagerTransport>,
    build_payload: PayloadBuilder<T>,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl<T> RetryingSender<T> {
    pub fn new(
        name: &'static str,
        endpoint: &'static str,
        interval: Duration,
        transport: Arc<dyn ManagerTransport>,
        build_payload: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            endpoint,
            interval,
            transport,
            build_payload: Box::new(build_payload),
            current: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arm(&self, item: &T) -> oneshot::Receiver<()> {
        let payload = (self.build_payload)(item);
        let (delivered_tx, delivered_rx) = oneshot::channel();

        let name = self.name;
        let endpoint = self.endpoint;
        let interval = self.interval;
        let transport = Arc::clone(&self.transport);

        let handle = tokio::spawn(async move {
            let mut attempts: u32 = 0;
            loop {
                attempts += 1;
                match transport.post_json(endpoint, &payload).await {
                    Ok(()) => {
                        debug!("{name}: 第 {attempts} 次尝试投递到 /{endpoint} 成功");
                        let _ = delivered_tx.send(());
                        break;
                    }
                    Err(e) => {
                        info!("{name}: 投递到 /{endpoint} 失败，{interval:?} 后重试: {e}");
                    }
                }
                tokio::time::sleep(interval).await;
            }
        });

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = current.replace(handle) {
            previous.abort();
        }
        delivered_rx
    }

    pub fn disarm(&self) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = current.take() {
            handle.abort();
        }
    }

    /// 有消息等待确认时为 `true`
    pub fn is_armed(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<T> Drop for RetryingSender<T> {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::test_utils::FakeManagerTransport;

    fn sender(transport: &Arc<FakeManagerTransport>) -> RetryingSender<Uuid> {
        RetryingSender::new(
            "job done sender",
            "jobdone",
            Duration::from_millis(20),
            Arc::clone(transport) as Arc<dyn ManagerTransport>,
            |id: &Uuid| json!({ "job_id": id }),
        )
    }

    #[tokio::test]
    async fn test_retries_until_delivered() {
        let transport = Arc::new(FakeManagerTransport::new());
        transport.fail_next("jobdone", 3);
        let sender = sender(&transport);
        let job_id = Uuid::new_v4();

        let delivered = sender.arm(&job_id);
        tokio::time::timeout(Duration::from_secs(5), delivered)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(transport.attempts("jobdone"), 4);
        assert_eq!(
            transport.delivered("jobdone"),
            vec![json!({ "job_id": job_id })]
        );
        assert!(!sender.is_armed());
    }

    #[tokio::test]
    async fn test_first_attempt_does_not_wait_for_interval() {
        let transport = Arc::new(FakeManagerTransport::new());
        let sender = RetryingSender::new(
            "node startup notification",
            "nodeinitialized",
            Duration::from_secs(3600),
            Arc::clone(&transport) as Arc<dyn ManagerTransport>,
            |url: &String| Value::String(url.clone()),
        );

        let delivered = sender.arm(&"http://node1:9050/".to_string());
        tokio::time::timeout(Duration::from_millis(500), delivered)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transport.attempts("nodeinitialized"), 1);
    }

    #[tokio::test]
    async fn test_arming_again_replaces_previous_delivery() {
        let transport = Arc::new(FakeManagerTransport::new());
        transport.fail_next("jobdone", u32::MAX);
        let sender = sender(&transport);

        let first = sender.arm(&Uuid::new_v4());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second_id = Uuid::new_v4();
        let second = sender.arm(&second_id);
        assert!(first.await.is_err());

        transport.fail_next("jobdone", 0);
        tokio::time::timeout(Duration::from_secs(5), second)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            transport.delivered("jobdone"),
            vec![json!({ "job_id": second_id })]
        );
    }

    #[tokio::test]
    async fn test_disarm_stops_retrying() {
        let transport = Arc::new(FakeManagerTransport::new());
        transport.fail_next("jobdone", u32::MAX);
        let sender = sender(&transport);

        let delivered = sender.arm(&Uuid::new_v4());
        tokio::time::sleep(Duration::from_millis(70)).await;
        sender.disarm();
        assert!(delivered.await.is_err());

        let attempts = transport.attempts("jobdone");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.attempts("jobdone"), attempts);
        assert!(!sender.is_armed());
    }
}
