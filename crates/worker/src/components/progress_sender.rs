use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use jobmesh_domain::{routes, JobProgressReport, ManagerTransport};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

/// 等待发送给 Manager 的进度队列，按写入顺序发送
///
/// 只有 Manager 确认后条目才出队；发送失败时下个周期重试，后续条目排在其后。
pub struct JobDetailSender {
    transport: Arc<dyn ManagerTransport>,
    interval: Duration,
    queue: Mutex<VecDeque<(u64, JobProgressReport)>>,
    next_seq: Mutex<u64>,
}

impl JobDetailSender {
    pub fn new(transport: Arc<dyn ManagerTransport>, interval: Duration) -> Self {
        Self {
            transport,
            interval,
            queue: Mutex::new(VecDeque::new()),
            next_seq: Mutex::new(0),
        }
    }

    pub fn push(&self, report: JobProgressReport) {
        let seq = {
            let mut next = self.next_seq.lock().unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            *next
        };
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back((seq, report));
    }

    /// 丢弃终态已送达的作业尚未发送的进度
    pub fn purge(&self, job_id: Uuid) -> usize {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let before = queue.len();
        queue.retain(|(_, report)| report.job_id != job_id);
        before - queue.len()
    }

    pub fn pending(&self) -> Vec<JobProgressReport> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, report)| report.clone())
            .collect()
    }

    /// 从最早的条目开始发送，遇到失败即停止；返回送达条数
    pub async fn flush(&self) -> usize {
        let mut delivered = 0;
        loop {
            let front = self
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .front()
                .cloned();
            let Some((seq, report)) = front else {
                break;
            };

            let body = match serde_json::to_value(&report) {
                Ok(body) => body,
                Err(e) => {
                    info!("作业 {} 的进度无法序列化，已丢弃: {}", report.job_id, e);
                    self.remove(seq);
                    continue;
                }
            };

            match self.transport.post_json(routes::manager::JOB_PROGRESS, &body).await {
                Ok(()) => {
                    self.remove(seq);
                    delivered += 1;
                }
                Err(e) => {
                    info!(
                        "发送作业 {} 的进度失败，{:?} 后重试: {}",
                        report.job_id, self.interval, e
                    );
                    break;
                }
            }
        }
        delivered
    }

    pub async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let delivered = self.flush().await;
                    if delivered > 0 {
                        debug!("已发送 {} 条作业进度", delivered);
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("作业进度发送任务停止");
                    break;
                }
            }
        }
    }

    // 发送期间队首可能已被 purge
    fn remove(&self, seq: u64) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.front().is_some_and(|(front, _)| *front == seq) {
            queue.pop_front();
        }
    }
}
