use std::collections::HashSet;
use std::time::Duration;

use jobmesh::{AppMode, Application, ShutdownManager};
use jobmesh_core::AppConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// 运行中的 Manager 或 Worker Node
struct Running {
    url: String,
    shutdown: ShutdownManager,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl Running {
    async fn stop(self) {
        self.shutdown.shutdown().await;
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("shutdown timed out")
            .unwrap()
            .unwrap();
    }
}

fn base_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".to_string();
    config.manager.assign_interval_ms = 50;
    config.manager.allowed_node_down_time_seconds = 5;
    config.manager.dispatch_timeout_seconds = 2;
    config.node.ping_to_manager_seconds = 1;
    config.node.status_retry_interval_ms = 50;
    config.node.startup_notification_interval_ms = 50;
    config.node.progress_retry_interval_ms = 50;
    config.node.request_timeout_seconds = 2;
    config
}

async fn spawn(config: AppConfig, mode: AppMode, listener: TcpListener, url: String) -> Running {
    let shutdown = ShutdownManager::new();
    let rx = shutdown.subscribe().await;
    let handle = tokio::spawn(Application::with_listener(config, mode, listener).run(rx));
    Running {
        url,
        shutdown,
        handle,
    }
}

async fn start_manager() -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    spawn(base_config(), AppMode::Manager, listener, url).await
}

async fn start_node(manager: &Running, name: &str) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());

    let mut config = base_config();
    config.node.node_name = name.to_string();
    config.node.base_url = url.clone();
    config.node.manager_url = manager.url.clone();
    spawn(config, AppMode::Node, listener, url).await
}

async fn submit(client: &reqwest::Client, manager: &Running, job_type: &str, serialized: Value) -> String {
    let response = client
        .post(format!("{}job", manager.url))
        .json(&json!({
            "name": format!("{job_type} e2e"),
            "serialized": serialized.to_string(),
            "type": job_type,
            "created_by": "e2e",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    body["data"].as_str().unwrap().to_string()
}

async fn history(client: &reqwest::Client, manager: &Running, job_id: &str) -> Value {
    let body: Value = client
        .get(format!("{}jobhistory/{job_id}", manager.url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["data"].clone()
}

async fn wait_for<F>(client: &reqwest::Client, manager: &Running, job_id: &str, done: F) -> Value
where
    F: Fn(&Value) -> bool,
{
    for _ in 0..300 {
        let job = history(client, manager, job_id).await;
        if done(&job) {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {job_id} did not reach the expected state");
}

async fn wait_for_nodes(client: &reqwest::Client, manager: &Running, count: usize) {
    for _ in 0..200 {
        let nodes: Value = client
            .get(format!("{}nodes", manager.url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if nodes["data"].as_array().map_or(0, Vec::len) >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("nodes did not register with the manager");
}

#[tokio::test]
async fn test_job_runs_to_success_on_single_node() {
    let client = reqwest::Client::new();
    let manager = start_manager().await;
    let node = start_node(&manager, "node1").await;

    let job_id = submit(&client, &manager, "FastJob", json!({ "name": "hello" })).await;
    let job = wait_for(&client, &manager, &job_id, |j| j["result"] == "Success").await;

    assert_eq!(job["sent_to_worker_node"], node.url.as_str());
    assert!(job["started"].is_string());
    assert!(job["ended"].is_string());

    let details: Value = client
        .get(format!("{}jobhistorydetails/{job_id}", manager.url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let texts: Vec<&str> = details["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["detail"].as_str())
        .collect();
    assert!(texts.contains(&"Job Started"));
    assert!(texts.contains(&"Job finished"));

    node.stop().await;
    manager.stop().await;
}

#[tokio::test]
async fn test_job_stays_queued_without_nodes() {
    let client = reqwest::Client::new();
    let manager = start_manager().await;

    let job_id = submit(&client, &manager, "FastJob", json!({ "name": "lonely" })).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let job = history(&client, &manager, &job_id).await;
    assert_eq!(job["job_id"], job_id.as_str());
    assert!(job["sent_to_worker_node"].is_null());
    assert!(job["result"].is_null());

    let queue: Value = client
        .get(format!("{}jobqueue", manager.url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(queue["data"].as_array().unwrap().len(), 1);

    manager.stop().await;
}

#[tokio::test]
async fn test_many_jobs_are_spread_over_two_nodes() {
    let client = reqwest::Client::new();
    let manager = start_manager().await;
    let node1 = start_node(&manager, "node1").await;
    let node2 = start_node(&manager, "node2").await;
    wait_for_nodes(&client, &manager, 2).await;

    let mut job_ids = Vec::new();
    for i in 0..15 {
        let params = json!({ "name": format!("batch-{i}"), "duration_ms": 50 });
        job_ids.push(submit(&client, &manager, "TestJob", params).await);
    }

    let node_urls: HashSet<String> = [node1.url.clone(), node2.url.clone()].into();
    let mut used = HashSet::new();
    for job_id in &job_ids {
        let job = wait_for(&client, &manager, job_id, |j| j["result"] == "Success").await;
        let sent_to = job["sent_to_worker_node"].as_str().unwrap().to_string();
        assert!(node_urls.contains(&sent_to));
        used.insert(sent_to);
    }
    assert_eq!(used, node_urls);

    let queue: Value = client
        .get(format!("{}jobqueue", manager.url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(queue["data"].as_array().unwrap().is_empty());

    node1.stop().await;
    node2.stop().await;
    manager.stop().await;
}

#[tokio::test]
async fn test_cancel_running_job() {
    let client = reqwest::Client::new();
    let manager = start_manager().await;
    let node = start_node(&manager, "node1").await;

    let params = json!({ "name": "forever", "duration_ms": 60_000 });
    let job_id = submit(&client, &manager, "TestJob", params).await;
    wait_for(&client, &manager, &job_id, |j| j["started"].is_string()).await;

    let response = client
        .delete(format!("{}job/{job_id}", manager.url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let job = wait_for(&client, &manager, &job_id, |j| j["result"] == "Canceled").await;
    assert!(job["ended"].is_string());

    // 节点空闲后可以接收新的作业
    let next = submit(&client, &manager, "FastJob", json!({ "name": "after cancel" })).await;
    wait_for(&client, &manager, &next, |j| j["result"] == "Success").await;

    node.stop().await;
    manager.stop().await;
}
