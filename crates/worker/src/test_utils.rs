use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use jobmesh_domain::ManagerTransport;
use jobmesh_errors::{MeshError, MeshResult};
use serde_json::Value;

#[derive(Default)]
struct FakeManagerState {
    fail_next: HashMap<String, u32>,
    attempts: HashMap<String, u32>,
    delivered: HashMap<String, Vec<Value>>,
}

/// 按接口记录所有请求；`fail_next` 让该接口接下来的 N 次请求返回网络错误
#[derive(Default)]
pub struct FakeManagerTransport {
    state: Mutex<FakeManagerState>,
}

impl FakeManagerTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, endpoint: &str, count: u32) {
        self.state
            .lock()
            .unwrap()
            .fail_next
            .insert(endpoint.to_string(), count);
    }

    pub fn attempts(&self, endpoint: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .attempts
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    pub fn delivered(&self, endpoint: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .delivered
            .get(endpoint)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ManagerTransport for FakeManagerTransport {
    async fn post_json(&self, endpoint: &str, body: &Value) -> MeshResult<()> {
        let mut state = self.state.lock().unwrap();
        *state.attempts.entry(endpoint.to_string()).or_default() += 1;

        if let Some(remaining) = state.fail_next.get_mut(endpoint) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(MeshError::network(format!("{endpoint}: connection refused")));
            }
        }

        state
            .delivered
            .entry(endpoint.to_string())
            .or_default()
            .push(body.clone());
        Ok(())
    }
}
