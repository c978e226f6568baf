use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use jobmesh_errors::{MeshError, MeshResult};
use tracing::info;

use crate::handlers::{FailingJob, FastJob, JobContext, JobHandler, TestJob};

type ValidateFn = Box<dyn Fn(&str) -> MeshResult<()> + Send + Sync>;
type PrepareFn =
    Box<dyn Fn(&str, JobContext) -> MeshResult<BoxFuture<'static, MeshResult<()>>> + Send + Sync>;

struct RegisteredHandler {
    validate: ValidateFn,
    prepare: PrepareFn,
}

/// 作业类型名到处理器的映射，启动时按配置注册
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, RegisteredHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按名称注册内置处理器，未知名称视为配置错误
    pub fn from_config(names: &[String]) -> MeshResult<Self> {
        let mut registry = Self::new();
        for name in names {
            match name.as_str() {
                "TestJob" => registry.register(TestJob),
                "FastJob" => registry.register(FastJob),
                "FailingJob" => registry.register(FailingJob),
                other => {
                    return Err(MeshError::config_error(format!(
                        "未知的作业处理器: {other}"
                    )))
                }
            }
        }
        info!("已注册作业处理器: {:?}", registry.types());
        Ok(registry)
    }

    pub fn register<H: JobHandler>(&mut self, handler: H) {
        let handler = Arc::new(handler);

        let validate: ValidateFn = Box::new(|serialized: &str| {
            serde_json::from_str::<H::Params>(serialized)
                .map(|_| ())
                .map_err(|e| MeshError::validation_error(e.to_string()))
        });

        let prepare: PrepareFn = Box::new(move |serialized: &str, context: JobContext| {
            let params = serde_json::from_str::<H::Params>(serialized)
                .map_err(|e| MeshError::validation_error(e.to_string()))?;
            let handler = Arc::clone(&handler);
            Ok(async move { handler.handle(params, context).await }.boxed())
        });

        self.handlers
            .insert(H::TYPE_NAME, RegisteredHandler { validate, prepare });
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    pub fn types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// 检查 `serialized` 能否反序列化为该类型的参数
    pub fn check(&self, job_type: &str, serialized: &str) -> MeshResult<()> {
        let handler = self.lookup(job_type)?;
        (handler.validate)(serialized)
    }

    /// 反序列化参数并返回尚未开始执行的 future
    pub fn prepare(
        &self,
        job_type: &str,
        serialized: &str,
        context: JobContext,
    ) -> MeshResult<BoxFuture<'static, MeshResult<()>>> {
        let handler = self.lookup(job_type)?;
        (handler.prepare)(serialized, context)
    }

    fn lookup(&self, job_type: &str) -> MeshResult<&RegisteredHandler> {
        self.handlers
            .get(job_type)
            .ok_or_else(|| MeshError::validation_error(format!("未知的作业类型: {job_type}")))
    }
}
