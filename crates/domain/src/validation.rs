use url::Url;

use crate::entities::NewJobRequest;
use jobmesh_errors::{MeshError, MeshResult};

pub fn validate_new_job(request: &NewJobRequest) -> MeshResult<()> {
    if request.name.trim().is_empty() {
        return Err(MeshError::validation_error("name 不能为空"));
    }
    if request.job_type.trim().is_empty() {
        return Err(MeshError::validation_error("type 不能为空"));
    }
    if request.serialized.trim().is_empty() {
        return Err(MeshError::validation_error("serialized 不能为空"));
    }
    Ok(())
}

/// 节点地址统一为带尾部斜杠的绝对 http(s) URL，作为注册表和 `jobs` 表中的节点标识
pub fn normalize_node_url(raw: &str) -> MeshResult<String> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|e| MeshError::validation_error(format!("节点地址无效 {trimmed}: {e}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(MeshError::validation_error(format!(
            "节点地址必须使用 http 或 https: {trimmed}"
        )));
    }
    if parsed.host_str().is_none() {
        return Err(MeshError::validation_error(format!(
            "节点地址缺少主机名: {trimmed}"
        )));
    }
    let mut normalized = parsed.to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Ok(normalized)
}
