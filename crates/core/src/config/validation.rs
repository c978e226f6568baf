use jobmesh_errors::{MeshError, MeshResult};
use url::Url;

/// 配置校验
pub trait ConfigValidator {
    fn validate(&self) -> MeshResult<()>;
}

/// 通用配置校验工具
pub struct ValidationUtils;

impl ValidationUtils {
    pub fn validate_not_empty(value: &str, field_name: &str) -> MeshResult<()> {
        if value.trim().is_empty() {
            return Err(MeshError::config_error(format!("{field_name} 不能为空")));
        }
        Ok(())
    }

    /// 必须为绝对的 http(s) 地址
    pub fn validate_http_url(value: &str, field_name: &str) -> MeshResult<()> {
        Self::validate_not_empty(value, field_name)?;
        let parsed = Url::parse(value)
            .map_err(|e| MeshError::config_error(format!("{field_name} 不是合法的URL: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(MeshError::config_error(format!(
                "{field_name} 必须使用 http 或 https 协议"
            )));
        }
        Ok(())
    }

    pub fn validate_bind_address(value: &str, field_name: &str) -> MeshResult<()> {
        value
            .parse::<std::net::SocketAddr>()
            .map(|_| ())
            .map_err(|e| MeshError::config_error(format!("{field_name} 不是合法的监听地址: {e}")))
    }

    pub fn validate_positive(value: u64, field_name: &str) -> MeshResult<()> {
        if value == 0 {
            return Err(MeshError::config_error(format!("{field_name} 必须大于0")));
        }
        Ok(())
    }

    pub fn validate_timeout_seconds(value: u64, field_name: &str) -> MeshResult<()> {
        Self::validate_positive(value, field_name)?;
        if value > 3600 {
            return Err(MeshError::config_error(format!(
                "{field_name} 不能超过3600秒"
            )));
        }
        Ok(())
    }

    pub fn validate_count(value: usize, field_name: &str) -> MeshResult<()> {
        if value == 0 {
            return Err(MeshError::config_error(format!("{field_name} 必须大于0")));
        }
        if value > 10000 {
            return Err(MeshError::config_error(format!(
                "{field_name} 不能超过10000"
            )));
        }
        Ok(())
    }
}
