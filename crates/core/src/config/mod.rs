mod models;
mod validation;

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

pub use models::{DatabaseConfig, ManagerConfig, NodeConfig, ObservabilityConfig};
pub use validation::{ConfigValidator, ValidationUtils};

const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/jobmesh.toml",
    "jobmesh.toml",
    "/etc/jobmesh/config.toml",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub manager: ManagerConfig,
    pub node: NodeConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 加载配置：显式路径或默认路径中的TOML文件，随后叠加 `JOBMESH_` 前缀的环境变量
    ///
    /// 环境变量中以 `__` 分隔层级，例如 `JOBMESH_MANAGER__BIND_ADDRESS`。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {path}"));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("JOBMESH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("node.handlers"),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> jobmesh_errors::MeshResult<()> {
        self.database.validate()?;
        self.manager.validate()?;
        self.node.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
