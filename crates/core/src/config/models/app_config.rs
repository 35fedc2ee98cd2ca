use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    database::DatabaseConfig,
    district::{DistrictSettings, RuntimeEnvironment},
    importers::ImportersConfig,
    observability::{AlertingConfig, ObservabilityConfig, WorkerConfig},
};

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: RuntimeEnvironment,
    pub district: DistrictSettings,
    pub database: DatabaseConfig,
    pub alerting: AlertingConfig,
    pub importers: ImportersConfig,
    pub worker: WorkerConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration (serde defaults)
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: STUDENT_IMPORT_, nested keys joined by `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/student-import.toml", "student-import.toml"];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("STUDENT_IMPORT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("解析配置失败")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.district.validate()?;
        self.database.validate()?;
        self.alerting.validate()?;
        self.importers.validate()?;
        self.observability.validate()?;
        if self.worker.poll_interval_seconds == 0 {
            return Err(anyhow::anyhow!("Worker轮询间隔必须大于0"));
        }
        Ok(())
    }
}
