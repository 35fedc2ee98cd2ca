use serde::{Deserialize, Serialize};

/// 运行环境；只有类生产环境才会发送告警
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Test,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production_like(&self) -> bool {
        matches!(self, RuntimeEnvironment::Staging | RuntimeEnvironment::Production)
    }
}

impl std::str::FromStr for RuntimeEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(RuntimeEnvironment::Development),
            "test" => Ok(RuntimeEnvironment::Test),
            "staging" => Ok(RuntimeEnvironment::Staging),
            "production" => Ok(RuntimeEnvironment::Production),
            _ => Err(format!(
                "Invalid environment: {s}. Valid environments: development, test, staging, production"
            )),
        }
    }
}

/// 当前部署所服务的区
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistrictSettings {
    pub key: String,
    /// 区配置文件所在目录，文件名为 `<key>.toml`
    pub config_dir: String,
}

impl Default for DistrictSettings {
    fn default() -> Self {
        Self {
            key: "demo".to_string(),
            config_dir: "config/districts".to_string(),
        }
    }
}

impl DistrictSettings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.key.trim().is_empty() {
            return Err(anyhow::anyhow!("区的key不能为空"));
        }
        if self.config_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("区配置目录不能为空"));
        }
        Ok(())
    }
}
