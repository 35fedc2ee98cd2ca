use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// `json` 或 `pretty`
    pub log_format: String,
    /// 设置后在该地址暴露Prometheus指标
    pub prometheus_listen: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            prometheus_listen: None,
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(anyhow::anyhow!("不支持的日志级别: {other}")),
        }
        match self.log_format.as_str() {
            "json" | "pretty" => {}
            other => return Err(anyhow::anyhow!("不支持的日志格式: {other}")),
        }
        if let Some(addr) = &self.prometheus_listen {
            addr.parse::<std::net::SocketAddr>()
                .map_err(|e| anyhow::anyhow!("Prometheus监听地址无效 {addr}: {e}"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// 未配置时告警只写入日志
    pub webhook_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_seconds: 10,
        }
    }
}

impl AlertingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(url) = &self.webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow::anyhow!("告警webhook地址必须是HTTP(S)格式: {url}"));
            }
        }
        if self.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("告警超时时间必须大于0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub poll_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 30,
        }
    }
}
