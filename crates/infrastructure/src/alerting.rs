//! 告警通道实现
//!
//! `TracingAlertChannel` 只写日志，用于开发环境或未配置webhook的情况；
//! `WebhookAlertChannel` 把告警以JSON POST到外部错误上报服务。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use student_import_core::{Alert, AlertChannel, ImportError, ImportResult};

/// 把告警写入tracing的通道
#[derive(Debug, Clone, Default)]
pub struct TracingAlertChannel;

#[async_trait]
impl AlertChannel for TracingAlertChannel {
    async fn send(&self, alert: &Alert) -> ImportResult<()> {
        error!(
            kind = ?alert.kind,
            context = ?alert.context,
            "告警: {}",
            alert.error
        );
        Ok(())
    }
}

pub struct WebhookAlertChannel {
    url: String,
    hostname: String,
    http_client: reqwest::Client,
}

impl WebhookAlertChannel {
    pub fn new(url: impl Into<String>, timeout: Duration) -> ImportResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImportError::Configuration(format!("创建告警HTTP客户端失败: {e}")))?;

        let hostname = hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|e| {
                warn!("获取主机名失败: {e}");
                "unknown".to_string()
            });

        Ok(Self {
            url: url.into(),
            hostname,
            http_client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn payload(&self, alert: &Alert) -> Value {
        json!({
            "kind": alert.kind,
            "error": alert.error,
            "context": alert.context,
            "host": self.hostname,
            "occurred_at": alert.occurred_at.to_rfc3339(),
        })
    }
}

#[async_trait]
impl AlertChannel for WebhookAlertChannel {
    async fn send(&self, alert: &Alert) -> ImportResult<()> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&self.payload(alert))
            .send()
            .await
            .map_err(|e| ImportError::Internal(format!("告警发送失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImportError::Internal(format!(
                "告警服务返回错误: HTTP {status} - {body}"
            )));
        }

        debug!("告警已发送: {:?}", alert.kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use student_import_core::AlertKind;

    #[tokio::test]
    async fn test_tracing_channel_accepts_alert() {
        let alert = Alert::new(AlertKind::ImporterFailure, "boom").with_context("source", "students");
        assert!(TracingAlertChannel.send(&alert).await.is_ok());
    }

    #[test]
    fn test_payload_carries_context_and_host() {
        let channel =
            WebhookAlertChannel::new("http://localhost:9/alerts", Duration::from_secs(1)).unwrap();
        let alert = Alert::new(AlertKind::MaintenanceFailure, "disk full")
            .with_context("task", "update_risk_levels");

        let payload = channel.payload(&alert);
        assert_eq!(payload["kind"], "maintenance_failure");
        assert_eq!(payload["error"], "disk full");
        assert_eq!(payload["context"]["task"], "update_risk_levels");
        assert!(payload["host"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let channel =
            WebhookAlertChannel::new(format!("http://{addr}/alerts"), Duration::from_secs(2))
                .unwrap();
        let alert = Alert::new(AlertKind::ImporterFailure, "boom");
        assert!(channel.send(&alert).await.is_err());
    }
}
