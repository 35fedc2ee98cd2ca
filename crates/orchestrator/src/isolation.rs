//! 导入器失败隔离
//!
//! 单个导入器的普通错误在这里被记录、告警并吞掉，执行器继续下一个导入器。
//! 只有中断信号会穿过边界向上传播。

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, warn};

use student_import_core::{
    Alert, AlertChannel, AlertKind, ImportError, ImportResult, ImporterContext, InterruptSignal,
    RuntimeEnvironment, UnitOutcome,
};

use crate::registry::ResolvedImporter;

/// 告警策略：只有类生产环境才把错误转发到告警通道
#[derive(Clone, Default)]
pub struct AlertPolicy {
    channel: Option<Arc<dyn AlertChannel>>,
}

impl AlertPolicy {
    pub fn new(channel: Arc<dyn AlertChannel>, environment: RuntimeEnvironment) -> Self {
        Self {
            channel: environment.is_production_like().then_some(channel),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.channel.is_some()
    }

    /// 告警发送失败只记录警告
    pub async fn notify(&self, alert: Alert) {
        if let Some(channel) = &self.channel {
            if let Err(e) = channel.send(&alert).await {
                warn!("发送告警失败: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for AlertPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertPolicy")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

pub struct FailureIsolationBoundary {
    alerts: AlertPolicy,
    interrupt: InterruptSignal,
}

impl FailureIsolationBoundary {
    pub fn new(alerts: AlertPolicy, interrupt: InterruptSignal) -> Self {
        Self { alerts, interrupt }
    }

    /// 构造并执行一个导入器
    ///
    /// 返回 `Ok(Failed)` 表示错误已被记录并吞掉；`Err` 只可能是 `InterruptingSignal`。
    pub async fn execute(
        &self,
        importer: &ResolvedImporter,
        context: ImporterContext,
    ) -> ImportResult<UnitOutcome> {
        let kind = importer.kind();
        let log = context.log.clone();
        let school_scope = context.school_scope.join(",");
        let started = Instant::now();

        let work = async {
            let unit = importer.build(context)?;
            unit.import().await
        };

        let result = tokio::select! {
            biased;
            reason = self.interrupt.raised() => Err(ImportError::interrupted(reason)),
            result = work => result,
        };

        metrics::histogram!("import_unit_duration_seconds", "source" => kind.as_str())
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => Ok(UnitOutcome::Succeeded),
            Err(e) if e.is_interrupt() => Err(e),
            Err(e) => {
                metrics::counter!("import_unit_failures_total", "source" => kind.as_str())
                    .increment(1);
                error!("导入器 {} 执行失败: {}", kind.importer_name(), e);

                log.log_best_effort(format!(
                    "导入器 {} 执行失败: {}\n{:#?}",
                    kind.importer_name(),
                    e,
                    e
                ))
                .await;

                self.alerts
                    .notify(
                        Alert::new(AlertKind::ImporterFailure, e.to_string())
                            .with_context("importer", kind.importer_name())
                            .with_context("source", kind.as_str())
                            .with_context("run_id", log.run_id().to_string())
                            .with_context("school_scope", school_scope),
                    )
                    .await;

                Ok(UnitOutcome::Failed)
            }
        }
    }
}
