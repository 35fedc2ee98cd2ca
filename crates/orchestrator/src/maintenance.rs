use std::sync::Arc;

use tracing::{error, info};

use student_import_core::{
    Alert, AlertKind, ImportError, ImportResult, InterruptSignal, MaintenanceTask, RunLog,
};

use crate::isolation::AlertPolicy;

/// 所有导入器完成后执行一次的派生数据维护任务
///
/// 任务按固定顺序执行，任何一个失败都会终止本阶段；已导入的数据不会回滚。
#[derive(Clone, Default)]
pub struct PostImportMaintenance {
    tasks: Vec<Arc<dyn MaintenanceTask>>,
}

impl PostImportMaintenance {
    pub fn new(tasks: Vec<Arc<dyn MaintenanceTask>>) -> Self {
        Self { tasks }
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.name().to_string()).collect()
    }

    /// 返回执行的任务数量
    pub async fn run(
        &self,
        log: &RunLog,
        alerts: &AlertPolicy,
        interrupt: &InterruptSignal,
    ) -> ImportResult<usize> {
        for (index, task) in self.tasks.iter().enumerate() {
            let name = task.name().to_string();
            log.log(format!("执行维护任务 {name}")).await?;

            let result = tokio::select! {
                biased;
                reason = interrupt.raised() => Err(ImportError::interrupted(reason)),
                result = task.run() => result,
            };

            match result {
                Ok(()) => info!("维护任务 {} 完成", name),
                Err(e) if e.is_interrupt() => return Err(e),
                Err(e) => {
                    let failure = match e {
                        ImportError::MaintenanceFailure { .. } => e,
                        other => ImportError::maintenance(&name, other),
                    };
                    error!("维护任务 {} 失败: {}", name, failure);
                    metrics::counter!("import_maintenance_failures_total").increment(1);

                    log.log_best_effort(format!("维护任务 {name} 失败: {failure}\n{failure:#?}"))
                        .await;
                    alerts
                        .notify(
                            Alert::new(AlertKind::MaintenanceFailure, failure.to_string())
                                .with_context("task", name.as_str())
                                .with_context("run_id", log.run_id().to_string())
                                .with_context("completed_tasks", index.to_string()),
                        )
                        .await;
                    return Err(failure);
                }
            }
        }

        Ok(self.tasks.len())
    }
}
