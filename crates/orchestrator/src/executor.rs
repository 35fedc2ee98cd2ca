//! 导入执行器
//!
//! 状态机 `Init → Validating → Importing → Finalizing → Done`。校验失败进入
//! `Aborted`；导入或维护阶段被中断进入 `Interrupted` 并交给重试调度器；维护任务
//! 失败进入 `Failed`。导入记录在运行开始时立即创建，之后每一步都立即持久化。

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use student_import_core::{
    EntityCounter, ImportError, ImportResult, ImportRunRepository, ImporterContext,
    InterruptSignal, NewImportRun, RunLog, RunOptions, RunPhase, SourceKind, TimingEntry,
    TrackedEntity, UnitOutcome,
};

use crate::{
    isolation::{AlertPolicy, FailureIsolationBoundary},
    maintenance::PostImportMaintenance,
    registry::{ImporterRegistry, ResolvedImporter},
    report::ImportTaskReport,
    retry_scheduler::{RetryDecision, RetryScheduler},
    validator::{ConfigValidator, ValidatedScope},
};

/// 一次运行的结果；校验失败和维护失败以 `Err` 返回
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        run_id: i64,
        /// 被隔离边界吞掉的失败导入器
        failed_units: Vec<SourceKind>,
        maintenance_tasks_run: usize,
        diff: BTreeMap<TrackedEntity, i64>,
    },
    /// 运行未完成，`ended_at` 保持为空
    Interrupted { run_id: i64, retry: RetryDecision },
}

impl RunOutcome {
    pub fn run_id(&self) -> i64 {
        match self {
            RunOutcome::Completed { run_id, .. } | RunOutcome::Interrupted { run_id, .. } => *run_id,
        }
    }
}

pub struct ImportExecutor {
    runs: Arc<dyn ImportRunRepository>,
    validator: ConfigValidator,
    registry: Arc<ImporterRegistry>,
    retry: RetryScheduler,
    counter: Arc<dyn EntityCounter>,
    maintenance: PostImportMaintenance,
    alerts: AlertPolicy,
    interrupt: InterruptSignal,
}

impl ImportExecutor {
    pub fn new(
        runs: Arc<dyn ImportRunRepository>,
        validator: ConfigValidator,
        registry: Arc<ImporterRegistry>,
        retry: RetryScheduler,
        counter: Arc<dyn EntityCounter>,
    ) -> Self {
        Self {
            runs,
            validator,
            registry,
            retry,
            counter,
            maintenance: PostImportMaintenance::default(),
            alerts: AlertPolicy::disabled(),
            interrupt: InterruptSignal::never(),
        }
    }

    pub fn with_maintenance(mut self, maintenance: PostImportMaintenance) -> Self {
        self.maintenance = maintenance;
        self
    }

    pub fn with_alerts(mut self, alerts: AlertPolicy) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptSignal) -> Self {
        self.interrupt = interrupt;
        self
    }

    #[instrument(skip(self, options), fields(attempt = options.attempt()))]
    pub async fn run(&self, options: RunOptions) -> ImportResult<RunOutcome> {
        let run = self.runs.create(&NewImportRun::new(options.clone())).await?;
        let run_id = run.id;
        let log = RunLog::new(run_id, self.runs.clone());
        metrics::counter!("import_runs_started_total").increment(1);

        log.log(format!(
            "开始导入运行 #{run_id} (attempt {}, 数据源: {})",
            options.attempt(),
            options.sources().join(", ")
        ))
        .await?;

        let mut phase = self.advance(run_id, run.phase, RunPhase::Validating).await?;
        let (scope, importers) = match self.validate(&options, &log).await {
            Ok(validated) => validated,
            Err(e) => {
                error!("导入运行 #{} 校验失败: {}", run_id, e);
                log.log_best_effort(format!("校验失败，运行中止: {e}")).await;
                self.advance(run_id, phase, RunPhase::Aborted).await?;
                metrics::counter!("import_runs_aborted_total").increment(1);
                return Err(e);
            }
        };

        phase = self.advance(run_id, phase, RunPhase::Importing).await?;
        let mut report = ImportTaskReport::new(self.counter.clone());
        report.capture_initial(&log).await;

        let boundary = FailureIsolationBoundary::new(self.alerts.clone(), self.interrupt.clone());
        let mut failed_units = Vec::new();

        for importer in &importers {
            if let Some(reason) = self.interrupt.reason() {
                let interruption = ImportError::interrupted(reason);
                return self.interrupted(run_id, phase, &options, &log, interruption).await;
            }

            match self.import_one(&boundary, importer, &scope, &options, &log).await? {
                Ok(UnitOutcome::Failed) => failed_units.push(importer.kind()),
                Ok(_) => {}
                Err(interruption) => {
                    return self.interrupted(run_id, phase, &options, &log, interruption).await;
                }
            }
        }

        phase = self.advance(run_id, phase, RunPhase::Finalizing).await?;
        let maintenance_tasks_run = if options.skip_maintenance() {
            log.log("已跳过导入后维护任务").await?;
            0
        } else {
            match self.maintenance.run(&log, &self.alerts, &self.interrupt).await {
                Ok(count) => count,
                Err(e) if e.is_interrupt() => {
                    return self.interrupted(run_id, phase, &options, &log, e).await;
                }
                Err(e) => {
                    // 已导入的数据保留，不回滚
                    self.finish(run_id, phase, RunPhase::Failed).await?;
                    metrics::counter!("import_runs_failed_total").increment(1);
                    return Err(e);
                }
            }
        };

        report.capture_final(&log).await;
        log.log(report.render()).await?;

        self.finish(run_id, phase, RunPhase::Done).await?;
        metrics::counter!("import_runs_completed_total").increment(1);
        info!(
            "导入运行 #{} 完成，失败的导入器: {}",
            run_id,
            failed_units.len()
        );

        Ok(RunOutcome::Completed {
            run_id,
            failed_units,
            maintenance_tasks_run,
            diff: report.diff(),
        })
    }

    async fn validate(
        &self,
        options: &RunOptions,
        log: &RunLog,
    ) -> ImportResult<(ValidatedScope, Vec<ResolvedImporter>)> {
        // 先解析数据源，未知名称在任何写入之前失败
        let importers = self.registry.resolve(options.sources())?;
        let scope = self.validator.validate(options, log).await?;

        let order: Vec<&str> = importers.iter().map(|i| i.kind().as_str()).collect();
        log.log(format!("执行顺序: {}", order.join(" -> "))).await?;

        Ok((scope, importers))
    }

    /// 外层 `Err` 是存储错误；内层 `Err` 是中断
    async fn import_one(
        &self,
        boundary: &FailureIsolationBoundary,
        importer: &ResolvedImporter,
        scope: &ValidatedScope,
        options: &RunOptions,
        log: &RunLog,
    ) -> ImportResult<Result<UnitOutcome, ImportError>> {
        let kind = importer.kind();
        let context = ImporterContext {
            source: kind,
            school_scope: scope.school_ids.clone(),
            log: log.clone(),
            recency: options.recency(),
        };

        log.log(format!("开始导入 {}", kind.importer_name())).await?;
        let started_at = Utc::now();
        let result = boundary.execute(importer, context).await;
        let ended_at = Utc::now();

        let outcome = match &result {
            Ok(outcome) => *outcome,
            Err(_) => UnitOutcome::Interrupted,
        };
        let entry = TimingEntry {
            importer: kind.importer_name().to_string(),
            source: kind,
            started_at,
            ended_at,
            outcome,
        };
        self.runs.append_timing(log.run_id(), &entry).await?;
        log.log(format!(
            "{} 结束 ({:?}, {} ms)",
            kind.importer_name(),
            outcome,
            entry.duration_ms()
        ))
        .await?;

        Ok(result)
    }

    async fn interrupted(
        &self,
        run_id: i64,
        phase: RunPhase,
        options: &RunOptions,
        log: &RunLog,
        interruption: ImportError,
    ) -> ImportResult<RunOutcome> {
        warn!("导入运行 #{} 在 {} 阶段被中断: {}", run_id, phase, interruption);
        log.log_best_effort(format!("运行在 {phase} 阶段被中断: {interruption}"))
            .await;
        self.advance(run_id, phase, RunPhase::Interrupted).await?;
        metrics::counter!("import_runs_interrupted_total").increment(1);

        let retry = self.retry.on_interrupted(options, log).await?;
        Ok(RunOutcome::Interrupted { run_id, retry })
    }

    async fn advance(&self, run_id: i64, current: RunPhase, next: RunPhase) -> ImportResult<RunPhase> {
        let next = current.transition_to(next)?;
        self.runs.update_phase(run_id, next).await?;
        Ok(next)
    }

    async fn finish(&self, run_id: i64, current: RunPhase, next: RunPhase) -> ImportResult<RunPhase> {
        let next = current.transition_to(next)?;
        self.runs.finish(run_id, next, Utc::now()).await?;
        Ok(next)
    }
}
