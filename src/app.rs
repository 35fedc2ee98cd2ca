use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use student_import_core::{
    AlertChannel, AppConfig, ImportJob, ImportRun, ImportRunRepository, InterruptSignal,
    JobQueue, JobStatus, RunOptions, RunOptionsBuilder,
};
use student_import_infrastructure::{
    standard_tasks, DatabaseManager, FileDistrictConfigProvider, TracingAlertChannel,
    WebhookAlertChannel,
};
use student_import_orchestrator::{
    AlertPolicy, ConfigValidator, ImportExecutor, ImporterRegistry, PostImportMaintenance,
    RetryScheduler, RunOutcome,
};

use crate::importers::standard_registry;

/// 主应用程序：持有数据库和注册表，按需组装执行器
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    registry: Arc<ImporterRegistry>,
    interrupt: InterruptSignal,
}

impl Application {
    pub async fn new(config: AppConfig, interrupt: InterruptSignal) -> Result<Self> {
        info!(
            "初始化应用程序，环境: {:?}，区: {}",
            config.environment, config.district.key
        );

        let database = DatabaseManager::new(&config.database)
            .await
            .with_context(|| format!("连接数据库失败: {}", config.database.url))?;
        database
            .migrate()
            .await
            .context("初始化数据库表结构失败")?;

        let registry = standard_registry(&config.importers).context("构建导入器注册表失败")?;

        Ok(Self {
            config,
            database,
            registry: Arc::new(registry),
            interrupt,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.database
    }

    /// 用配置中的默认数据源补全未指定的数据源
    pub fn options_with_defaults(
        &self,
        schools: Vec<String>,
        sources: Vec<String>,
    ) -> RunOptionsBuilder {
        let sources = if sources.is_empty() {
            self.config.importers.default_sources.clone()
        } else {
            sources
        };
        RunOptions::builder().schools(schools).sources(sources)
    }

    fn alert_policy(&self) -> Result<AlertPolicy> {
        let alerting = &self.config.alerting;
        let channel: Arc<dyn AlertChannel> = match &alerting.webhook_url {
            Some(url) => Arc::new(
                WebhookAlertChannel::new(url, Duration::from_secs(alerting.timeout_seconds))
                    .context("创建告警通道失败")?,
            ),
            None => Arc::new(TracingAlertChannel),
        };
        Ok(AlertPolicy::new(channel, self.config.environment))
    }

    pub fn executor(&self) -> Result<ImportExecutor> {
        let runs: Arc<dyn ImportRunRepository> = Arc::new(self.database.import_run_repository());
        let validator = ConfigValidator::new(
            &self.config.district.key,
            Arc::new(FileDistrictConfigProvider::new(&self.config.district.config_dir)),
            Arc::new(self.database.school_repository()),
        );
        let retry = RetryScheduler::new(Arc::new(self.database.job_queue()));

        Ok(ImportExecutor::new(
            runs,
            validator,
            Arc::clone(&self.registry),
            retry,
            Arc::new(self.database.entity_counter()),
        )
        .with_maintenance(PostImportMaintenance::new(standard_tasks(
            self.database.pool(),
        )))
        .with_alerts(self.alert_policy()?)
        .with_interrupt(self.interrupt.clone()))
    }

    /// 在当前进程中执行一次导入
    pub async fn run_once(&self, options: RunOptions) -> Result<RunOutcome> {
        let executor = self.executor()?;
        executor.run(options).await.context("导入运行失败")
    }

    pub async fn enqueue(&self, options: RunOptions) -> Result<ImportJob> {
        let job = ImportJob::new(options);
        self.database
            .job_queue()
            .enqueue(&job)
            .await
            .context("导入任务入队失败")?;
        info!("导入任务已入队: {}", job.id);
        Ok(job)
    }

    /// 单个worker依次消费任务队列，返回处理的任务数
    ///
    /// `drain` 为真时队列为空即返回，否则按配置的间隔轮询直到收到中断。
    pub async fn work(&self, drain: bool) -> Result<usize> {
        let queue = self.database.job_queue();
        let executor = self.executor()?;
        let poll_interval = Duration::from_secs(self.config.worker.poll_interval_seconds);
        let mut processed = 0;

        info!("Worker启动，轮询间隔 {}秒", poll_interval.as_secs());
        loop {
            if let Some(reason) = self.interrupt.reason() {
                info!("Worker停止: {reason}");
                break;
            }

            match queue.claim_next().await.context("领取导入任务失败")? {
                Some(job) => {
                    processed += 1;
                    let status = Self::process(&executor, &job).await;
                    queue
                        .mark(job.id, status)
                        .await
                        .with_context(|| format!("更新导入任务状态失败: {}", job.id))?;
                }
                None if drain => break,
                None => {
                    tokio::select! {
                        reason = self.interrupt.raised() => {
                            info!("Worker停止: {reason}");
                            break;
                        }
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
            }
        }

        Ok(processed)
    }

    /// 被中断的任务标记为失败，重试由执行器另行入队
    async fn process(executor: &ImportExecutor, job: &ImportJob) -> JobStatus {
        info!("开始处理导入任务: {}，第 {} 次尝试", job.id, job.attempt());
        match executor.run(job.options.clone()).await {
            Ok(RunOutcome::Completed {
                run_id,
                failed_units,
                ..
            }) => {
                if failed_units.is_empty() {
                    info!("导入任务 {} 完成 (run_id={run_id})", job.id);
                } else {
                    warn!(
                        "导入任务 {} 完成，失败的导入器: {:?} (run_id={run_id})",
                        job.id, failed_units
                    );
                }
                JobStatus::Completed
            }
            Ok(RunOutcome::Interrupted { run_id, retry }) => {
                warn!(
                    "导入任务 {} 被中断 (run_id={run_id})，重试: {:?}",
                    job.id, retry
                );
                JobStatus::Failed
            }
            Err(e) => {
                error!("导入任务 {} 失败: {e}", job.id);
                JobStatus::Failed
            }
        }
    }

    pub async fn history(&self, limit: i64) -> Result<Vec<ImportRun>> {
        self.database
            .import_run_repository()
            .list_recent(limit)
            .await
            .context("查询导入记录失败")
    }

    pub async fn close(&self) {
        self.database.close().await;
    }
}
