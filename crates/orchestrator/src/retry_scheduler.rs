use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use student_import_core::{ImportJob, ImportResult, JobQueue, RunLog, RunOptions};

/// 中断后的重试决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// 已入队一次重试
    Scheduled { job_id: Uuid, attempt: u32 },
    /// 已经是重试运行，不再重试，需要人工处理
    Exhausted { attempt: u32 },
}

impl RetryDecision {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, RetryDecision::Scheduled { .. })
    }
}

/// 中断时最多入队一次重试：attempt 0 重试为 attempt 1，之后不再重试
///
/// 重试重新执行整次运行而不是从中断处继续，依赖各导入器自身的幂等性。
pub struct RetryScheduler {
    queue: Arc<dyn JobQueue>,
    max_attempt: u32,
}

impl RetryScheduler {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self {
            queue,
            max_attempt: 1,
        }
    }

    pub async fn on_interrupted(&self, options: &RunOptions, log: &RunLog) -> ImportResult<RetryDecision> {
        let attempt = options.attempt();
        if attempt >= self.max_attempt {
            warn!(
                "导入运行 #{} 在第 {} 次尝试时被中断，不再重试",
                log.run_id(),
                attempt
            );
            log.log(format!("第 {attempt} 次尝试被中断，不再重试，需要人工处理"))
                .await?;
            return Ok(RetryDecision::Exhausted { attempt });
        }

        let job = ImportJob::new(options.next_attempt());
        self.queue.enqueue(&job).await?;

        info!(
            "导入运行 #{} 被中断，已入队重试任务 {} (attempt {})",
            log.run_id(),
            job.id,
            job.attempt()
        );
        log.log(format!("已入队重试任务 {} (attempt {})", job.id, job.attempt()))
            .await?;
        metrics::counter!("import_retries_scheduled_total").increment(1);

        Ok(RetryDecision::Scheduled {
            job_id: job.id,
            attempt: job.attempt(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use student_import_core::{ImportRunRepository, NewImportRun};
    use student_import_testing_utils::{InMemoryImportRunRepository, MockJobQueue};

    async fn setup() -> (MockJobQueue, RetryScheduler, RunLog) {
        let queue = MockJobQueue::new();
        let runs = InMemoryImportRunRepository::new();
        let run = runs
            .create(&NewImportRun::new(RunOptions::default()))
            .await
            .unwrap();
        let log = RunLog::new(run.id, Arc::new(runs));
        let scheduler = RetryScheduler::new(Arc::new(queue.clone()));
        (queue, scheduler, log)
    }

    #[tokio::test]
    async fn test_first_attempt_enqueues_retry() {
        let (queue, scheduler, log) = setup().await;
        let options = RunOptions::builder()
            .schools(["SHS"])
            .sources(["students"])
            .skip_old_records(true)
            .build();

        let decision = scheduler.on_interrupted(&options, &log).await.unwrap();
        assert!(decision.is_scheduled());

        let jobs = queue.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].options.attempt(), 1);
        assert_eq!(jobs[0].options.school_scope(), options.school_scope());
        assert_eq!(jobs[0].options.sources(), options.sources());
        assert_eq!(jobs[0].options.recency(), options.recency());
    }

    #[tokio::test]
    async fn test_retry_attempt_is_not_retried_again() {
        let (queue, scheduler, log) = setup().await;
        let options = RunOptions::builder().attempt(1).build();

        let decision = scheduler.on_interrupted(&options, &log).await.unwrap();
        assert_eq!(decision, RetryDecision::Exhausted { attempt: 1 });
        assert!(queue.is_empty());
    }
}
