use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};
use uuid::Uuid;

use student_import_core::{ImportError, ImportJob, ImportResult, JobQueue, JobStatus, RunOptions};

/// 持久化的导入任务队列，按入队时间先进先出
pub struct SqliteJobQueue {
    pool: SqlitePool,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> ImportResult<ImportJob> {
        let id: String = row.try_get("id")?;
        let options: String = row.try_get("options")?;
        let status: String = row.try_get("status")?;
        Ok(ImportJob {
            id: Uuid::parse_str(&id)
                .map_err(|e| ImportError::Serialization(format!("无效的任务ID {id}: {e}")))?,
            options: RunOptions::from_json(&options)?,
            status: status.parse()?,
            enqueued_at: row.try_get("enqueued_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    pub async fn get(&self, id: Uuid) -> ImportResult<Option<ImportJob>> {
        let row = sqlx::query(
            "SELECT id, options, status, enqueued_at, updated_at FROM import_jobs WHERE id = $1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_job).transpose()
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    #[instrument(skip(self, job), fields(job_id = %job.id, attempt = job.attempt()))]
    async fn enqueue(&self, job: &ImportJob) -> ImportResult<()> {
        sqlx::query(
            r#"
            INSERT INTO import_jobs (id, options, attempt, status, enqueued_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(job.id.to_string())
        .bind(job.options.to_json()?)
        .bind(job.attempt() as i64)
        .bind(job.status.as_str())
        .bind(job.enqueued_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("导入任务已入队: {}", job.id);
        Ok(())
    }

    async fn claim_next(&self) -> ImportResult<Option<ImportJob>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, options, status, enqueued_at, updated_at FROM import_jobs
             WHERE status = $1 ORDER BY enqueued_at, rowid LIMIT 1",
        )
        .bind(JobStatus::Pending.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let mut job = Self::row_to_job(&row)?;
        job.status = JobStatus::Running;
        job.updated_at = Utc::now();

        sqlx::query("UPDATE import_jobs SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(job.id.to_string())
            .bind(job.status.as_str())
            .bind(job.updated_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("领取导入任务: {}", job.id);
        Ok(Some(job))
    }

    async fn mark(&self, id: Uuid, status: JobStatus) -> ImportResult<()> {
        let result =
            sqlx::query("UPDATE import_jobs SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(id.to_string())
                .bind(status.as_str())
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(ImportError::Internal(format!("导入任务不存在: {id}")));
        }
        Ok(())
    }

    async fn pending_count(&self) -> ImportResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM import_jobs WHERE status = $1")
            .bind(JobStatus::Pending.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
