use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use student_import_core::{
    ImportError, ImportResult, ImportRun, ImportRunRepository, NewImportRun, RunOptions,
    RunPhase, TimingEntry,
};

pub struct SqliteImportRunRepository {
    pool: SqlitePool,
}

impl SqliteImportRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_import_run(row: &sqlx::sqlite::SqliteRow) -> ImportResult<ImportRun> {
        let options: String = row.try_get("options")?;
        let phase: String = row.try_get("phase")?;
        Ok(ImportRun {
            id: row.try_get("id")?,
            options: RunOptions::from_json(&options)?,
            phase: phase.parse()?,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
            timing: Vec::new(),
            log: row.try_get("log")?,
        })
    }

    fn row_to_timing_entry(row: &sqlx::sqlite::SqliteRow) -> ImportResult<TimingEntry> {
        let source: String = row.try_get("source")?;
        let outcome: String = row.try_get("outcome")?;
        Ok(TimingEntry {
            importer: row.try_get("importer")?,
            source: source.parse()?,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
            outcome: outcome.parse()?,
        })
    }

    async fn load_timing(&self, run_id: i64) -> ImportResult<Vec<TimingEntry>> {
        let rows = sqlx::query(
            "SELECT importer, source, started_at, ended_at, outcome
             FROM import_run_timings WHERE run_id = $1 ORDER BY id",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_timing_entry).collect()
    }

    fn ensure_updated(rows_affected: u64, id: i64) -> ImportResult<()> {
        if rows_affected == 0 {
            return Err(ImportError::RunNotFound { id });
        }
        Ok(())
    }
}

#[async_trait]
impl ImportRunRepository for SqliteImportRunRepository {
    #[instrument(skip(self, run), fields(attempt = run.options.attempt()))]
    async fn create(&self, run: &NewImportRun) -> ImportResult<ImportRun> {
        let row = sqlx::query(
            r#"
            INSERT INTO import_runs (options, phase, started_at, log)
            VALUES ($1, $2, $3, '')
            RETURNING id, options, phase, started_at, ended_at, log
            "#,
        )
        .bind(run.options.to_json()?)
        .bind(RunPhase::Init.as_str())
        .bind(run.started_at)
        .fetch_one(&self.pool)
        .await?;

        let created = Self::row_to_import_run(&row)?;
        debug!("创建导入记录成功: ID {}", created.id);
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> ImportResult<Option<ImportRun>> {
        let row = sqlx::query(
            "SELECT id, options, phase, started_at, ended_at, log FROM import_runs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut run = Self::row_to_import_run(&row)?;
                run.timing = self.load_timing(id).await?;
                Ok(Some(run))
            }
            None => Ok(None),
        }
    }

    async fn append_log(&self, id: i64, text: &str) -> ImportResult<()> {
        let result = sqlx::query("UPDATE import_runs SET log = log || $2 WHERE id = $1")
            .bind(id)
            .bind(text)
            .execute(&self.pool)
            .await?;
        Self::ensure_updated(result.rows_affected(), id)
    }

    #[instrument(skip(self, entry), fields(importer = %entry.importer))]
    async fn append_timing(&self, id: i64, entry: &TimingEntry) -> ImportResult<()> {
        sqlx::query(
            r#"
            INSERT INTO import_run_timings (run_id, importer, source, started_at, ended_at, outcome)
            SELECT id, $2, $3, $4, $5, $6 FROM import_runs WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&entry.importer)
        .bind(entry.source.as_str())
        .bind(entry.started_at)
        .bind(entry.ended_at)
        .bind(entry.outcome.as_str())
        .execute(&self.pool)
        .await
        .map_err(ImportError::Database)
        .and_then(|result| Self::ensure_updated(result.rows_affected(), id))
    }

    async fn update_phase(&self, id: i64, phase: RunPhase) -> ImportResult<()> {
        let result = sqlx::query("UPDATE import_runs SET phase = $2 WHERE id = $1")
            .bind(id)
            .bind(phase.as_str())
            .execute(&self.pool)
            .await?;

        debug!("导入记录 {} 进入阶段 {}", id, phase);
        Self::ensure_updated(result.rows_affected(), id)
    }

    async fn finish(&self, id: i64, phase: RunPhase, ended_at: DateTime<Utc>) -> ImportResult<()> {
        let result = sqlx::query("UPDATE import_runs SET phase = $2, ended_at = $3 WHERE id = $1")
            .bind(id)
            .bind(phase.as_str())
            .bind(ended_at)
            .execute(&self.pool)
            .await?;
        Self::ensure_updated(result.rows_affected(), id)
    }

    async fn list_recent(&self, limit: i64) -> ImportResult<Vec<ImportRun>> {
        let rows = sqlx::query(
            "SELECT id, options, phase, started_at, ended_at, log
             FROM import_runs ORDER BY started_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut runs = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut run = Self::row_to_import_run(row)?;
            run.timing = self.load_timing(run.id).await?;
            runs.push(run);
        }
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;
    use chrono::Duration;
    use student_import_core::{SourceKind, UnitOutcome};

    async fn setup() -> (DatabaseManager, SqliteImportRunRepository) {
        let db = DatabaseManager::in_memory().await.unwrap();
        let repo = db.import_run_repository();
        (db, repo)
    }

    #[tokio::test]
    async fn test_create_starts_in_init_without_end() {
        let (_db, repo) = setup().await;
        let options = RunOptions::builder()
            .schools(["SHS"])
            .sources(["students"])
            .attempt(1)
            .build();

        let run = repo.create(&NewImportRun::new(options.clone())).await.unwrap();
        assert_eq!(run.phase, RunPhase::Init);
        assert!(run.ended_at.is_none());
        assert_eq!(run.options, options);

        let loaded = repo.get_by_id(run.id).await.unwrap().unwrap();
        assert_eq!(loaded.options, options);
        assert_eq!(loaded.started_at, run.started_at);
    }

    #[tokio::test]
    async fn test_log_and_timing_are_appended_in_order() {
        let (_db, repo) = setup().await;
        let run = repo
            .create(&NewImportRun::new(RunOptions::default()))
            .await
            .unwrap();

        repo.append_log(run.id, "first\n").await.unwrap();
        repo.append_log(run.id, "second\n").await.unwrap();

        let start = Utc::now();
        for (offset, (source, outcome)) in [
            (SourceKind::Educators, UnitOutcome::Succeeded),
            (SourceKind::Students, UnitOutcome::Failed),
        ]
        .into_iter()
        .enumerate()
        {
            let started_at = start + Duration::seconds(offset as i64);
            repo.append_timing(
                run.id,
                &TimingEntry {
                    importer: source.importer_name().to_string(),
                    source,
                    started_at,
                    ended_at: started_at + Duration::milliseconds(500),
                    outcome,
                },
            )
            .await
            .unwrap();
        }

        let loaded = repo.get_by_id(run.id).await.unwrap().unwrap();
        assert_eq!(loaded.log, "first\nsecond\n");
        assert_eq!(loaded.timing.len(), 2);
        assert_eq!(loaded.timing[0].source, SourceKind::Educators);
        assert_eq!(loaded.timing[1].outcome, UnitOutcome::Failed);
        assert_eq!(loaded.timing[1].duration_ms(), 500);
    }

    #[tokio::test]
    async fn test_finish_sets_phase_and_end() {
        let (_db, repo) = setup().await;
        let run = repo
            .create(&NewImportRun::new(RunOptions::default()))
            .await
            .unwrap();

        repo.update_phase(run.id, RunPhase::Validating).await.unwrap();
        repo.update_phase(run.id, RunPhase::Aborted).await.unwrap();
        let aborted = repo.get_by_id(run.id).await.unwrap().unwrap();
        assert_eq!(aborted.phase, RunPhase::Aborted);
        assert!(aborted.ended_at.is_none());

        let other = repo
            .create(&NewImportRun::new(RunOptions::default()))
            .await
            .unwrap();
        repo.finish(other.id, RunPhase::Done, Utc::now()).await.unwrap();
        let done = repo.get_by_id(other.id).await.unwrap().unwrap();
        assert_eq!(done.phase, RunPhase::Done);
        assert!(done.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_run_is_reported() {
        let (_db, repo) = setup().await;
        assert!(repo.get_by_id(99).await.unwrap().is_none());
        assert!(matches!(
            repo.append_log(99, "x").await,
            Err(ImportError::RunNotFound { id: 99 })
        ));
        assert!(matches!(
            repo.update_phase(99, RunPhase::Done).await,
            Err(ImportError::RunNotFound { id: 99 })
        ));
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let (_db, repo) = setup().await;
        let base = Utc::now();
        for i in 0..3 {
            let mut new_run = NewImportRun::new(RunOptions::default());
            new_run.started_at = base + Duration::minutes(i);
            repo.create(&new_run).await.unwrap();
        }

        let recent = repo.list_recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, 3);
        assert_eq!(recent[1].id, 2);
    }
}
