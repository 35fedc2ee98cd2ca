//! 导入后的派生数据维护任务（SQLite实现）
//!
//! 每个任务都是幂等的：重复执行只会把目标数据重新计算成同样的结果。

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use student_import_core::{ImportError, ImportResult, MaintenanceTask};

/// 按百分位把学生划分为风险等级 0-3，没有测评记录的学生等级为空
const UPDATE_RISK_LEVELS: &str = r#"
    INSERT INTO student_risk_levels (student_id, level, updated_at)
    SELECT s.id,
           CASE
               WHEN latest.percentile_rank IS NULL THEN NULL
               WHEN latest.percentile_rank < 10 THEN 3
               WHEN latest.percentile_rank < 25 THEN 2
               WHEN latest.percentile_rank < 50 THEN 1
               ELSE 0
           END,
           CURRENT_TIMESTAMP
    FROM students s
    LEFT JOIN student_assessments latest ON latest.id = (
        SELECT sa.id FROM student_assessments sa
        WHERE sa.student_id = s.id
        ORDER BY sa.date_taken DESC, sa.id DESC
        LIMIT 1
    )
    WHERE true
    ON CONFLICT(student_id) DO UPDATE SET level = excluded.level, updated_at = excluded.updated_at
"#;

const UPDATE_RECENT_STUDENT_ASSESSMENTS: &str = r#"
    UPDATE students SET most_recent_assessment_id = (
        SELECT sa.id FROM student_assessments sa
        WHERE sa.student_id = students.id
        ORDER BY sa.date_taken DESC, sa.id DESC
        LIMIT 1
    )
"#;

const DESTROY_EMPTY_HOMEROOMS: &str = r#"
    DELETE FROM homerooms
    WHERE NOT EXISTS (SELECT 1 FROM students s WHERE s.homeroom_id = homerooms.id)
"#;

/// 在一个事务中执行一组SQL语句的维护任务
pub struct SqlMaintenanceTask {
    name: String,
    statements: Vec<&'static str>,
    pool: SqlitePool,
}

impl SqlMaintenanceTask {
    pub fn new(name: impl Into<String>, statements: Vec<&'static str>, pool: SqlitePool) -> Self {
        Self {
            name: name.into(),
            statements,
            pool,
        }
    }
}

#[async_trait]
impl MaintenanceTask for SqlMaintenanceTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> ImportResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ImportError::maintenance(&self.name, e))?;

        let mut affected = 0;
        for statement in &self.statements {
            let result = sqlx::query(*statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| ImportError::maintenance(&self.name, e))?;
            affected += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| ImportError::maintenance(&self.name, e))?;

        debug!("维护任务 {} 影响 {} 行", self.name, affected);
        Ok(())
    }
}

/// 标准维护任务列表，顺序固定
pub fn standard_tasks(pool: &SqlitePool) -> Vec<Arc<dyn MaintenanceTask>> {
    vec![
        Arc::new(SqlMaintenanceTask::new(
            "update_risk_levels",
            vec![UPDATE_RISK_LEVELS],
            pool.clone(),
        )),
        Arc::new(SqlMaintenanceTask::new(
            "update_recent_student_assessments",
            vec![UPDATE_RECENT_STUDENT_ASSESSMENTS],
            pool.clone(),
        )),
        Arc::new(SqlMaintenanceTask::new(
            "destroy_empty_homerooms",
            vec![DESTROY_EMPTY_HOMEROOMS],
            pool.clone(),
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;

    async fn seed(db: &DatabaseManager) {
        for statement in [
            "INSERT INTO homerooms (id, name) VALUES (1, 'HEA 100'), (2, 'HEA 200')",
            "INSERT INTO students (id, local_id, homeroom_id) VALUES (1, '111', 1), (2, '222', 1), (3, '333', NULL)",
            "INSERT INTO student_assessments (id, student_id, assessment_family, percentile_rank, date_taken)
             VALUES (1, 1, 'STAR', 80, '2024-09-01T00:00:00Z'),
                    (2, 1, 'STAR', 5, '2025-01-15T00:00:00Z'),
                    (3, 2, 'MCAS', 30, '2024-05-01T00:00:00Z')",
        ] {
            sqlx::query(statement).execute(db.pool()).await.unwrap();
        }
    }

    async fn risk_level(db: &DatabaseManager, student_id: i64) -> Option<i64> {
        sqlx::query_scalar("SELECT level FROM student_risk_levels WHERE student_id = $1")
            .bind(student_id)
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_standard_tasks_are_idempotent() {
        let db = DatabaseManager::in_memory().await.unwrap();
        seed(&db).await;
        let tasks = standard_tasks(db.pool());
        let names: Vec<&str> = tasks.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "update_risk_levels",
                "update_recent_student_assessments",
                "destroy_empty_homerooms"
            ]
        );

        for _ in 0..2 {
            for task in &tasks {
                task.run().await.unwrap();
            }

            assert_eq!(risk_level(&db, 1).await, Some(3));
            assert_eq!(risk_level(&db, 2).await, Some(1));
            assert_eq!(risk_level(&db, 3).await, None);

            let recent: Option<i64> =
                sqlx::query_scalar("SELECT most_recent_assessment_id FROM students WHERE id = 1")
                    .fetch_one(db.pool())
                    .await
                    .unwrap();
            assert_eq!(recent, Some(2));

            let homerooms: Vec<i64> = sqlx::query_scalar("SELECT id FROM homerooms ORDER BY id")
                .fetch_all(db.pool())
                .await
                .unwrap();
            assert_eq!(homerooms, vec![1]);
        }
    }

    #[tokio::test]
    async fn test_failure_is_reported_as_maintenance_failure() {
        let db = DatabaseManager::in_memory().await.unwrap();
        let task = SqlMaintenanceTask::new(
            "broken",
            vec!["UPDATE no_such_table SET x = 1"],
            db.pool().clone(),
        );

        let err = task.run().await.unwrap_err();
        assert!(matches!(err, ImportError::MaintenanceFailure { ref task, .. } if task == "broken"));
    }
}
