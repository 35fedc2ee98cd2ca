use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use student_import_core::{ImportResult, SchoolRecord, SchoolRepository};

pub struct SqliteSchoolRepository {
    pool: SqlitePool,
}

impl SqliteSchoolRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_school(row: &sqlx::sqlite::SqliteRow) -> ImportResult<SchoolRecord> {
        Ok(SchoolRecord {
            local_id: row.try_get("local_id")?,
            name: row.try_get("name")?,
            school_type: row.try_get("school_type")?,
        })
    }
}

#[async_trait]
impl SchoolRepository for SqliteSchoolRepository {
    async fn count(&self) -> ImportResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schools")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    #[instrument(skip(self, schools), fields(count = schools.len()))]
    async fn seed(&self, schools: &[SchoolRecord]) -> ImportResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for school in schools {
            let result = sqlx::query(
                "INSERT INTO schools (local_id, name, school_type) VALUES ($1, $2, $3)
                 ON CONFLICT(local_id) DO NOTHING",
            )
            .bind(&school.local_id)
            .bind(&school.name)
            .bind(&school.school_type)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        debug!("写入学校 {} 所", inserted);
        Ok(inserted)
    }

    async fn find_by_local_id(&self, local_id: &str) -> ImportResult<Option<SchoolRecord>> {
        let row = sqlx::query("SELECT local_id, name, school_type FROM schools WHERE local_id = $1")
            .bind(local_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_school).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;

    #[tokio::test]
    async fn test_seed_skips_existing_schools() {
        let db = DatabaseManager::in_memory().await.unwrap();
        let repo = db.school_repository();
        assert_eq!(repo.count().await.unwrap(), 0);

        let schools = vec![
            SchoolRecord::new("SHS", "Somerville High"),
            SchoolRecord::new("BRN", "Brown"),
        ];
        assert_eq!(repo.seed(&schools).await.unwrap(), 2);
        assert_eq!(repo.seed(&schools).await.unwrap(), 0);
        assert_eq!(repo.count().await.unwrap(), 2);

        let found = repo.find_by_local_id("BRN").await.unwrap().unwrap();
        assert_eq!(found.name, "Brown");
        assert!(repo.find_by_local_id("ZZZ").await.unwrap().is_none());
    }
}
