use async_trait::async_trait;
use sqlx::SqlitePool;

use student_import_core::{EntityCounter, ImportResult, TrackedEntity};

/// 按表统计实体数量，表名来自 [`TrackedEntity::table_name`]
pub struct SqliteEntityCounter {
    pool: SqlitePool,
}

impl SqliteEntityCounter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityCounter for SqliteEntityCounter {
    async fn count(&self, entity: TrackedEntity) -> ImportResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", entity.table_name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count as u64)
    }
}
