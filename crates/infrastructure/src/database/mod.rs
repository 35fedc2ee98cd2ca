pub mod schema;
pub mod sqlite;

pub use sqlite::{
    SqliteEntityCounter, SqliteImportRunRepository, SqliteJobQueue, SqliteSchoolRepository,
};

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use student_import_core::{config::DatabaseConfig, ImportResult};

/// SQLite连接池与表结构管理
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> ImportResult<Self> {
        debug!("连接数据库: {}", config.url);

        // 启用外键约束和WAL模式
        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(1800)) // 30分钟默认生命周期
            .connect_with(connect_options)
            .await?;

        Ok(Self { pool })
    }

    /// 单连接的内存数据库，连接关闭后数据即丢失
    pub async fn in_memory() -> ImportResult<Self> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await?;

        let manager = Self { pool };
        manager.migrate().await?;
        Ok(manager)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 创建缺失的表和索引，可重复执行
    pub async fn migrate(&self) -> ImportResult<()> {
        debug!("Running SQLite database migrations");
        for statement in schema::STATEMENTS {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        info!("数据库表结构已就绪");
        Ok(())
    }

    pub async fn health_check(&self) -> ImportResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn import_run_repository(&self) -> SqliteImportRunRepository {
        SqliteImportRunRepository::new(self.pool.clone())
    }

    pub fn school_repository(&self) -> SqliteSchoolRepository {
        SqliteSchoolRepository::new(self.pool.clone())
    }

    pub fn job_queue(&self) -> SqliteJobQueue {
        SqliteJobQueue::new(self.pool.clone())
    }

    pub fn entity_counter(&self) -> SqliteEntityCounter {
        SqliteEntityCounter::new(self.pool.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
