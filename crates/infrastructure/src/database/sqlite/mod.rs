pub mod sqlite_entity_counter;
pub mod sqlite_import_run_repository;
pub mod sqlite_job_queue;
pub mod sqlite_school_repository;

pub use sqlite_entity_counter::SqliteEntityCounter;
pub use sqlite_import_run_repository::SqliteImportRunRepository;
pub use sqlite_job_queue::SqliteJobQueue;
pub use sqlite_school_repository::SqliteSchoolRepository;
