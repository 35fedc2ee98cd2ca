pub mod app_config;
pub mod database;
pub mod district;
pub mod importers;
pub mod observability;

pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use district::{DistrictSettings, RuntimeEnvironment};
pub use importers::{CommandSpec, ImportersConfig};
pub use observability::{AlertingConfig, ObservabilityConfig, WorkerConfig};
