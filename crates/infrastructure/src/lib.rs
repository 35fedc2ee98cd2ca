pub mod alerting;
pub mod command_importer;
pub mod database;
pub mod district;
pub mod maintenance;

pub use alerting::{TracingAlertChannel, WebhookAlertChannel};
pub use command_importer::{CommandImporter, CommandImporterFactory};
pub use database::*;
pub use district::FileDistrictConfigProvider;
pub use maintenance::{standard_tasks, SqlMaintenanceTask};
