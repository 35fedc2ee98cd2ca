pub mod config;
pub mod errors;
pub mod interrupt;
pub mod models;
pub mod run_log;
pub mod traits;

pub use config::{AppConfig, CommandSpec, RuntimeEnvironment};
pub use errors::{ImportError, ImportResult};
pub use interrupt::{interrupt_channel, InterruptSignal, InterruptTrigger};
pub use models::*;
pub use run_log::RunLog;
pub use traits::*;
