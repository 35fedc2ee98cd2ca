//! 应用配置：默认值、TOML文件与 `STUDENT_IMPORT_` 环境变量三层合并

pub mod models;

pub use models::*;
