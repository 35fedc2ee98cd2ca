pub mod alert;
pub mod district;
pub mod entity;
pub mod import_run;
pub mod job;
pub mod run_options;
pub mod source;

pub use alert::{Alert, AlertKind};
pub use district::{DistrictConfig, SchoolRecord};
pub use entity::{EntityCountSnapshot, TrackedEntity};
pub use import_run::{ImportRun, NewImportRun, RunPhase, TimingEntry, UnitOutcome};
pub use job::{ImportJob, JobStatus};
pub use run_options::{RecencyFlags, RunOptions, RunOptionsBuilder, SchoolScope, DEFAULT_SOURCES};
pub use source::{
    expand_source_names, DataFlow, MergeStrategy, SourceGroup, SourceKind, SourceSystem,
    SyncFrequency,
};
