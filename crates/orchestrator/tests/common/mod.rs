#![allow(dead_code)]

use std::sync::Arc;

use student_import_core::{
    InterruptSignal, MaintenanceTask, RuntimeEnvironment, SourceKind,
};
use student_import_orchestrator::{
    AlertPolicy, ConfigValidator, ImportExecutor, ImporterDefinition, ImporterRegistry,
    PostImportMaintenance, RetryScheduler,
};
use student_import_testing_utils::{
    demo_district, InMemoryEntityStore, InMemoryImportRunRepository, MockJobQueue,
    MockSchoolRepository, RecordingAlertChannel, ScriptedImporters, StaticDistrictProvider,
};

/// Wires an executor over in-memory doubles
pub struct Harness {
    pub runs: InMemoryImportRunRepository,
    pub schools: MockSchoolRepository,
    pub districts: StaticDistrictProvider,
    pub queue: MockJobQueue,
    pub alerts: RecordingAlertChannel,
    pub store: InMemoryEntityStore,
    pub importers: ScriptedImporters,
    pub environment: RuntimeEnvironment,
    pub tasks: Vec<Arc<dyn MaintenanceTask>>,
    pub interrupt: InterruptSignal,
}

impl Harness {
    pub fn new() -> Self {
        let store = InMemoryEntityStore::new();
        Self {
            runs: InMemoryImportRunRepository::new(),
            schools: MockSchoolRepository::new(),
            districts: StaticDistrictProvider::with_district(demo_district()),
            queue: MockJobQueue::new(),
            alerts: RecordingAlertChannel::new(),
            importers: ScriptedImporters::new(store.clone()),
            store,
            environment: RuntimeEnvironment::Production,
            tasks: Vec::new(),
            interrupt: InterruptSignal::never(),
        }
    }

    pub fn registry(&self) -> ImporterRegistry {
        SourceKind::ALL
            .iter()
            .fold(ImporterRegistry::builder(), |builder, &kind| {
                builder.register(ImporterDefinition::new(kind, self.importers.factory()))
            })
            .build()
            .unwrap()
    }

    pub fn executor(&self) -> ImportExecutor {
        let validator = ConfigValidator::new(
            "demo",
            Arc::new(self.districts.clone()),
            Arc::new(self.schools.clone()),
        );

        ImportExecutor::new(
            Arc::new(self.runs.clone()),
            validator,
            Arc::new(self.registry()),
            RetryScheduler::new(Arc::new(self.queue.clone())),
            Arc::new(self.store.clone()),
        )
        .with_maintenance(PostImportMaintenance::new(self.tasks.clone()))
        .with_alerts(AlertPolicy::new(
            Arc::new(self.alerts.clone()),
            self.environment,
        ))
        .with_interrupt(self.interrupt.clone())
    }
}
