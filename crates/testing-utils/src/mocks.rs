//! Mock implementations for the repository and port traits
//!
//! In-memory doubles that record what the orchestrator did, so tests can
//! assert on the audit trail, queued jobs and alerts without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use student_import_core::{
    Alert, AlertChannel, DistrictConfig, DistrictConfigProvider, EntityCounter, ImportError,
    ImportJob, ImportResult, ImportRun, ImportRunRepository, ImporterContext, ImporterFactory,
    ImporterUnit, JobQueue, JobStatus, MaintenanceTask, NewImportRun, RunPhase, SchoolRecord,
    SchoolRepository, SourceKind, TimingEntry, TrackedEntity,
};

/// Mock implementation of ImportRunRepository for testing
#[derive(Debug, Clone)]
pub struct InMemoryImportRunRepository {
    runs: Arc<Mutex<BTreeMap<i64, ImportRun>>>,
    next_id: Arc<Mutex<i64>>,
}

impl InMemoryImportRunRepository {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    pub fn get(&self, id: i64) -> Option<ImportRun> {
        self.runs.lock().unwrap().get(&id).cloned()
    }

    pub fn all_runs(&self) -> Vec<ImportRun> {
        self.runs.lock().unwrap().values().cloned().collect()
    }

    fn with_run<T>(&self, id: i64, f: impl FnOnce(&mut ImportRun) -> T) -> ImportResult<T> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs.get_mut(&id).ok_or(ImportError::RunNotFound { id })?;
        Ok(f(run))
    }
}

impl Default for InMemoryImportRunRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImportRunRepository for InMemoryImportRunRepository {
    async fn create(&self, run: &NewImportRun) -> ImportResult<ImportRun> {
        let mut runs = self.runs.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let created = ImportRun {
            id: *next_id,
            options: run.options.clone(),
            phase: RunPhase::Init,
            started_at: run.started_at,
            ended_at: None,
            timing: Vec::new(),
            log: String::new(),
        };
        *next_id += 1;

        runs.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> ImportResult<Option<ImportRun>> {
        Ok(self.get(id))
    }

    async fn append_log(&self, id: i64, text: &str) -> ImportResult<()> {
        self.with_run(id, |run| run.log.push_str(text))
    }

    async fn append_timing(&self, id: i64, entry: &TimingEntry) -> ImportResult<()> {
        self.with_run(id, |run| run.timing.push(entry.clone()))
    }

    async fn update_phase(&self, id: i64, phase: RunPhase) -> ImportResult<()> {
        self.with_run(id, |run| run.phase = phase)
    }

    async fn finish(&self, id: i64, phase: RunPhase, ended_at: DateTime<Utc>) -> ImportResult<()> {
        self.with_run(id, |run| {
            run.phase = phase;
            run.ended_at = Some(ended_at);
        })
    }

    async fn list_recent(&self, limit: i64) -> ImportResult<Vec<ImportRun>> {
        let runs = self.runs.lock().unwrap();
        let mut recent: Vec<ImportRun> = runs.values().cloned().collect();
        recent.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        recent.truncate(limit.max(0) as usize);
        Ok(recent)
    }
}

/// Mock implementation of SchoolRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockSchoolRepository {
    schools: Arc<Mutex<Vec<SchoolRecord>>>,
    seed_calls: Arc<AtomicUsize>,
}

impl MockSchoolRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schools(schools: Vec<SchoolRecord>) -> Self {
        Self {
            schools: Arc::new(Mutex::new(schools)),
            seed_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn school_ids(&self) -> Vec<String> {
        self.schools
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.local_id.clone())
            .collect()
    }

    pub fn seed_calls(&self) -> usize {
        self.seed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchoolRepository for MockSchoolRepository {
    async fn count(&self) -> ImportResult<u64> {
        Ok(self.schools.lock().unwrap().len() as u64)
    }

    async fn seed(&self, schools: &[SchoolRecord]) -> ImportResult<u64> {
        self.seed_calls.fetch_add(1, Ordering::SeqCst);
        let mut stored = self.schools.lock().unwrap();
        let mut inserted = 0;
        for school in schools {
            if !stored.iter().any(|s| s.local_id == school.local_id) {
                stored.push(school.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn find_by_local_id(&self, local_id: &str) -> ImportResult<Option<SchoolRecord>> {
        Ok(self
            .schools
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.local_id == local_id)
            .cloned())
    }
}

/// District provider backed by a fixed map; unknown keys are configuration errors
#[derive(Debug, Clone, Default)]
pub struct StaticDistrictProvider {
    districts: Arc<Mutex<HashMap<String, DistrictConfig>>>,
}

impl StaticDistrictProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_district(district: DistrictConfig) -> Self {
        let provider = Self::new();
        provider.insert(district);
        provider
    }

    pub fn insert(&self, district: DistrictConfig) {
        self.districts
            .lock()
            .unwrap()
            .insert(district.key.clone(), district);
    }
}

#[async_trait]
impl DistrictConfigProvider for StaticDistrictProvider {
    async fn load(&self, district_key: &str) -> ImportResult<DistrictConfig> {
        self.districts
            .lock()
            .unwrap()
            .get(district_key)
            .cloned()
            .ok_or_else(|| ImportError::Configuration(format!("区配置不存在: {district_key}")))
    }
}

/// Alert channel that keeps every alert it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingAlertChannel {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingAlertChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertChannel for RecordingAlertChannel {
    async fn send(&self, alert: &Alert) -> ImportResult<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// In-memory entity table sizes; importers scripted with `Upsert` write here
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntityStore {
    counts: Arc<Mutex<BTreeMap<TrackedEntity, u64>>>,
    failing: Arc<Mutex<HashSet<TrackedEntity>>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, entity: TrackedEntity, count: u64) {
        self.counts.lock().unwrap().insert(entity, count);
    }

    pub fn add(&self, entity: TrackedEntity, count: u64) {
        *self.counts.lock().unwrap().entry(entity).or_insert(0) += count;
    }

    pub fn get(&self, entity: TrackedEntity) -> u64 {
        self.counts
            .lock()
            .unwrap()
            .get(&entity)
            .copied()
            .unwrap_or(0)
    }

    /// Make counting this entity fail
    pub fn fail_counting(&self, entity: TrackedEntity) {
        self.failing.lock().unwrap().insert(entity);
    }
}

#[async_trait]
impl EntityCounter for InMemoryEntityStore {
    async fn count(&self, entity: TrackedEntity) -> ImportResult<u64> {
        if self.failing.lock().unwrap().contains(&entity) {
            return Err(ImportError::Internal(format!(
                "无法统计 {}",
                entity.table_name()
            )));
        }
        Ok(self.get(entity))
    }
}

/// Mock implementation of JobQueue for testing
#[derive(Debug, Clone, Default)]
pub struct MockJobQueue {
    jobs: Arc<Mutex<VecDeque<ImportJob>>>,
}

impl MockJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<ImportJob> {
        self.jobs.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobQueue for MockJobQueue {
    async fn enqueue(&self, job: &ImportJob) -> ImportResult<()> {
        self.jobs.lock().unwrap().push_back(job.clone());
        Ok(())
    }

    async fn claim_next(&self) -> ImportResult<Option<ImportJob>> {
        let mut jobs = self.jobs.lock().unwrap();
        let next = jobs.iter_mut().find(|j| j.status == JobStatus::Pending);
        Ok(next.map(|job| {
            job.status = JobStatus::Running;
            job.updated_at = Utc::now();
            job.clone()
        }))
    }

    async fn mark(&self, id: Uuid, status: JobStatus) -> ImportResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| ImportError::Internal(format!("任务不存在: {id}")))?;
        job.status = status;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn pending_count(&self) -> ImportResult<u64> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .count() as u64)
    }
}

/// What a scripted importer does when `import()` is called
#[derive(Debug, Clone, PartialEq)]
pub enum ImporterScript {
    Succeed,
    /// Return an ordinary importer failure
    Fail(String),
    /// Return an interrupting signal
    Interrupt(String),
    /// Fail while the factory builds the unit
    FailToBuild(String),
    /// Set the entity count to a fixed value; idempotent on re-run
    Upsert { entity: TrackedEntity, count: u64 },
    /// Blocks until the interrupt fires or the timeout elapses
    Hang(Duration),
}

/// A record of one importer execution
#[derive(Debug, Clone)]
pub struct ExecutedImport {
    pub source: SourceKind,
    pub school_scope: Vec<String>,
    pub run_id: i64,
}

/// Hands out factories whose units follow per-kind scripts
#[derive(Debug, Clone, Default)]
pub struct ScriptedImporters {
    scripts: Arc<Mutex<HashMap<SourceKind, ImporterScript>>>,
    executions: Arc<Mutex<Vec<ExecutedImport>>>,
    store: InMemoryEntityStore,
}

impl ScriptedImporters {
    pub fn new(store: InMemoryEntityStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    pub fn script(&self, kind: SourceKind, script: ImporterScript) -> &Self {
        self.scripts.lock().unwrap().insert(kind, script);
        self
    }

    /// Kinds in the order they were executed
    pub fn executed(&self) -> Vec<SourceKind> {
        self.executions
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.source)
            .collect()
    }

    pub fn executions(&self) -> Vec<ExecutedImport> {
        self.executions.lock().unwrap().clone()
    }

    pub fn factory(&self) -> Arc<dyn ImporterFactory> {
        let scripts = self.scripts.clone();
        let executions = self.executions.clone();
        let store = self.store.clone();

        Arc::new(
            move |context: ImporterContext| -> ImportResult<Box<dyn ImporterUnit>> {
                let script = scripts
                    .lock()
                    .unwrap()
                    .get(&context.source)
                    .cloned()
                    .unwrap_or(ImporterScript::Succeed);
                if let ImporterScript::FailToBuild(message) = &script {
                    return Err(ImportError::importer(context.source.importer_name(), message));
                }
                Ok(Box::new(ScriptedUnit {
                    context,
                    script,
                    executions: executions.clone(),
                    store: store.clone(),
                }))
            },
        )
    }
}

struct ScriptedUnit {
    context: ImporterContext,
    script: ImporterScript,
    executions: Arc<Mutex<Vec<ExecutedImport>>>,
    store: InMemoryEntityStore,
}

#[async_trait]
impl ImporterUnit for ScriptedUnit {
    fn name(&self) -> &str {
        self.context.source.importer_name()
    }

    async fn import(&self) -> ImportResult<()> {
        self.executions.lock().unwrap().push(ExecutedImport {
            source: self.context.source,
            school_scope: self.context.school_scope.clone(),
            run_id: self.context.log.run_id(),
        });
        self.context
            .log
            .log(format!("{} importing", self.name()))
            .await?;

        match &self.script {
            ImporterScript::Succeed | ImporterScript::FailToBuild(_) => Ok(()),
            ImporterScript::Fail(message) => Err(ImportError::importer(self.name(), message)),
            ImporterScript::Interrupt(reason) => Err(ImportError::interrupted(reason.clone())),
            ImporterScript::Upsert { entity, count } => {
                self.store.set(*entity, *count);
                Ok(())
            }
            ImporterScript::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(())
            }
        }
    }
}

/// Maintenance task that counts its invocations
#[derive(Debug, Clone)]
pub struct RecordingMaintenanceTask {
    name: String,
    calls: Arc<AtomicUsize>,
    failure: Option<String>,
    interrupt: Option<String>,
    order: Option<Arc<Mutex<Vec<String>>>>,
}

impl RecordingMaintenanceTask {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            failure: None,
            interrupt: None,
            order: None,
        }
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(name)
        }
    }

    /// Task whose run ends as if the process received `signal`
    pub fn interrupting(name: &str, signal: &str) -> Self {
        Self {
            interrupt: Some(signal.to_string()),
            ..Self::new(name)
        }
    }

    /// Share an order log between several tasks
    pub fn with_order_log(mut self, order: Arc<Mutex<Vec<String>>>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MaintenanceTask for RecordingMaintenanceTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> ImportResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(order) = &self.order {
            order.lock().unwrap().push(self.name.clone());
        }
        if let Some(signal) = &self.interrupt {
            return Err(ImportError::interrupted(signal.clone()));
        }
        match &self.failure {
            Some(message) => Err(ImportError::Internal(message.clone())),
            None => Ok(()),
        }
    }
}
