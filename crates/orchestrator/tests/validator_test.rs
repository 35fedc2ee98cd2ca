use std::sync::Arc;

use student_import_core::{ImportError, RunLog, RunOptions, SchoolRecord};
use student_import_orchestrator::ConfigValidator;
use student_import_testing_utils::{
    demo_district, DistrictConfigBuilder, InMemoryImportRunRepository, MockSchoolRepository,
    StaticDistrictProvider,
};

async fn run_log(runs: &InMemoryImportRunRepository) -> RunLog {
    use student_import_core::{ImportRunRepository, NewImportRun};
    let run = runs
        .create(&NewImportRun::new(RunOptions::default()))
        .await
        .unwrap();
    RunLog::new(run.id, Arc::new(runs.clone()))
}

fn validator(provider: StaticDistrictProvider, schools: &MockSchoolRepository) -> ConfigValidator {
    ConfigValidator::new("demo", Arc::new(provider), Arc::new(schools.clone()))
}

#[tokio::test]
async fn test_empty_school_table_is_seeded_once() {
    let runs = InMemoryImportRunRepository::new();
    let log = run_log(&runs).await;
    let schools = MockSchoolRepository::new();
    let validator = validator(StaticDistrictProvider::with_district(demo_district()), &schools);

    let first = validator.validate(&RunOptions::default(), &log).await.unwrap();
    assert_eq!(first.seeded, 3);
    assert_eq!(first.school_ids, vec!["SHS", "HEA", "BRN"]);

    let second = validator.validate(&RunOptions::default(), &log).await.unwrap();
    assert_eq!(second.seeded, 0);
    assert_eq!(schools.seed_calls(), 1);
    assert_eq!(schools.school_ids().len(), 3);
}

#[tokio::test]
async fn test_explicit_scope_is_kept() {
    let runs = InMemoryImportRunRepository::new();
    let log = run_log(&runs).await;
    let schools = MockSchoolRepository::new();
    let validator = validator(StaticDistrictProvider::with_district(demo_district()), &schools);

    let options = RunOptions::builder().schools(["BRN", "SHS"]).build();
    let scope = validator.validate(&options, &log).await.unwrap();
    assert_eq!(scope.school_ids, vec!["BRN", "SHS"]);
    assert_eq!(scope.district_key, "demo");
}

#[tokio::test]
async fn test_school_missing_from_storage_is_rejected() {
    let runs = InMemoryImportRunRepository::new();
    let log = run_log(&runs).await;
    // 表非空，不会播种，HEA 只存在于区配置中
    let schools = MockSchoolRepository::with_schools(vec![SchoolRecord::new("SHS", "Somerville High")]);
    let validator = validator(StaticDistrictProvider::with_district(demo_district()), &schools);

    let options = RunOptions::builder().schools(["SHS", "HEA"]).build();
    let err = validator.validate(&options, &log).await.unwrap_err();
    assert!(matches!(err, ImportError::SchoolNotFound { ref local_id } if local_id == "HEA"));
}

#[tokio::test]
async fn test_unknown_school_is_rejected() {
    let runs = InMemoryImportRunRepository::new();
    let log = run_log(&runs).await;
    let schools = MockSchoolRepository::new();
    let validator = validator(StaticDistrictProvider::with_district(demo_district()), &schools);

    let options = RunOptions::builder().schools(["ZZZ"]).build();
    let err = validator.validate(&options, &log).await.unwrap_err();
    assert!(matches!(err, ImportError::SchoolNotFound { .. }));
}

#[tokio::test]
async fn test_malformed_district_config_is_rejected() {
    let runs = InMemoryImportRunRepository::new();
    let log = run_log(&runs).await;
    let schools = MockSchoolRepository::new();
    let empty = DistrictConfigBuilder::new("demo").build();
    let validator = validator(StaticDistrictProvider::with_district(empty), &schools);

    let err = validator
        .validate(&RunOptions::default(), &log)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Configuration(_)));
    assert_eq!(schools.seed_calls(), 0);
}

#[tokio::test]
async fn test_missing_district_is_rejected() {
    let runs = InMemoryImportRunRepository::new();
    let log = run_log(&runs).await;
    let schools = MockSchoolRepository::new();
    let validator = validator(StaticDistrictProvider::new(), &schools);

    let err = validator
        .validate(&RunOptions::default(), &log)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Configuration(_)));
}
