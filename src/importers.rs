use std::sync::Arc;

use student_import_core::{config::ImportersConfig, ImportResult, SourceKind};
use student_import_infrastructure::CommandImporterFactory;
use student_import_orchestrator::{ImporterDefinition, ImporterRegistry};

/// 为每个数据源注册一个外部命令导入器
///
/// 依赖和优先级取自 [`SourceKind`] 的声明，命令取自配置。
pub fn standard_registry(config: &ImportersConfig) -> ImportResult<ImporterRegistry> {
    SourceKind::ALL
        .iter()
        .fold(ImporterRegistry::builder(), |builder, &kind| {
            let factory = CommandImporterFactory::new(config.command_for(kind));
            builder.register(ImporterDefinition::new(kind, Arc::new(factory)))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_every_source() {
        let registry = standard_registry(&ImportersConfig::default()).unwrap();
        assert_eq!(registry.kinds().len(), SourceKind::ALL.len());

        let order = registry.order(&SourceKind::ALL).unwrap();
        let position = |kind: SourceKind| order.iter().position(|k| *k == kind).unwrap();
        assert!(position(SourceKind::Educators) < position(SourceKind::Students));
        assert!(position(SourceKind::Students) < position(SourceKind::StarMath));
    }
}
