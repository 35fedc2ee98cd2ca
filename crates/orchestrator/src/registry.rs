//! 导入器注册表
//!
//! 启动时由 [`ImporterDefinition`] 构建一次；每次运行把请求的数据源名称解析成
//! 满足依赖偏序且确定性的执行顺序。

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use student_import_core::{
    expand_source_names, ImportError, ImportResult, ImporterContext, ImporterFactory,
    ImporterUnit, SourceKind,
};

/// 一个可注册的导入器：数据源类型、依赖声明、优先级和工厂
#[derive(Clone)]
pub struct ImporterDefinition {
    kind: SourceKind,
    depends_on: Vec<SourceKind>,
    priority: u8,
    factory: Arc<dyn ImporterFactory>,
}

impl ImporterDefinition {
    /// 使用数据源类型声明的默认依赖和优先级
    pub fn new(kind: SourceKind, factory: Arc<dyn ImporterFactory>) -> Self {
        Self {
            kind,
            depends_on: kind.dependencies().to_vec(),
            priority: kind.priority(),
            factory,
        }
    }

    pub fn depends_on(mut self, depends_on: impl IntoIterator<Item = SourceKind>) -> Self {
        self.depends_on = depends_on.into_iter().collect();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn dependencies(&self) -> &[SourceKind] {
        &self.depends_on
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }
}

impl std::fmt::Debug for ImporterDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImporterDefinition")
            .field("kind", &self.kind)
            .field("depends_on", &self.depends_on)
            .field("priority", &self.priority)
            .finish()
    }
}

/// 解析结果中的一个导入器，按执行顺序排列
#[derive(Clone)]
pub struct ResolvedImporter {
    kind: SourceKind,
    factory: Arc<dyn ImporterFactory>,
}

impl ResolvedImporter {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// 每次运行都重新构造导入器实例
    pub fn build(&self, context: ImporterContext) -> ImportResult<Box<dyn ImporterUnit>> {
        self.factory.create(context)
    }
}

impl std::fmt::Debug for ResolvedImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedImporter")
            .field("kind", &self.kind)
            .finish()
    }
}

#[derive(Default)]
pub struct ImporterRegistryBuilder {
    definitions: Vec<ImporterDefinition>,
}

impl ImporterRegistryBuilder {
    pub fn register(mut self, definition: ImporterDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// 拒绝重复注册、依赖未注册的数据源以及循环依赖
    pub fn build(self) -> ImportResult<ImporterRegistry> {
        let mut definitions = BTreeMap::new();
        for definition in self.definitions {
            let kind = definition.kind;
            if definitions.insert(kind, definition).is_some() {
                return Err(ImportError::Configuration(format!(
                    "数据源 {kind} 被重复注册"
                )));
            }
        }

        for definition in definitions.values() {
            if definition.depends_on.contains(&definition.kind) {
                return Err(ImportError::CircularDependency {
                    kinds: vec![definition.kind.to_string()],
                });
            }
            for dep in &definition.depends_on {
                if !definitions.contains_key(dep) {
                    return Err(ImportError::Configuration(format!(
                        "数据源 {} 依赖未注册的数据源 {dep}",
                        definition.kind
                    )));
                }
            }
        }

        let registry = ImporterRegistry { definitions };
        let all: Vec<SourceKind> = registry.definitions.keys().copied().collect();
        registry.order(&all)?;

        debug!("导入器注册表构建完成，共 {} 个数据源", all.len());
        Ok(registry)
    }
}

/// 数据源类型到导入器工厂的静态映射
pub struct ImporterRegistry {
    definitions: BTreeMap<SourceKind, ImporterDefinition>,
}

impl ImporterRegistry {
    pub fn builder() -> ImporterRegistryBuilder {
        ImporterRegistryBuilder::default()
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        self.definitions.keys().copied().collect()
    }

    pub fn definition(&self, kind: SourceKind) -> Option<&ImporterDefinition> {
        self.definitions.get(&kind)
    }

    /// 把请求的名称（数据源类型或组名）解析成有序的导入器列表
    ///
    /// 未知或未注册的名称在任何工作开始之前返回 `UnknownSource`。
    pub fn resolve<S: AsRef<str>>(&self, requested: &[S]) -> ImportResult<Vec<ResolvedImporter>> {
        let kinds = expand_source_names(requested)?;
        if let Some(missing) = kinds.iter().find(|k| !self.definitions.contains_key(k)) {
            return Err(ImportError::UnknownSource {
                name: missing.to_string(),
            });
        }

        let ordered = self.order(&kinds)?;
        Ok(ordered
            .into_iter()
            .filter_map(|kind| {
                self.definitions.get(&kind).map(|d| ResolvedImporter {
                    kind,
                    factory: d.factory.clone(),
                })
            })
            .collect())
    }

    /// 对请求的子集做拓扑排序
    ///
    /// 子集内的约束包括经过未请求数据源的传递依赖；就绪集合按
    /// (优先级, 名称) 取出，因此相同输入总是得到相同顺序。
    pub fn order(&self, requested: &[SourceKind]) -> ImportResult<Vec<SourceKind>> {
        let subset: BTreeSet<SourceKind> = requested.iter().copied().collect();

        let mut in_degree: BTreeMap<SourceKind, usize> =
            subset.iter().map(|&kind| (kind, 0)).collect();
        let mut dependents: BTreeMap<SourceKind, Vec<SourceKind>> = BTreeMap::new();

        for &kind in &subset {
            for dep in self.transitive_dependencies(kind) {
                if dep != kind && subset.contains(&dep) {
                    dependents.entry(dep).or_default().push(kind);
                    *in_degree.entry(kind).or_insert(0) += 1;
                }
            }
        }

        let mut ready: BTreeSet<(u8, &'static str, SourceKind)> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&kind, _)| self.ready_key(kind))
            .collect();

        let mut ordered = Vec::with_capacity(subset.len());
        while let Some(key) = ready.pop_first() {
            let kind = key.2;
            ordered.push(kind);

            for &next in dependents.get(&kind).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(self.ready_key(next));
                    }
                }
            }
        }

        if ordered.len() != subset.len() {
            let placed: HashSet<SourceKind> = ordered.iter().copied().collect();
            let kinds = subset
                .iter()
                .filter(|k| !placed.contains(k))
                .map(|k| k.to_string())
                .collect();
            return Err(ImportError::CircularDependency { kinds });
        }

        Ok(ordered)
    }

    fn ready_key(&self, kind: SourceKind) -> (u8, &'static str, SourceKind) {
        let priority = self
            .definitions
            .get(&kind)
            .map(|d| d.priority)
            .unwrap_or_else(|| kind.priority());
        (priority, kind.as_str(), kind)
    }

    /// 在完整依赖图上做广度优先遍历
    fn transitive_dependencies(&self, kind: SourceKind) -> Vec<SourceKind> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut result = Vec::new();

        for &dep in self.direct_dependencies(kind) {
            if visited.insert(dep) {
                queue.push_back(dep);
            }
        }
        while let Some(current) = queue.pop_front() {
            result.push(current);
            for &dep in self.direct_dependencies(current) {
                if visited.insert(dep) {
                    queue.push_back(dep);
                }
            }
        }

        result
    }

    fn direct_dependencies(&self, kind: SourceKind) -> &[SourceKind] {
        self.definitions
            .get(&kind)
            .map(|d| d.depends_on.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopUnit;

    #[async_trait::async_trait]
    impl ImporterUnit for NoopUnit {
        fn name(&self) -> &str {
            "noop"
        }

        async fn import(&self) -> ImportResult<()> {
            Ok(())
        }
    }

    fn noop_factory() -> Arc<dyn ImporterFactory> {
        Arc::new(|_ctx: ImporterContext| -> ImportResult<Box<dyn ImporterUnit>> {
            Ok(Box::new(NoopUnit))
        })
    }

    fn standard_registry() -> ImporterRegistry {
        SourceKind::ALL
            .iter()
            .fold(ImporterRegistry::builder(), |builder, &kind| {
                builder.register(ImporterDefinition::new(kind, noop_factory()))
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_dependency_before_dependent() {
        let registry = standard_registry();
        let order = registry
            .order(&[SourceKind::Students, SourceKind::Educators])
            .unwrap();
        assert_eq!(order, vec![SourceKind::Educators, SourceKind::Students]);
    }

    #[test]
    fn test_ready_set_ordered_by_priority_then_name() {
        let registry = standard_registry();
        let order = registry
            .order(&[
                SourceKind::StarReading,
                SourceKind::StarMath,
                SourceKind::Behavior,
                SourceKind::CoursesSections,
            ])
            .unwrap();
        assert_eq!(
            order,
            vec![
                SourceKind::CoursesSections,
                SourceKind::Behavior,
                SourceKind::StarMath,
                SourceKind::StarReading,
            ]
        );
    }

    #[test]
    fn test_transitive_constraint_through_unrequested_kind() {
        let registry = ImporterRegistry::builder()
            .register(ImporterDefinition::new(SourceKind::Educators, noop_factory()).with_priority(90))
            .register(ImporterDefinition::new(SourceKind::Students, noop_factory()))
            .register(ImporterDefinition::new(SourceKind::Attendance, noop_factory()).with_priority(1))
            .build()
            .unwrap();

        // attendance -> students -> educators；students 未被请求
        let order = registry
            .order(&[SourceKind::Attendance, SourceKind::Educators])
            .unwrap();
        assert_eq!(order, vec![SourceKind::Educators, SourceKind::Attendance]);
    }

    #[test]
    fn test_resolve_expands_groups_and_dedupes() {
        let registry = standard_registry();
        let resolved = registry.resolve(&["star", "star_math", "students"]).unwrap();
        let kinds: Vec<SourceKind> = resolved.iter().map(|r| r.kind()).collect();
        assert_eq!(
            kinds,
            vec![SourceKind::Students, SourceKind::StarMath, SourceKind::StarReading]
        );
    }

    #[test]
    fn test_resolve_unknown_name() {
        let registry = standard_registry();
        let err = registry.resolve(&["students", "powerschool"]).unwrap_err();
        assert!(matches!(err, ImportError::UnknownSource { ref name } if name == "powerschool"));
    }

    #[test]
    fn test_resolve_unregistered_kind() {
        let registry = ImporterRegistry::builder()
            .register(ImporterDefinition::new(SourceKind::Educators, noop_factory()))
            .build()
            .unwrap();
        let err = registry.resolve(&["behavior"]).unwrap_err();
        assert!(matches!(err, ImportError::UnknownSource { .. }));
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let result = ImporterRegistry::builder()
            .register(ImporterDefinition::new(SourceKind::Educators, noop_factory()))
            .register(ImporterDefinition::new(SourceKind::Educators, noop_factory()))
            .build();
        assert!(matches!(result, Err(ImportError::Configuration(_))));
    }

    #[test]
    fn test_build_rejects_unregistered_dependency() {
        let result = ImporterRegistry::builder()
            .register(ImporterDefinition::new(SourceKind::Students, noop_factory()))
            .build();
        assert!(matches!(result, Err(ImportError::Configuration(_))));
    }

    #[test]
    fn test_build_rejects_cycle() {
        let result = ImporterRegistry::builder()
            .register(
                ImporterDefinition::new(SourceKind::Educators, noop_factory())
                    .depends_on([SourceKind::Students]),
            )
            .register(ImporterDefinition::new(SourceKind::Students, noop_factory()))
            .build();

        match result {
            Err(ImportError::CircularDependency { kinds }) => {
                assert_eq!(kinds, vec!["educators".to_string(), "students".to_string()]);
            }
            other => panic!("expected CircularDependency, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_build_rejects_self_dependency() {
        let result = ImporterRegistry::builder()
            .register(
                ImporterDefinition::new(SourceKind::Behavior, noop_factory())
                    .depends_on([SourceKind::Behavior]),
            )
            .build();

        match result {
            Err(ImportError::CircularDependency { kinds }) => {
                assert_eq!(kinds, vec!["behavior".to_string()]);
            }
            other => panic!("expected CircularDependency, got {:?}", other.map(|_| ())),
        }
    }
}
