use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{expand_source_names, SourceKind, DEFAULT_SOURCES};

/// 外部导入程序的启动参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportersConfig {
    /// 未显式指定数据源时请求的名称
    pub default_sources: Vec<String>,
    /// 未单独配置的数据源使用 `<command_dir>/import-<kind>`
    pub command_dir: String,
    /// 按数据源名称覆盖的命令
    pub commands: BTreeMap<String, CommandSpec>,
}

impl Default for ImportersConfig {
    fn default() -> Self {
        Self {
            default_sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            command_dir: "bin".to_string(),
            commands: BTreeMap::new(),
        }
    }
}

impl ImportersConfig {
    pub fn command_for(&self, kind: SourceKind) -> CommandSpec {
        self.commands
            .get(kind.as_str())
            .cloned()
            .unwrap_or_else(|| CommandSpec {
                program: format!("{}/import-{}", self.command_dir, kind.as_str()),
                ..CommandSpec::default()
            })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        expand_source_names(&self.default_sources)
            .map_err(|e| anyhow::anyhow!("默认数据源配置无效: {e}"))?;

        for (name, spec) in &self.commands {
            name.parse::<SourceKind>()
                .map_err(|e| anyhow::anyhow!("导入命令配置无效: {e}"))?;
            if spec.program.trim().is_empty() {
                return Err(anyhow::anyhow!("数据源 {name} 的导入命令不能为空"));
            }
        }
        Ok(())
    }
}
