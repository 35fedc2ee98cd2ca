use serde::{Deserialize, Serialize};

/// 未指定数据源时的默认请求
pub const DEFAULT_SOURCES: [&str; 2] = ["x2", "star"];

/// 学校范围：显式的学校编号列表，或区配置中的全部学校
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "schools", rename_all = "snake_case")]
pub enum SchoolScope {
    AllConfigured,
    Explicit(Vec<String>),
}

impl SchoolScope {
    pub fn explicit<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SchoolScope::Explicit(ids.into_iter().map(Into::into).collect())
    }
}

/// 控制是否跳过旧数据的标志，不同导入器对其响应不同
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyFlags {
    pub only_recent_attendance: bool,
    pub skip_old_records: bool,
}

/// 一次导入运行的不可变配置快照
///
/// 创建后不再修改；重试通过 [`RunOptions::next_attempt`] 生成新的快照。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    school_scope: SchoolScope,
    sources: Vec<String>,
    recency: RecencyFlags,
    skip_maintenance: bool,
    attempt: u32,
}

impl RunOptions {
    pub fn builder() -> RunOptionsBuilder {
        RunOptionsBuilder::default()
    }

    pub fn school_scope(&self) -> &SchoolScope {
        &self.school_scope
    }

    /// 请求的数据源名称（数据源类型或组名），未解析
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn recency(&self) -> RecencyFlags {
        self.recency
    }

    pub fn skip_maintenance(&self) -> bool {
        self.skip_maintenance
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// 除attempt加一外完全相同的配置
    pub fn next_attempt(&self) -> RunOptions {
        RunOptions {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions::builder().build()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptionsBuilder {
    schools: Option<Vec<String>>,
    sources: Option<Vec<String>>,
    recency: RecencyFlags,
    skip_maintenance: bool,
    attempt: u32,
}

impl RunOptionsBuilder {
    pub fn schools<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schools = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn only_recent_attendance(mut self, value: bool) -> Self {
        self.recency.only_recent_attendance = value;
        self
    }

    pub fn skip_old_records(mut self, value: bool) -> Self {
        self.recency.skip_old_records = value;
        self
    }

    pub fn skip_maintenance(mut self, value: bool) -> Self {
        self.skip_maintenance = value;
        self
    }

    pub fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn build(self) -> RunOptions {
        // 空的学校列表等同于未指定
        let school_scope = match self.schools {
            Some(ids) if !ids.is_empty() => SchoolScope::Explicit(ids),
            _ => SchoolScope::AllConfigured,
        };
        let sources = self
            .sources
            .unwrap_or_else(|| DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect());

        RunOptions {
            school_scope,
            sources,
            recency: self.recency,
            skip_maintenance: self.skip_maintenance,
            attempt: self.attempt,
        }
    }
}
