//! 配置管理
//!
//! 配置文件为 `~/.rapport/rapport.toml`：
//!
//! ```toml
//! [rapport]
//! verbosity = 1
//! timeframe = "current_week"
//! recent_days = 14
//! max_workers = 4
//!
//! [user]
//! login = "jdoe"
//!
//! [email]
//! to = ["team@example.com"]
//!
//! [[plugins]]
//! name = "github"
//! alias = "github-work"
//! login = "jdoe"
//! password = "token"
//! ```

use crate::error::{RapportError, Result};
use crate::timeframe::{Timeframe, TimeframeKind};
use crate::utils::paths;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// 默认插件超时（秒）
pub const DEFAULT_PLUGIN_TIMEOUT: u64 = 60;

/// 全局设置 `[rapport]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// 输出详细程度：0 安静，1 警告，2 信息，3 调试
    pub verbosity: u8,
    /// 默认时间范围名称
    pub timeframe: String,
    /// recent_days 的天数
    pub recent_days: u32,
    /// 并行收集的最大线程数
    pub max_workers: usize,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            verbosity: 1,
            timeframe: "current_week".to_string(),
            recent_days: crate::timeframe::DEFAULT_RECENT_DAYS,
            max_workers: 4,
        }
    }
}

/// 用户信息 `[user]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub login: Option<String>,
}

/// 邮件设置 `[email]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub to: Vec<String>,
    pub cc: Vec<String>,
}

/// 插件实例 `[[plugins]]`
///
/// 同一个插件可以配置多次（例如两个 GitHub 账号），以 alias 区分。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInstanceConfig {
    /// 插件可执行文件名
    pub name: String,
    /// 实例别名，缺省与 name 相同
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 超时（秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// 插件特定配置
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,
    /// 传给插件进程的环境变量
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl PluginInstanceConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            alias: None,
            login: None,
            password: None,
            url: None,
            timeout: None,
            settings: BTreeMap::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_PLUGIN_TIMEOUT)
    }
}

/// 完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RapportConfig {
    pub rapport: GeneralSettings,
    pub user: UserSettings,
    pub email: EmailSettings,
    pub plugins: Vec<PluginInstanceConfig>,
}

impl RapportConfig {
    /// 从文件加载，文件不存在时返回默认配置
    pub fn load(path: &Path) -> Result<Self> {
        if !paths::file_exists(path) {
            tracing::debug!("配置文件不存在，使用默认配置: {}", path.display());
            return Ok(Self::default());
        }
        let content = paths::read_file(path)?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RapportError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// 报告署名：配置的 login，或当前系统用户
    pub fn login(&self) -> String {
        self.user
            .login
            .clone()
            .filter(|l| !l.trim().is_empty())
            .or_else(|| std::env::var("USER").ok().filter(|u| !u.is_empty()))
            .or_else(|| std::env::var("USERNAME").ok().filter(|u| !u.is_empty()))
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// 配置的默认时间范围
    pub fn timeframe_kind(&self) -> Result<TimeframeKind> {
        let kind = TimeframeKind::parse(&self.rapport.timeframe)?;
        // `recent_days:N` 的显式天数优先于 recent_days 设置
        if self.rapport.timeframe.contains(':') {
            Ok(kind)
        } else {
            Ok(kind.with_days(self.rapport.recent_days))
        }
    }

    /// 按别名查找插件实例
    pub fn plugin(&self, alias: &str) -> Option<&PluginInstanceConfig> {
        self.plugins.iter().find(|p| p.alias() == alias)
    }

    /// 验证配置，返回发现的全部问题
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut issues = Vec::new();

        if let Err(e) = TimeframeKind::parse(&self.rapport.timeframe) {
            issues.push(e.to_string());
        }
        if self.rapport.max_workers == 0 {
            issues.push("rapport.max_workers 必须至少为 1".to_string());
        }
        if self.rapport.recent_days == 0 {
            issues.push("rapport.recent_days 必须至少为 1".to_string());
        } else if Timeframe::now(TimeframeKind::RecentDays(self.rapport.recent_days)).is_err() {
            issues.push(format!(
                "rapport.recent_days 过大: {}",
                self.rapport.recent_days
            ));
        }
        if let Ok(kind @ TimeframeKind::RecentDays(days)) = self.timeframe_kind() {
            if days != self.rapport.recent_days && Timeframe::now(kind).is_err() {
                issues.push(format!("rapport.timeframe 超出可表示的日期: {}", kind));
            }
        }

        let mut aliases = HashSet::new();
        for (index, plugin) in self.plugins.iter().enumerate() {
            if let Err(msg) = validate_identifier(&plugin.name) {
                issues.push(format!("plugins[{}].name: {}", index, msg));
            }
            if let Some(alias) = &plugin.alias {
                if let Err(msg) = validate_identifier(alias) {
                    issues.push(format!("plugins[{}].alias: {}", index, msg));
                }
            }
            if !aliases.insert(plugin.alias().to_string()) {
                issues.push(format!("插件别名重复: {}", plugin.alias()));
            }
            if plugin.timeout == Some(0) {
                issues.push(format!("plugins[{}].timeout 必须大于 0", index));
            }
        }

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }

    /// 验证失败时合并为单个错误
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate()
            .map_err(|issues| RapportError::InvalidConfig(issues.join("; ")))
    }
}

/// 插件名与别名规则：非空，仅限字母、数字、下划线、连字符
pub fn validate_identifier(id: &str) -> std::result::Result<(), String> {
    if id.is_empty() {
        return Err("不能为空".to_string());
    }
    if id.len() > 64 {
        return Err("长度不能超过64字符".to_string());
    }
    if let Some(c) = id
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-')
    {
        return Err(format!(
            "包含非法字符 '{}', 只允许字母、数字、下划线和连字符",
            c
        ));
    }
    Ok(())
}

/// 默认配置文件内容
pub const DEFAULT_CONFIG: &str = r#"# rapport 配置文件

[rapport]
# 0 安静，1 警告，2 信息，3 调试
verbosity = 1
# current_week, last_week, current_month, recent_days, today
timeframe = "current_week"
recent_days = 14
max_workers = 4

[user]
# login = "jdoe"

[email]
to = []
cc = []

# 每个插件实例一个 [[plugins]] 段，name 为插件目录中的可执行文件名
# [[plugins]]
# name = "github"
# alias = "github"
# login = "jdoe"
# password = "token"
# url = "https://api.github.com"
# timeout = 60
"#;

/// 写入默认配置文件
pub fn init_config(path: &Path, force: bool) -> Result<PathBuf> {
    if path.exists() && !force {
        return Err(RapportError::ConfigExists(path.to_path_buf()));
    }
    paths::write_file_safe(path, DEFAULT_CONFIG)?;
    tracing::info!("已写入配置文件: {}", path.display());
    Ok(path.to_path_buf())
}
