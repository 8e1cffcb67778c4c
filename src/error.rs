//! 错误处理模块 (修复原则：明确抛出异常)

use crate::plugin::PluginError;
use crate::template::TemplateError;
use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RapportError {
    #[error("文件IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置文件 {path} 解析失败: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("配置无效: {0}")]
    InvalidConfig(String),

    #[error("配置文件已存在: {0}")]
    ConfigExists(PathBuf),

    #[error("无法确定目录: {0}")]
    DirMissing(String),

    #[error("文件不存在: {0}")]
    FileNotFound(PathBuf),

    #[error("尚未创建任何报告")]
    NoReports,

    #[error("报告未找到: {0}")]
    ReportNotFound(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("未知的时间范围: {0} (可选: current_week, last_week, current_month, recent_days, today)")]
    UnknownTimeframe(String),

    #[error("插件 {alias} 执行失败")]
    PluginFailed {
        alias: String,
        #[source]
        source: PluginError,
    },

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("JSON序列化错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("通配符无效: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("命令未找到: {0}")]
    CommandNotFound(String),

    #[error("命令执行失败: {0}")]
    CommandExecutionFailed(String),
}

/// 详细的错误报告函数 (透明原则)
impl RapportError {
    /// 报告错误，支持详细/安静模式
    /// verbose = true: 详细错误链
    /// verbose = false: 关键信息，安静模式
    pub fn report(&self, verbose: bool) {
        if verbose {
            eprintln!("❌ 错误: {}", self);

            if let Some(source) = self.source() {
                eprintln!("  └─ 原因: {}", source);
                let mut current = source.source();
                while let Some(next) = current {
                    eprintln!("     └─ {}", next);
                    current = next.source();
                }
            }
        } else {
            match self {
                RapportError::PluginFailed { alias, source } => {
                    eprintln!("插件 {} 失败: {}", alias, source)
                }
                RapportError::ReportNotFound(name) => eprintln!("未找到报告: {}", name),
                RapportError::FileNotFound(path) => eprintln!("文件不存在: {}", path.display()),
                RapportError::Io(err) => eprintln!("文件错误: {}", err),
                _ => eprintln!("错误: {}", self),
            }
        }
    }
}

/// 简化 Result 类型别名
pub type Result<T> = std::result::Result<T, RapportError>;
