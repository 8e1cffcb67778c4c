//! 报告存储 (模块原则：清晰分离的存储逻辑)
//!
//! 每份报告是报告根目录下的一个子目录，目录名为时间范围结束时间
//! (ISO 8601)，因此按名称排序即按时间排序。

use crate::error::{RapportError, Result};
use crate::types::{EmailPart, ReportFormat, report_file_name};
use crate::utils::paths;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 一份报告及其所有文件内容
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub name: String,
    pub path: PathBuf,
    pub files: BTreeMap<String, String>,
}

/// 报告存储
#[derive(Debug, Clone)]
pub struct ReportStore {
    root: PathBuf,
}

/// 报告名与删除模式只能是单层目录名
fn validate_component(value: &str) -> Result<()> {
    if value.is_empty()
        || value.contains('/')
        || value.contains('\\')
        || value.contains("..")
    {
        return Err(RapportError::InvalidArgument(format!(
            "报告名不能为空或包含路径分隔符: {}",
            value
        )));
    }
    Ok(())
}

impl ReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 默认报告目录：$XDG_DATA_HOME/rapport/reports
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(paths::get_reports_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn report_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// 已创建的报告（按名称排序）
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(vec![]);
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// 最新的报告名
    pub fn latest(&self) -> Result<String> {
        self.list()?.pop().ok_or(RapportError::NoReports)
    }

    /// 解析报告名，None 表示最新一份
    pub fn resolve(&self, name: Option<&str>) -> Result<String> {
        match name {
            None => self.latest(),
            Some(name) => {
                validate_component(name)?;
                if self.report_path(name).is_dir() {
                    Ok(name.to_string())
                } else {
                    Err(RapportError::ReportNotFound(name.to_string()))
                }
            }
        }
    }

    /// 读取报告的全部文件
    pub fn get(&self, name: Option<&str>) -> Result<Report> {
        let name = self.resolve(name)?;
        let path = self.report_path(&name);

        let mut files = BTreeMap::new();
        for entry in std::fs::read_dir(&path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            let file_name = file_path.file_name().unwrap_or_default().to_string_lossy().to_string();
            files.insert(file_name, paths::read_file(&file_path)?);
        }

        Ok(Report { name, path, files })
    }

    /// 创建报告目录（已存在时复用）
    pub fn create(&self, name: &str) -> Result<PathBuf> {
        validate_component(name)?;
        let path = self.report_path(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// 写入报告中的一个文件
    pub fn write_file(&self, name: &str, file_name: &str, content: &str) -> Result<PathBuf> {
        validate_component(file_name)?;
        let path = self.create(name)?.join(file_name);
        paths::write_file_safe(&path, content)?;
        Ok(path)
    }

    /// 报告中可编辑文件的路径（文件可能尚不存在，例如 index.html）
    pub fn file_path(
        &self,
        name: Option<&str>,
        format: ReportFormat,
        part: EmailPart,
    ) -> Result<PathBuf> {
        let name = self.resolve(name)?;
        Ok(self.report_path(&name).join(report_file_name(format, part)))
    }

    /// 删除与通配符匹配的报告，返回被删除的报告名
    ///
    /// 模式只匹配报告名，不含根目录路径；`*` 不匹配以 `.` 开头的目录。
    pub fn delete(&self, pattern: &str) -> Result<Vec<String>> {
        validate_component(pattern)?;
        let pattern = glob::Pattern::new(pattern)?;
        let options = glob::MatchOptions {
            require_literal_leading_dot: true,
            ..Default::default()
        };

        let mut removed = Vec::new();
        for name in self.list()? {
            if !pattern.matches_with(&name, options) {
                continue;
            }
            std::fs::remove_dir_all(self.report_path(&name))?;
            tracing::info!("已删除报告 {}", name);
            removed.push(name);
        }
        Ok(removed)
    }
}
