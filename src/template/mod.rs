//! 报告模板引擎
//!
//! 插件结果与邮件正文都通过文本模板渲染，上下文为 JSON 值。
//!
//! # 模板语法
//!
//! ```text
//! {# templates/plugins/github.text.tmpl #}
//! {% for commit in commits %}
//! {{ loop.index }}. {{ commit.title }} ({{ commit.repo | unknown }})
//! {% endfor %}
//! {% if not commits %}
//! 本周无提交
//! {% endif %}
//! ```
//!
//! # 模板查找顺序
//!
//! 插件模板的名称是 `<插件名>.<格式>`，类别为 `plugins`。
//!
//! 1. `~/.rapport/templates/<类别>/<名称>.tmpl`
//! 2. `$XDG_CONFIG_HOME/rapport/templates/<类别>/<名称>.tmpl`
//! 3. 插件模板：插件可执行文件旁的 `<插件名>.<格式>.tmpl`
//! 4. 内置模板（仅邮件正文与标题）

pub mod parser;
pub mod renderer;

use crate::utils::paths;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 模板文件扩展名
pub const TEMPLATE_EXTENSION: &str = "tmpl";

const BUILTIN_TEMPLATES: [(&str, &str, &str); 2] = [
    (
        "email",
        "body.text",
        include_str!("../../templates/email/body.text.tmpl"),
    ),
    (
        "email",
        "subject.text",
        include_str!("../../templates/email/subject.text.tmpl"),
    ),
];

/// 模板错误
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("模板 {name} 第 {line} 行语法错误: {message}")]
    Syntax {
        name: String,
        line: usize,
        message: String,
    },

    #[error("模板 {name} 第 {line} 行缺少变量: {variable}")]
    MissingVariable {
        name: String,
        variable: String,
        line: usize,
    },

    #[error("模板 {name} 第 {line} 行渲染失败: {message}")]
    Render {
        name: String,
        line: usize,
        message: String,
    },

    #[error("模板未找到: {0}")]
    NotFound(String),

    #[error("读取模板失败: {0}")]
    Io(#[from] std::io::Error),
}

/// 模板语法树节点
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Var {
        path: Vec<String>,
        default: Option<String>,
        line: usize,
    },
    For {
        var: String,
        path: Vec<String>,
        body: Vec<Node>,
        line: usize,
    },
    If {
        path: Vec<String>,
        negate: bool,
        then: Vec<Node>,
        otherwise: Vec<Node>,
        line: usize,
    },
}

/// 已解析的模板
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub nodes: Vec<Node>,
}

impl Template {
    pub fn parse(name: &str, source: &str) -> Result<Self, TemplateError> {
        parser::parse_template(name, source)
    }

    pub fn render(&self, context: &Value) -> Result<String, TemplateError> {
        renderer::render(self, context)
    }
}

/// 模板引擎
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    template_dirs: Vec<PathBuf>,
}

impl TemplateEngine {
    pub fn new(template_dirs: Vec<PathBuf>) -> Self {
        Self { template_dirs }
    }

    /// 使用默认目录
    pub fn from_default_dirs() -> crate::error::Result<Self> {
        Ok(Self::new(paths::get_template_dirs()?))
    }

    /// 查找模板源文件，返回 (显示名, 内容)；`beside` 是最后查找的附加目录
    fn find_source(
        &self,
        category: &str,
        name: &str,
        beside: Option<&Path>,
    ) -> Result<Option<(String, String)>, TemplateError> {
        let file_name = format!("{}.{}", name, TEMPLATE_EXTENSION);

        let candidates = self
            .template_dirs
            .iter()
            .map(|dir| dir.join(category).join(&file_name))
            .chain(beside.map(|dir| dir.join(&file_name)));

        for path in candidates {
            if paths::file_exists(&path) {
                tracing::debug!("使用模板 {}", path.display());
                let content = std::fs::read_to_string(&path)?;
                return Ok(Some((path.display().to_string(), content)));
            }
        }

        Ok(BUILTIN_TEMPLATES
            .iter()
            .find(|(c, n, _)| *c == category && *n == name)
            .map(|(c, n, content)| (format!("<内置>/{}/{}", c, n), content.to_string())))
    }

    /// 获取模板：`get_template("body.text", "email")`
    pub fn get_template(
        &self,
        name: &str,
        category: &str,
    ) -> Result<Option<Template>, TemplateError> {
        self.load(category, name, None)
    }

    fn load(
        &self,
        category: &str,
        name: &str,
        beside: Option<&Path>,
    ) -> Result<Option<Template>, TemplateError> {
        match self.find_source(category, name, beside)? {
            Some((display_name, content)) => Template::parse(&display_name, &content).map(Some),
            None => Ok(None),
        }
    }

    /// 插件的结果模板，例如 `plugins/github.text.tmpl`；
    /// 模板目录中没有时再找可执行文件所在目录 `executable_dir`
    pub fn plugin_template(
        &self,
        plugin_name: &str,
        format: &str,
        executable_dir: Option<&Path>,
    ) -> Result<Option<Template>, TemplateError> {
        self.load(
            "plugins",
            &format!("{}.{}", plugin_name, format),
            executable_dir,
        )
    }

    /// 邮件模板（part 为 body 或 subject），总有内置后备
    pub fn email_template(&self, part: &str) -> Result<Template, TemplateError> {
        let name = format!("{}.text", part);
        self.get_template(&name, "email")?
            .ok_or_else(|| TemplateError::NotFound(format!("email/{}", name)))
    }
}
