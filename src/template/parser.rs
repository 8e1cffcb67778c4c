//! 模板解析器
//!
//! 解析模板语法：
//! - `{{ path }}` / `{{ path | 默认值 }}`
//! - `{% for item in path %}...{% endfor %}`
//! - `{% if path %}...{% else %}...{% endif %}`，支持 `if not path`
//! - `{# 注释 #}`
//!
//! 块标签 `{% %}` 后紧跟的一个换行会被吞掉。

use crate::template::{Node, Template, TemplateError};
use regex::Regex;
use std::sync::OnceLock;

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\{\{(.*?)\}\}|\{%(.*?)%\}|\{#(.*?)#\}").expect("静态正则表达式有效")
    })
}

fn path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)*$").expect("静态正则表达式有效")
    })
}

fn for_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^for\s+([A-Za-z_][A-Za-z0-9_]*)\s+in\s+(\S+)$").expect("静态正则表达式有效")
    })
}

fn if_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^if\s+(not\s+)?(\S+)$").expect("静态正则表达式有效"))
}

/// 尚未闭合的块
enum Frame {
    Root,
    For {
        var: String,
        path: Vec<String>,
        line: usize,
    },
    If {
        path: Vec<String>,
        negate: bool,
        line: usize,
        then: Option<Vec<Node>>,
    },
}

struct Parser<'a> {
    name: &'a str,
    source: &'a str,
    /// 每层块一个帧，与 bodies 一一对应
    frames: Vec<Frame>,
    bodies: Vec<Vec<Node>>,
}

impl<'a> Parser<'a> {
    fn syntax(&self, line: usize, message: impl Into<String>) -> TemplateError {
        TemplateError::Syntax {
            name: self.name.to_string(),
            line,
            message: message.into(),
        }
    }

    fn line_at(&self, offset: usize) -> usize {
        self.source[..offset].matches('\n').count() + 1
    }

    fn push(&mut self, node: Node) {
        if let Some(body) = self.bodies.last_mut() {
            body.push(node);
        }
    }

    fn push_text(&mut self, text: &str, offset: usize) -> Result<(), TemplateError> {
        if text.is_empty() {
            return Ok(());
        }
        for opener in ["{{", "{%", "{#"] {
            if let Some(pos) = text.find(opener) {
                return Err(self.syntax(self.line_at(offset + pos), format!("未闭合的标签 '{}'", opener)));
            }
        }
        self.push(Node::Text(text.to_string()));
        Ok(())
    }

    fn parse_path(&self, expr: &str, line: usize) -> Result<Vec<String>, TemplateError> {
        if expr.is_empty() {
            return Err(self.syntax(line, "空的变量名"));
        }
        if !path_pattern().is_match(expr) {
            return Err(self.syntax(line, format!("无效的变量路径 '{}'", expr)));
        }
        Ok(expr.split('.').map(str::to_string).collect())
    }

    fn variable(&mut self, expr: &str, line: usize) -> Result<(), TemplateError> {
        let (path_expr, default) = match expr.find('|') {
            Some(pos) => (expr[..pos].trim(), Some(unquote(expr[pos + 1..].trim()))),
            None => (expr.trim(), None),
        };
        let path = self.parse_path(path_expr, line)?;
        self.push(Node::Var {
            path,
            default,
            line,
        });
        Ok(())
    }

    fn block(&mut self, expr: &str, line: usize) -> Result<(), TemplateError> {
        let expr = expr.trim();
        let keyword = expr.split_whitespace().next().unwrap_or("");

        match keyword {
            "for" => {
                let caps = for_pattern()
                    .captures(expr)
                    .ok_or_else(|| self.syntax(line, format!("无效的 for 语句 '{}'", expr)))?;
                let path = self.parse_path(&caps[2], line)?;
                self.frames.push(Frame::For {
                    var: caps[1].to_string(),
                    path,
                    line,
                });
                self.bodies.push(Vec::new());
            }
            "if" => {
                let caps = if_pattern()
                    .captures(expr)
                    .ok_or_else(|| self.syntax(line, format!("无效的 if 语句 '{}'", expr)))?;
                let path = self.parse_path(&caps[2], line)?;
                self.frames.push(Frame::If {
                    path,
                    negate: caps.get(1).is_some(),
                    line,
                    then: None,
                });
                self.bodies.push(Vec::new());
            }
            "else" if expr == "else" => {
                let current = self.bodies.pop().unwrap_or_default();
                match self.frames.last_mut() {
                    Some(Frame::If { then, .. }) if then.is_none() => {
                        *then = Some(current);
                        self.bodies.push(Vec::new());
                    }
                    _ => return Err(self.syntax(line, "else 没有对应的 if")),
                }
            }
            "endfor" if expr == "endfor" => {
                let body = self.bodies.pop().unwrap_or_default();
                match self.frames.pop() {
                    Some(Frame::For { var, path, line }) => {
                        self.push(Node::For {
                            var,
                            path,
                            body,
                            line,
                        });
                    }
                    _ => return Err(self.syntax(line, "endfor 没有对应的 for")),
                }
            }
            "endif" if expr == "endif" => {
                let body = self.bodies.pop().unwrap_or_default();
                match self.frames.pop() {
                    Some(Frame::If {
                        path,
                        negate,
                        line,
                        then,
                    }) => {
                        let (then, otherwise) = match then {
                            Some(then) => (then, body),
                            None => (body, Vec::new()),
                        };
                        self.push(Node::If {
                            path,
                            negate,
                            then,
                            otherwise,
                            line,
                        });
                    }
                    _ => return Err(self.syntax(line, "endif 没有对应的 if")),
                }
            }
            _ => return Err(self.syntax(line, format!("未知的块标签 '{}'", expr))),
        }
        Ok(())
    }
}

/// 去掉默认值两侧的引号
fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

/// 解析模板内容
pub fn parse_template(name: &str, source: &str) -> Result<Template, TemplateError> {
    let mut parser = Parser {
        name,
        source,
        frames: vec![Frame::Root],
        bodies: vec![Vec::new()],
    };

    let mut cursor = 0;
    for caps in tag_pattern().captures_iter(source) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let line = parser.line_at(whole.0);
        parser.push_text(&source[cursor..whole.0], cursor)?;
        cursor = whole.1;

        if let Some(expr) = caps.get(1) {
            parser.variable(expr.as_str().trim(), line)?;
        } else if let Some(expr) = caps.get(2) {
            parser.block(expr.as_str(), line)?;
            // 吞掉块标签后的一个换行
            if source[cursor..].starts_with("\r\n") {
                cursor += 2;
            } else if source[cursor..].starts_with('\n') {
                cursor += 1;
            }
        }
        // 注释不产生输出
    }
    parser.push_text(&source[cursor..], cursor)?;

    if parser.frames.len() > 1 {
        let (kind, line) = match parser.frames.last() {
            Some(Frame::For { line, .. }) => ("for", *line),
            Some(Frame::If { line, .. }) => ("if", *line),
            _ => ("?", 0),
        };
        return Err(parser.syntax(line, format!("{} 块没有闭合", kind)));
    }

    Ok(Template {
        name: name.to_string(),
        nodes: parser.bodies.pop().unwrap_or_default(),
    })
}
