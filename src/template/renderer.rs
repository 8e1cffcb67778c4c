//! 模板渲染器

use crate::template::{Node, Template, TemplateError};
use serde_json::{Map, Value, json};

/// 渲染作用域：循环变量在上下文之前查找
struct Scope<'a> {
    template: &'a Template,
    context: &'a Value,
    locals: Vec<(String, Value)>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let root = self
            .locals
            .iter()
            .rev()
            .find(|(name, _)| name == first)
            .map(|(_, value)| value)
            .or_else(|| self.context.get(first))?;

        rest.iter().try_fold(root, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    fn render_nodes(&mut self, nodes: &[Node], out: &mut String) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Var {
                    path,
                    default,
                    line,
                } => match (self.lookup(path), default) {
                    (Some(value), _) if !value.is_null() => out.push_str(&display(value)),
                    (_, Some(default)) => out.push_str(default),
                    (Some(_), None) => {}
                    (None, None) => {
                        return Err(TemplateError::MissingVariable {
                            name: self.template.name.clone(),
                            variable: path.join("."),
                            line: *line,
                        });
                    }
                },
                Node::If {
                    path,
                    negate,
                    then,
                    otherwise,
                    ..
                } => {
                    let truthy = self.lookup(path).is_some_and(is_truthy);
                    let branch = if truthy != *negate { then } else { otherwise };
                    self.render_nodes(branch, out)?;
                }
                Node::For {
                    var,
                    path,
                    body,
                    line,
                } => {
                    let items = self.iteration_items(path, *line)?;
                    let count = items.len();
                    for (i, item) in items.into_iter().enumerate() {
                        self.locals.push((
                            "loop".to_string(),
                            json!({ "index": i + 1, "first": i == 0, "last": i + 1 == count }),
                        ));
                        self.locals.push((var.clone(), item));
                        let result = self.render_nodes(body, out);
                        self.locals.truncate(self.locals.len() - 2);
                        result?;
                    }
                }
            }
        }
        Ok(())
    }

    /// 可迭代的值：数组逐项；对象转为 {key, value}；缺失或 null 视为空
    fn iteration_items(&self, path: &[String], line: usize) -> Result<Vec<Value>, TemplateError> {
        match self.lookup(path) {
            None | Some(Value::Null) => Ok(vec![]),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(Value::Object(map)) => Ok(map
                .iter()
                .map(|(k, v)| json!({ "key": k, "value": v }))
                .collect()),
            Some(other) => Err(TemplateError::Render {
                name: self.template.name.clone(),
                line,
                message: format!("{} 不可迭代: {}", path.join("."), display(other)),
            }),
        }
    }
}

/// 值的文本形式：字符串原样输出，其余为 JSON
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// null、false、0、空字符串、空数组、空对象为假
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// 渲染模板
pub fn render(template: &Template, context: &Value) -> Result<String, TemplateError> {
    let empty = Value::Object(Map::new());
    let context = if context.is_object() { context } else { &empty };
    let mut scope = Scope {
        template,
        context,
        locals: Vec::new(),
    };
    let mut out = String::new();
    scope.render_nodes(&template.nodes, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parser::parse_template;

    fn render_str(source: &str, context: Value) -> Result<String, TemplateError> {
        let template = parse_template("test", source).unwrap();
        render(&template, &context)
    }

    #[test]
    fn test_render_with_all_vars() {
        let out = render_str(
            "{{ login }} @ {{ date }}",
            json!({"login": "jdoe", "date": "2026-10-16T17:30:00"}),
        )
        .unwrap();
        assert_eq!(out, "jdoe @ 2026-10-16T17:30:00");
    }

    #[test]
    fn test_render_with_defaults() {
        let out = render_str(
            "{{ host | localhost }}:{{ port | 5432 }}",
            json!({"host": "db", "port": null}),
        )
        .unwrap();
        assert_eq!(out, "db:5432");
    }

    #[test]
    fn test_render_missing_required() {
        let err = render_str("a\n{{ password }}", json!({})).unwrap_err();
        match err {
            TemplateError::MissingVariable { variable, line, .. } => {
                assert_eq!(variable, "password");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_render_scalars_and_nested_paths() {
        let out = render_str(
            "{{ stats.count }} {{ stats.ok }} {{ items.1 }} {{ stats.tags }} [{{ stats.none }}]",
            json!({"stats": {"count": 3, "ok": true, "tags": ["a"], "none": null}, "items": ["x", "y"]}),
        )
        .unwrap();
        assert_eq!(out, "3 true y [\"a\"] []");
    }

    #[test]
    fn test_render_loop_with_loop_vars() {
        let out = render_str(
            "{% for c in commits %}{{ loop.index }}. {{ c.title }}{% if not loop.last %}, {% endif %}{% endfor %}",
            json!({"commits": [{"title": "fix"}, {"title": "feat"}]}),
        )
        .unwrap();
        assert_eq!(out, "1. fix, 2. feat");
    }

    #[test]
    fn test_render_object_iteration_and_missing_list() {
        let out = render_str(
            "{% for kv in counts %}{{ kv.key }}={{ kv.value }};{% endfor %}{% for x in nothing %}x{% endfor %}",
            json!({"counts": {"closed": 2, "open": 1}}),
        )
        .unwrap();
        assert_eq!(out, "closed=2;open=1;");
    }

    #[test]
    fn test_render_if_else() {
        let source = "{% if items %}有{% else %}无{% endif %}";
        assert_eq!(render_str(source, json!({"items": [1]})).unwrap(), "有");
        assert_eq!(render_str(source, json!({"items": []})).unwrap(), "无");
        assert_eq!(render_str(source, json!({})).unwrap(), "无");
    }

    #[test]
    fn test_loop_variable_shadows_context() {
        let out = render_str(
            "{% for name in names %}{{ name }}{% endfor %}-{{ name }}",
            json!({"name": "outer", "names": ["a", "b"]}),
        )
        .unwrap();
        assert_eq!(out, "ab-outer");
    }

    #[test]
    fn test_iterating_scalar_is_error() {
        let err = render_str("{% for x in count %}{% endfor %}", json!({"count": 3})).unwrap_err();
        assert!(matches!(err, TemplateError::Render { .. }));
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!(0.5)));
        assert!(is_truthy(&json!("x")));
    }
}
