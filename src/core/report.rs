//! 报告生成
//!
//! 并行收集所有插件的数据，按插件模板渲染，再渲染邮件正文与标题并写入报告目录。

use crate::core::collector::collect_all;
use crate::core::store::ReportStore;
use crate::error::{RapportError, Result};
use crate::plugin::Plugin;
use crate::template::TemplateEngine;
use crate::timeframe::Timeframe;
use crate::types::{EmailPart, ReportFormat};
use crate::utils::executor::CommandExecutor;
use serde::Serialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;

/// 日志中结果预览的最大长度
const PREVIEW_LIMIT: usize = 1000;

/// 报告生成参数
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub login: String,
    pub max_workers: usize,
}

/// 单个插件渲染后的文本
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginOutput {
    pub name: String,
    pub alias: String,
    pub text: String,
}

/// 新建的报告
#[derive(Debug, Clone, Serialize)]
pub struct CreatedReport {
    pub name: String,
    pub path: PathBuf,
    pub login: String,
    pub date: String,
    pub body: String,
    pub subject: String,
    pub results: Vec<PluginOutput>,
    /// 因模板缺失或模板错误而跳过的插件别名
    pub skipped: Vec<String>,
}

/// 截断过长的结果预览
fn preview(value: &Value) -> String {
    let text = value.to_string();
    match text.char_indices().nth(PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{} ...", &text[..cut]),
        None => text,
    }
}

/// 插件模板的上下文：结果对象本身，附加 plugin 与 timeframe
fn plugin_context(plugin: &dyn Plugin, result: Value, timeframe: &Timeframe) -> Value {
    let mut context = match result {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("result".to_string(), other);
            map
        }
    };
    context
        .entry("plugin")
        .or_insert_with(|| plugin.summary());
    context
        .entry("timeframe")
        .or_insert_with(|| timeframe.to_json());
    Value::Object(context)
}

/// 生成报告
pub fn create_report(
    store: &ReportStore,
    engine: &TemplateEngine,
    plugins: &[Arc<dyn Plugin>],
    timeframe: &Timeframe,
    options: &ReportOptions,
) -> Result<CreatedReport> {
    let name = timeframe.report_name();
    let path = store.create(&name)?;
    tracing::info!("生成报告 {} ({})", name, timeframe);

    let mut rendered: Vec<Option<String>> = vec![None; plugins.len()];
    let mut skipped = Vec::new();

    for collected in collect_all(plugins, timeframe, options.max_workers) {
        let plugin = &plugins[collected.index];
        let value = collected.result.map_err(|source| RapportError::PluginFailed {
            alias: plugin.alias().to_string(),
            source,
        })?;
        tracing::debug!("{} 的结果: {}", plugin.alias(), preview(&value));

        let template = match engine.plugin_template(plugin.name(), "text", plugin.template_dir())
        {
            Ok(Some(template)) => template,
            Ok(None) => {
                tracing::warn!("插件 {} 没有文本模板，跳过", plugin.name());
                skipped.push(plugin.alias().to_string());
                continue;
            }
            Err(e) => {
                tracing::warn!("插件 {} 的模板有误: {}", plugin.alias(), e);
                skipped.push(plugin.alias().to_string());
                continue;
            }
        };

        match template.render(&plugin_context(plugin.as_ref(), value, timeframe)) {
            Ok(text) => rendered[collected.index] = Some(text.trim_end().to_string()),
            Err(e) => {
                tracing::warn!("插件 {} 的模板渲染失败: {}", plugin.alias(), e);
                skipped.push(plugin.alias().to_string());
            }
        }
    }

    // 结果按配置顺序排列
    let results: Vec<PluginOutput> = plugins
        .iter()
        .zip(rendered)
        .filter_map(|(plugin, text)| {
            text.map(|text| PluginOutput {
                name: plugin.name().to_string(),
                alias: plugin.alias().to_string(),
                text,
            })
        })
        .collect();
    skipped.sort_by_key(|alias| plugins.iter().position(|p| p.alias() == alias.as_str()));

    let mut context = json!({
        "login": options.login,
        "date": name,
        "timeframe": timeframe.to_json(),
        "plugins": plugins.iter().map(|p| p.summary()).collect::<Vec<_>>(),
        "results": results,
    });

    let body = engine.email_template("body")?.render(&context)?;
    store.write_file(&name, "email.body.text", &body)?;

    // 正文也可以在标题模板中使用
    context["body"] = Value::String(body.clone());
    let subject = engine.email_template("subject")?.render(&context)?;
    let subject = subject.trim().to_string();
    store.write_file(&name, "email.subject.text", &subject)?;

    Ok(CreatedReport {
        name: name.clone(),
        path,
        login: options.login.clone(),
        date: name,
        body,
        subject,
        results,
        skipped,
    })
}

/// 用编辑器打开报告文件
pub fn edit_report(
    store: &ReportStore,
    name: Option<&str>,
    format: ReportFormat,
    part: EmailPart,
    editor: Option<&str>,
) -> Result<PathBuf> {
    let file = store.file_path(name, format, part)?;
    CommandExecutor::exec_checked(&CommandExecutor::editor_command(editor, &file)?)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collector::tests::FakePlugin;
    use crate::test_utils::fixed_timeframe;

    struct Fixture {
        dir: tempfile::TempDir,
        store: ReportStore,
        engine: TemplateEngine,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path().join("reports"));
        let engine = TemplateEngine::new(vec![dir.path().join("templates")]);
        Fixture { dir, store, engine }
    }

    fn write_plugin_template(fx: &Fixture, name: &str, content: &str) {
        let tdir = fx.dir.path().join("templates").join("plugins");
        std::fs::create_dir_all(&tdir).unwrap();
        std::fs::write(tdir.join(format!("{}.text.tmpl", name)), content).unwrap();
    }

    fn options() -> ReportOptions {
        ReportOptions {
            login: "jdoe".to_string(),
            max_workers: 4,
        }
    }

    #[test]
    fn test_create_report_writes_files_in_config_order() {
        let fx = fixture();
        write_plugin_template(&fx, "github", "{{ commits }} commits as {{ plugin.alias }}");
        write_plugin_template(&fx, "bugzilla", "{{ result }} bugs since {{ timeframe.start }}");

        let plugins: Vec<Arc<dyn Plugin>> = vec![
            Arc::new(
                FakePlugin::ok("gh", json!({"commits": 5}))
                    .named("github")
                    .delayed(100),
            ),
            Arc::new(FakePlugin::ok("bz", json!(2)).named("bugzilla")),
        ];

        let report =
            create_report(&fx.store, &fx.engine, &plugins, &fixed_timeframe(), &options()).unwrap();

        assert_eq!(report.name, "2026-10-16T17:30:00");
        assert_eq!(
            report.results,
            vec![
                PluginOutput {
                    name: "github".to_string(),
                    alias: "gh".to_string(),
                    text: "5 commits as gh".to_string(),
                },
                PluginOutput {
                    name: "bugzilla".to_string(),
                    alias: "bz".to_string(),
                    text: "2 bugs since 2026-10-12T00:00:00".to_string(),
                },
            ]
        );
        assert_eq!(report.subject, "Status report jdoe 2026-10-16T17:30:00");

        let stored = fx.store.get(None).unwrap();
        assert_eq!(stored.files["email.subject.text"], report.subject);
        let body = &stored.files["email.body.text"];
        let gh = body.find("gh:\n5 commits as gh").unwrap();
        let bz = body.find("bz:\n2 bugs").unwrap();
        assert!(gh < bz);
    }

    #[test]
    fn test_missing_or_broken_template_skips_plugin() {
        let fx = fixture();
        write_plugin_template(&fx, "broken", "{% if x %}");
        write_plugin_template(&fx, "strict", "{{ required_field }}");

        let plugins: Vec<Arc<dyn Plugin>> = vec![
            Arc::new(FakePlugin::ok("no-template", json!({})).named("github")),
            Arc::new(FakePlugin::ok("syntax", json!({})).named("broken")),
            Arc::new(FakePlugin::ok("render", json!({})).named("strict")),
        ];

        let report =
            create_report(&fx.store, &fx.engine, &plugins, &fixed_timeframe(), &options()).unwrap();

        assert!(report.results.is_empty());
        assert_eq!(report.skipped, vec!["no-template", "syntax", "render"]);
        assert!(report.body.contains("Nothing to report."));
    }

    #[test]
    fn test_failing_plugin_aborts() {
        let fx = fixture();
        write_plugin_template(&fx, "github", "ok");
        let plugins: Vec<Arc<dyn Plugin>> = vec![
            Arc::new(FakePlugin::ok("gh", json!({})).named("github")),
            Arc::new(FakePlugin::failing("lp", "connection refused").named("launchpad")),
        ];

        let err = create_report(&fx.store, &fx.engine, &plugins, &fixed_timeframe(), &options())
            .unwrap_err();

        match err {
            RapportError::PluginFailed { alias, source } => {
                assert_eq!(alias, "lp");
                assert!(source.to_string().contains("connection refused"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!fx
            .store
            .report_path("2026-10-16T17:30:00")
            .join("email.body.text")
            .exists());
    }

    #[test]
    fn test_subject_template_can_use_body() {
        let fx = fixture();
        let email_dir = fx.dir.path().join("templates").join("email");
        std::fs::create_dir_all(&email_dir).unwrap();
        std::fs::write(email_dir.join("body.text.tmpl"), "BODY {{ login }}").unwrap();
        std::fs::write(email_dir.join("subject.text.tmpl"), "[{{ body }}]\n").unwrap();

        let report =
            create_report(&fx.store, &fx.engine, &[], &fixed_timeframe(), &options()).unwrap();
        assert_eq!(report.body, "BODY jdoe");
        assert_eq!(report.subject, "[BODY jdoe]");
    }

    #[test]
    fn test_preview_truncates() {
        let long = Value::String("x".repeat(2000));
        let text = preview(&long);
        assert!(text.ends_with(" ..."));
        assert_eq!(text.chars().count(), PREVIEW_LIMIT + 4);

        assert_eq!(preview(&json!({"a": 1})), "{\"a\":1}");
    }

    #[cfg(unix)]
    #[test]
    fn test_edit_report_uses_editor() {
        let fx = fixture();
        fx.store
            .write_file("2026-10-16T17:30:00", "email.body.text", "old")
            .unwrap();
        // 以 sh -c 充当编辑器，把文件内容改掉
        let script = fx.dir.path().join("editor.sh");
        std::fs::write(&script, "#!/bin/sh\necho edited > \"$1\"\n").unwrap();
        let editor = format!("sh {}", script.display());

        let file = edit_report(
            &fx.store,
            None,
            ReportFormat::Email,
            EmailPart::Body,
            Some(&editor),
        )
        .unwrap();

        assert_eq!(std::fs::read_to_string(file).unwrap(), "edited\n");
    }
}
