//! rapport 主程序入口
//!
//! 设计原则：
//! - 模块化：入口代码简洁，逻辑委托给各模块
//! - 安静模式：默认只输出命令结果，日志写 stderr
//! - 错误处理：详细/安静错误模式，通过 --verbose 切换

use clap::Parser;
use rapport::cli::{Cli, Commands, ConfigCommands};
use rapport::config::{self, RapportConfig};
use rapport::core::{ReportOptions, ReportStore, create_report, edit_report};
use rapport::email::Mail;
use rapport::error::{RapportError, Result};
use rapport::plugin::PluginRegistry;
use rapport::template::TemplateEngine;
use rapport::timeframe::{Timeframe, TimeframeKind};
use rapport::types::{EmailPart, OutputFormat, ReportFormat, report_file_name};
use rapport::utils::{self, paths};
use serde_json::json;
use std::path::{Path, PathBuf};

fn main() {
    // 解析 CLI 参数
    let cli = Cli::parse();

    let config_path = match resolve_config_path(&cli) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("配置初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    // 配置加载失败时仍用默认 verbosity 初始化日志，错误留给需要配置的命令
    let loaded = RapportConfig::load(&config_path);
    let configured = loaded
        .as_ref()
        .map(|c| c.rapport.verbosity)
        .unwrap_or_else(|_| config::GeneralSettings::default().verbosity);
    let verbosity = cli.verbosity(configured);
    utils::logging::init(verbosity);

    // 执行命令，统一错误处理
    let verbose = verbosity >= 2;
    if let Err(e) = run_command(cli.command, &config_path, loaded, verbose) {
        e.report(verbose);
        std::process::exit(1);
    }
}

/// --config 或默认配置文件
fn resolve_config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => paths::get_config_file(),
    }
}

/// 运行具体命令
fn run_command(
    command: Commands,
    config_path: &Path,
    loaded: Result<RapportConfig>,
    verbose: bool,
) -> Result<()> {
    match command {
        Commands::Create {
            timeframe,
            days,
            plugins,
        } => {
            let config = loaded?;
            config.ensure_valid()?;

            let kind = match timeframe {
                Some(name) => TimeframeKind::parse(&name)?.with_days(config.rapport.recent_days),
                None => config.timeframe_kind()?,
            };
            let kind = match days {
                Some(days) => kind.override_days(days)?,
                None => kind,
            };
            let timeframe = Timeframe::now(kind)?;

            let registry = PluginRegistry::discover_default()?;
            let loaded_plugins = registry.load(&config, &plugins)?;
            if loaded_plugins.is_empty() {
                tracing::warn!("没有配置任何插件，报告将为空");
            }

            let report = create_report(
                &ReportStore::open_default()?,
                &TemplateEngine::from_default_dirs()?,
                &loaded_plugins,
                &timeframe,
                &ReportOptions {
                    login: config.login(),
                    max_workers: config.rapport.max_workers,
                },
            )?;

            println!("{}", report.name);
            if verbose {
                println!("\n{}\n\n{}", report.subject, report.body);
            }
        }

        Commands::List { format } => {
            let names = ReportStore::open_default()?.list()?;
            match format {
                OutputFormat::Text => {
                    for name in &names {
                        println!("{}", name);
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
            }
        }

        Commands::Show {
            report,
            part,
            format,
        } => {
            let report = ReportStore::open_default()?.get(report.as_deref())?;
            match (format, part) {
                (OutputFormat::Json, _) => println!("{}", serde_json::to_string_pretty(&report)?),
                (OutputFormat::Text, Some(part)) => {
                    let file = report_file_name(ReportFormat::Email, part);
                    let content = report
                        .files
                        .get(&file)
                        .ok_or_else(|| RapportError::FileNotFound(report.path.join(&file)))?;
                    println!("{}", content.trim_end());
                }
                (OutputFormat::Text, None) => {
                    println!("报告 {}", report.name);
                    for (file, content) in &report.files {
                        println!("\n==> {} <==\n{}", file, content.trim_end());
                    }
                }
            }
        }

        Commands::Edit {
            report,
            format,
            part,
        } => {
            let editor = std::env::var("EDITOR").ok().filter(|e| !e.trim().is_empty());
            let file = edit_report(
                &ReportStore::open_default()?,
                report.as_deref(),
                format,
                part,
                editor.as_deref(),
            )?;
            if verbose {
                println!("✓ 已编辑 {}", file.display());
            }
        }

        Commands::Delete { pattern } => {
            let removed = ReportStore::open_default()?.delete(&pattern)?;
            if removed.is_empty() {
                return Err(RapportError::ReportNotFound(pattern));
            }
            if verbose {
                for name in &removed {
                    println!("✓ 已删除 {}", name);
                }
            }
        }

        Commands::Email { report, print } => {
            let config = loaded?;
            let report = ReportStore::open_default()?.get(report.as_deref())?;
            let mail = Mail::compose(&report, &config.email)?;
            if config.email.to.is_empty() {
                tracing::warn!("未配置收件人 (email.to)");
            }
            if print {
                println!("{}", mail.mailto_url());
            } else {
                mail.open()?;
            }
        }

        Commands::Plugins { format } => {
            let config = loaded?;
            list_plugins(&config, format)?;
        }

        Commands::Timeframes => {
            let recent_days = loaded
                .map(|c| c.rapport.recent_days)
                .unwrap_or(rapport::timeframe::DEFAULT_RECENT_DAYS);
            for name in TimeframeKind::NAMES {
                let kind = TimeframeKind::parse(name)?.with_days(recent_days);
                println!("{:<15} {}", name, kind.describe());
                if verbose {
                    match Timeframe::now(kind) {
                        Ok(resolved) => println!("{:<15} {}", "", resolved),
                        Err(e) => println!("{:<15} {}", "", e),
                    }
                }
            }
        }

        Commands::Config(sub) => run_config_command(sub, config_path, loaded, verbose)?,

        // 问题诊断
        Commands::Doctor => diagnose(config_path, loaded, verbose)?,
    }

    Ok(())
}

/// 配置子命令
fn run_config_command(
    command: ConfigCommands,
    config_path: &Path,
    loaded: Result<RapportConfig>,
    verbose: bool,
) -> Result<()> {
    match command {
        ConfigCommands::Init { force } => {
            let path = config::init_config(config_path, force)?;
            println!("{}", path.display());
        }

        ConfigCommands::Info => {
            let config = loaded?;
            show_info(config_path, &config, verbose)?;
        }

        ConfigCommands::Validate => {
            let config = loaded?;
            match config.validate() {
                Ok(()) => println!("✓ 配置有效: {}", config_path.display()),
                Err(issues) => {
                    for issue in &issues {
                        println!("⚠️  {}", issue);
                    }
                    return Err(RapportError::InvalidConfig(format!(
                        "发现 {} 个问题",
                        issues.len()
                    )));
                }
            }
        }
    }

    Ok(())
}

/// 显示配置信息
fn show_info(config_path: &Path, config: &RapportConfig, verbose: bool) -> Result<()> {
    let exists = paths::file_exists(config_path);
    println!(
        "配置文件: {} [{}]",
        config_path.display(),
        if exists { "存在" } else { "不存在，使用默认值" }
    );
    println!("报告目录: {}", paths::get_reports_dir()?.display());
    println!("署名: {}", config.login());
    println!("时间范围: {}", config.timeframe_kind()?);
    println!("并行数: {}", config.rapport.max_workers);
    println!("插件实例: {} 个", config.plugins.len());

    if verbose {
        println!("\n插件目录:");
        for dir in paths::get_plugin_dirs()? {
            println!("  {}", dir.display());
        }
        println!("\n模板目录:");
        for dir in paths::get_template_dirs()? {
            println!("  {}", dir.display());
        }
    }

    Ok(())
}

/// 已发现的插件与配置的插件实例
fn list_plugins(config: &RapportConfig, format: OutputFormat) -> Result<()> {
    let registry = PluginRegistry::discover_default()?;

    match format {
        OutputFormat::Json => {
            let configured: Vec<_> = config
                .plugins
                .iter()
                .map(|p| {
                    json!({
                        "name": p.name,
                        "alias": p.alias(),
                        "executable": registry.get(&p.name).map(|d| d.path.display().to_string()),
                    })
                })
                .collect();
            let output = json!({
                "dirs": registry.dirs(),
                "discovered": registry.plugins().collect::<Vec<_>>(),
                "configured": configured,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("已发现的插件:");
            let mut any = false;
            for plugin in registry.plugins() {
                any = true;
                println!("  {:<15} {}", plugin.name, plugin.path.display());
            }
            if !any {
                println!("  (无)");
            }

            println!("\n已配置的实例:");
            if config.plugins.is_empty() {
                println!("  (无)");
            }
            for p in &config.plugins {
                let status = if registry.get(&p.name).is_some() {
                    "✓"
                } else {
                    "✗ 未找到"
                };
                println!("  {:<15} {} {}", p.alias(), p.name, status);
            }
        }
    }

    Ok(())
}

/// 诊断问题
fn diagnose(config_path: &Path, loaded: Result<RapportConfig>, verbose: bool) -> Result<()> {
    println!("🔍 rapport 诊断工具\n");

    let mut issues = 0;

    // 1. 检查配置文件
    let config = match loaded {
        Ok(config) => {
            if paths::file_exists(config_path) {
                println!("✓ 配置文件: {}", config_path.display());
            } else {
                println!("⚠️  配置文件不存在: {}", config_path.display());
                println!("   解决：运行 rapport config init");
                issues += 1;
            }
            config
        }
        Err(e) => {
            println!("❌ {}", e);
            issues += 1;
            RapportConfig::default()
        }
    };

    if let Err(problems) = config.validate() {
        for problem in problems {
            println!("❌ {}", problem);
            issues += 1;
        }
    }

    // 2. 检查插件绑定
    let registry = PluginRegistry::discover_default()?;
    for p in &config.plugins {
        match registry.get(&p.name) {
            Some(found) => {
                if let Err(e) = rapport::plugin::executable::check_executable(&found.path) {
                    println!("❌ 插件 {}: {}", p.alias(), e);
                    issues += 1;
                } else if verbose {
                    println!("✓ 插件 {} -> {}", p.alias(), found.path.display());
                }
            }
            None => {
                println!("❌ 插件 {} 的可执行文件 {} 未找到", p.alias(), p.name);
                issues += 1;
            }
        }
    }

    // 3. 检查模板
    let engine = TemplateEngine::from_default_dirs()?;
    for part in [EmailPart::Body, EmailPart::Subject] {
        if let Err(e) = engine.email_template(part.as_str()) {
            println!("❌ 邮件模板 {}: {}", part, e);
            issues += 1;
        }
    }
    for p in &config.plugins {
        let executable_dir = registry.get(&p.name).and_then(|found| found.path.parent());
        match engine.plugin_template(&p.name, "text", executable_dir) {
            Ok(Some(_)) => {}
            Ok(None) => {
                println!("⚠️  插件 {} 没有文本模板，结果不会出现在报告中", p.name);
                issues += 1;
            }
            Err(e) => {
                println!("❌ 插件 {} 的模板: {}", p.name, e);
                issues += 1;
            }
        }
    }

    // 4. 检查报告目录
    let store = ReportStore::open_default()?;
    if store.root().is_dir() {
        let count = store.list()?.len();
        println!("✓ 报告目录: {} [{} 份报告]", store.root().display(), count);
    } else if verbose {
        println!("ℹ️  报告目录尚未创建: {}", store.root().display());
    }

    if issues == 0 {
        println!("✅ 未发现明显问题");
    } else {
        println!("\n发现 {} 个问题", issues);
        if !verbose {
            println!("提示：使用 -vv 查看详细信息");
        }
    }

    Ok(())
}
