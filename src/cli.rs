//! CLI 参数定义

use crate::types::{EmailPart, OutputFormat, ReportFormat};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// rapport - 工作报告生成工具
#[derive(Parser, Debug)]
#[command(
    name = "rapport",
    version,
    about = "工作报告生成工具",
    long_about = "并行运行数据收集插件，按模板渲染结果，生成以日期命名的工作报告"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 详细输出（可重复：-v 信息，-vv 调试）
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// 安静模式，只输出错误
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// 配置文件路径（默认 ~/.rapport/rapport.toml）
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// 命令行覆盖配置中的 verbosity
    pub fn verbosity(&self, configured: u8) -> u8 {
        if self.quiet {
            0
        } else if self.verbose > 0 {
            self.verbose.saturating_add(1)
        } else {
            configured
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 生成新报告
    Create {
        /// 时间范围 (current_week/last_week/current_month/recent_days/today)
        #[arg(short, long)]
        timeframe: Option<String>,
        /// recent_days 的天数
        #[arg(short, long)]
        days: Option<u32>,
        /// 只运行指定别名的插件（可重复）
        #[arg(short, long = "plugin")]
        plugins: Vec<String>,
    },

    /// 列出已有报告
    List {
        /// 输出格式
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// 显示报告（默认最新一份）
    Show {
        /// 报告名
        report: Option<String>,
        /// 只显示邮件的某部分
        #[arg(short, long, value_enum)]
        part: Option<EmailPart>,
        /// 输出格式
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// 用 $EDITOR 编辑报告
    Edit {
        /// 报告名
        report: Option<String>,
        /// 文件类型
        #[arg(short = 't', long = "type", value_enum, default_value_t = ReportFormat::Email)]
        format: ReportFormat,
        /// 邮件部分
        #[arg(short, long, value_enum, default_value_t = EmailPart::Body)]
        part: EmailPart,
    },

    /// 删除报告（支持通配符，如 '2026-09-*'）
    Delete {
        /// 报告名或通配符
        pattern: String,
    },

    /// 用邮件客户端发送报告
    Email {
        /// 报告名
        report: Option<String>,
        /// 只打印 mailto 链接
        #[arg(long)]
        print: bool,
    },

    /// 列出插件
    Plugins {
        /// 输出格式
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// 列出可用的时间范围
    Timeframes,

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommands),

    /// 诊断问题
    Doctor,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// 初始化配置
    Init {
        #[arg(short, long)]
        force: bool,
    },
    /// 显示配置信息
    Info,
    /// 验证配置
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::parse_from([
            "rapport", "create", "-t", "recent_days", "--days", "3", "-p", "gh", "-p", "bz",
        ]);
        match cli.command {
            Commands::Create {
                timeframe,
                days,
                plugins,
            } => {
                assert_eq!(timeframe.as_deref(), Some("recent_days"));
                assert_eq!(days, Some(3));
                assert_eq!(plugins, vec!["gh", "bz"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_edit_defaults() {
        let cli = Cli::parse_from(["rapport", "edit"]);
        match cli.command {
            Commands::Edit {
                report,
                format,
                part,
            } => {
                assert!(report.is_none());
                assert_eq!(format, ReportFormat::Email);
                assert_eq!(part, EmailPart::Body);
            }
            other => panic!("unexpected {:?}", other),
        }

        let cli = Cli::parse_from(["rapport", "edit", "--type", "html"]);
        assert!(matches!(
            cli.command,
            Commands::Edit {
                format: ReportFormat::Html,
                ..
            }
        ));
    }

    #[test]
    fn test_verbosity_override() {
        let cli = Cli::parse_from(["rapport", "list"]);
        assert_eq!(cli.verbosity(1), 1);

        let cli = Cli::parse_from(["rapport", "-vv", "list"]);
        assert_eq!(cli.verbosity(1), 3);

        let cli = Cli::parse_from(["rapport", "list", "-q"]);
        assert_eq!(cli.verbosity(2), 0);
    }
}
