//! 核心数据结构定义 (表达原则：用数据结构表达逻辑)

use clap::ValueEnum;
use std::fmt;

/// 报告文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// 邮件文本 email.<part>.text
    Email,
    /// 网页 index.html
    Html,
}

/// 邮件组成部分
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmailPart {
    Body,
    Subject,
}

impl EmailPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailPart::Body => "body",
            EmailPart::Subject => "subject",
        }
    }
}

impl fmt::Display for EmailPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 报告目录中的文件名
pub fn report_file_name(format: ReportFormat, part: EmailPart) -> String {
    match format {
        ReportFormat::Email => format!("email.{}.text", part),
        ReportFormat::Html => "index.html".to_string(),
    }
}

/// 命令输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_file_name() {
        assert_eq!(
            report_file_name(ReportFormat::Email, EmailPart::Body),
            "email.body.text"
        );
        assert_eq!(
            report_file_name(ReportFormat::Email, EmailPart::Subject),
            "email.subject.text"
        );
        assert_eq!(
            report_file_name(ReportFormat::Html, EmailPart::Subject),
            "index.html"
        );
    }
}
