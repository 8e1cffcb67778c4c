//! 邮件撰写
//!
//! 不直接发送邮件：把报告的标题和正文编码为 `mailto:` 链接，交给桌面邮件客户端。

use crate::config::EmailSettings;
use crate::core::Report;
use crate::error::{RapportError, Result};
use crate::utils::executor::CommandExecutor;

/// 待发送的邮件
#[derive(Debug, Clone, PartialEq)]
pub struct Mail {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
}

fn encode_address(address: &str) -> String {
    urlencoding::encode(address.trim()).replace("%40", "@")
}

impl Mail {
    /// 从报告文件组装邮件
    pub fn compose(report: &Report, settings: &EmailSettings) -> Result<Self> {
        let file = |name: &str| {
            report
                .files
                .get(name)
                .cloned()
                .ok_or_else(|| RapportError::FileNotFound(report.path.join(name)))
        };

        Ok(Self {
            to: settings.to.clone(),
            cc: settings.cc.clone(),
            subject: file("email.subject.text")?.trim().to_string(),
            body: file("email.body.text")?,
        })
    }

    /// RFC 6068 mailto 链接
    pub fn mailto_url(&self) -> String {
        let to = self
            .to
            .iter()
            .map(|a| encode_address(a))
            .collect::<Vec<_>>()
            .join(",");

        let mut query = vec![
            format!("subject={}", urlencoding::encode(&self.subject)),
            // 换行按 RFC 6068 使用 CRLF
            format!(
                "body={}",
                urlencoding::encode(&self.body.replace("\r\n", "\n").replace('\n', "\r\n"))
            ),
        ];
        if !self.cc.is_empty() {
            let cc = self
                .cc
                .iter()
                .map(|a| encode_address(a))
                .collect::<Vec<_>>()
                .join(",");
            query.push(format!("cc={}", cc));
        }

        format!("mailto:{}?{}", to, query.join("&"))
    }

    /// 用桌面邮件客户端打开
    pub fn open(&self) -> Result<()> {
        CommandExecutor::exec_checked(&CommandExecutor::open_command(&self.mailto_url()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn report(files: &[(&str, &str)]) -> Report {
        Report {
            name: "2026-10-16T17:30:00".to_string(),
            path: PathBuf::from("/data/reports/2026-10-16T17:30:00"),
            files: files
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_mailto_url() {
        let settings = EmailSettings {
            to: vec!["team@example.com".to_string(), "boss@example.com".to_string()],
            cc: vec!["me@example.com".to_string()],
        };
        let mail = Mail::compose(
            &report(&[
                ("email.subject.text", "Status report\n"),
                ("email.body.text", "Hi,\nall good & done"),
            ]),
            &settings,
        )
        .unwrap();

        assert_eq!(mail.subject, "Status report");
        assert_eq!(
            mail.mailto_url(),
            "mailto:team@example.com,boss@example.com?subject=Status%20report\
             &body=Hi%2C%0D%0Aall%20good%20%26%20done&cc=me@example.com"
        );
    }

    #[test]
    fn test_mailto_without_recipients() {
        let mail = Mail {
            to: vec![],
            cc: vec![],
            subject: "S".to_string(),
            body: "B".to_string(),
        };
        assert_eq!(mail.mailto_url(), "mailto:?subject=S&body=B");
    }

    #[test]
    fn test_compose_missing_body() {
        let result = Mail::compose(
            &report(&[("email.subject.text", "S")]),
            &EmailSettings::default(),
        );
        assert!(matches!(result, Err(RapportError::FileNotFound(ref p)) if p.ends_with("email.body.text")));
    }
}
