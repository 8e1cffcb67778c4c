//! 跨平台命令执行器
//!
//! 用于启动编辑器和打开 mailto 链接，子进程继承父进程的 stdin/stdout/stderr。

use crate::error::{RapportError, Result};
use std::path::Path;
use std::process::{Command, Stdio};

/// 未设置 $EDITOR 时使用的编辑器
pub const DEFAULT_EDITOR: &str = "vi";

/// 跨平台命令执行器
pub struct CommandExecutor;

impl CommandExecutor {
    /// 执行命令并等待结束
    ///
    /// # 返回
    /// 子进程的退出码（被信号终止时为 -1）
    pub fn exec(command: &[String]) -> Result<i32> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| RapportError::CommandExecutionFailed("命令不能为空".to_string()))?;

        tracing::debug!("执行命令: {}", command.join(" "));

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| {
                RapportError::CommandNotFound(format!(
                    "{}: {} (请确保命令在 PATH 中或使用完整路径)",
                    program, e
                ))
            })?;

        Ok(status.code().unwrap_or(-1))
    }

    /// 执行命令，非零退出码视为错误
    pub fn exec_checked(command: &[String]) -> Result<()> {
        let code = Self::exec(command)?;
        if code != 0 {
            return Err(RapportError::CommandExecutionFailed(format!(
                "{} 退出码 {}",
                command.first().map(String::as_str).unwrap_or(""),
                code
            )));
        }
        Ok(())
    }

    /// 编辑器命令行：$EDITOR 按 shell 规则拆分，可以带参数和引号，例如 `code -w`
    pub fn editor_command(editor: Option<&str>, file: &Path) -> Result<Vec<String>> {
        let editor = editor
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_EDITOR);
        let mut command = shell_words::split(editor).map_err(|e| {
            RapportError::InvalidArgument(format!("无法解析 EDITOR '{}': {}", editor, e))
        })?;
        command.push(file.display().to_string());
        Ok(command)
    }

    /// 用桌面默认程序打开链接
    pub fn open_command(target: &str) -> Vec<String> {
        let prefix: &[&str] = if cfg!(target_os = "windows") {
            &["cmd", "/C", "start", ""]
        } else if cfg!(target_os = "macos") {
            &["open"]
        } else {
            &["xdg-open"]
        };
        prefix
            .iter()
            .map(|s| s.to_string())
            .chain(std::iter::once(target.to_string()))
            .collect()
    }
}
