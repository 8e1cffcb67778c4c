//! 外部可执行文件插件
//!
//! 每次收集启动一个子进程：请求写入 stdin，响应从 stdout 读取。
//! stdout/stderr 由独立线程读取，避免管道写满导致子进程阻塞。

use crate::plugin::types::{
    Plugin, PluginError, PluginInstance, PluginRequest, PluginResponse,
};
use crate::timeframe::Timeframe;
use serde_json::Value;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// 轮询子进程状态的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 外部可执行插件包装器
pub struct ExecutablePlugin {
    instance: PluginInstance,
}

impl ExecutablePlugin {
    /// 校验可执行文件并创建插件
    pub fn new(instance: PluginInstance) -> Result<Self, PluginError> {
        check_executable(&instance.executable)?;
        Ok(Self { instance })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.instance.config.timeout_secs())
    }

    /// 执行一次请求
    fn execute(&self, request: &PluginRequest) -> Result<PluginResponse, PluginError> {
        let request_json = serde_json::to_string(request)?;
        let path = &self.instance.executable;

        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(&self.instance.config.env)
            .env("RAPPORT_PLUGIN_ALIAS", self.instance.alias())
            .spawn()
            .map_err(|e| {
                PluginError::ExecutionFailed(format!("无法启动插件 {}: {}", path.display(), e))
            })?;

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        if let Some(mut stdin) = child.stdin.take() {
            // 插件可能不读取 stdin 就退出，此时写入失败不算错误
            if let Err(e) = stdin.write_all(request_json.as_bytes()) {
                tracing::debug!("写入插件 {} 请求失败: {}", self.instance.alias(), e);
            }
        }

        let status = match wait_with_timeout(&mut child, self.timeout())? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PluginError::Timeout(format!(
                    "{} 超过 {} 秒未返回",
                    self.instance.alias(),
                    self.timeout().as_secs()
                )));
            }
        };

        let stdout = join_reader(stdout)?;
        let stderr = join_reader(stderr)?;

        if !status.success() {
            let error_msg = String::from_utf8_lossy(&stderr);
            return Err(PluginError::ExecutionFailed(format!(
                "{} 退出状态 {}: {}",
                self.instance.alias(),
                status,
                error_msg.trim()
            )));
        }
        if !stderr.is_empty() {
            tracing::debug!(
                "插件 {} stderr: {}",
                self.instance.alias(),
                String::from_utf8_lossy(&stderr).trim()
            );
        }

        let response_str = String::from_utf8(stdout)
            .map_err(|e| PluginError::InvalidResponse(format!("无效UTF-8输出: {}", e)))?;
        serde_json::from_str(response_str.trim())
            .map_err(|e| PluginError::InvalidResponse(format!("无法解析 JSON: {}", e)))
    }
}

impl Plugin for ExecutablePlugin {
    fn name(&self) -> &str {
        self.instance.name()
    }

    fn alias(&self) -> &str {
        self.instance.alias()
    }

    fn collect(&self, timeframe: &Timeframe) -> Result<Value, PluginError> {
        let request = PluginRequest::collect(&self.instance.config, timeframe);
        self.execute(&request)?.into_result()
    }

    fn template_dir(&self) -> Option<&Path> {
        self.instance.executable.parent()
    }
}

/// 校验文件存在且可执行
pub fn check_executable(path: &Path) -> Result<(), PluginError> {
    if !path.is_file() {
        return Err(PluginError::LoadFailed(format!(
            "可执行文件不存在: {}",
            path.display()
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::metadata(path)?.permissions();
        if (permissions.mode() & 0o111) == 0 {
            return Err(PluginError::LoadFailed(format!(
                "文件不可执行: {}",
                path.display()
            )));
        }
    }

    Ok(())
}

fn spawn_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> Option<JoinHandle<std::io::Result<Vec<u8>>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_reader(
    handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
) -> Result<Vec<u8>, PluginError> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| PluginError::ExecutionFailed("读取插件输出的线程异常退出".to_string()))?
            .map_err(PluginError::from),
        None => Ok(Vec::new()),
    }
}

/// 等待子进程退出，超时返回 None
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<Option<std::process::ExitStatus>, PluginError> {
    // 超时过大无法表示为时间点时不设截止时间
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
