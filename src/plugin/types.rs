//! 插件系统类型定义
//!
//! 插件以外部可执行文件的形式存在，通过 stdin/stdout 交换 JSON：
//!
//! ```text
//! -> {"action":"collect","plugin":{...},"timeframe":{"kind","start","end"}}
//! <- {"success":true,"result":{...}}
//! ```

use crate::config::PluginInstanceConfig;
use crate::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 插件错误类型
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("插件未找到: {0}")]
    NotFound(String),

    #[error("插件加载失败: {0}")]
    LoadFailed(String),

    #[error("插件执行失败: {0}")]
    ExecutionFailed(String),

    #[error("插件返回错误: {0}")]
    Reported(String),

    #[error("插件超时: {0}")]
    Timeout(String),

    #[error("插件响应无效: {0}")]
    InvalidResponse(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),
}

/// 已发现的插件可执行文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredPlugin {
    pub name: String,
    pub path: PathBuf,
}

/// 插件实例：配置 + 可执行文件
#[derive(Debug, Clone)]
pub struct PluginInstance {
    pub config: PluginInstanceConfig,
    pub executable: PathBuf,
}

impl PluginInstance {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn alias(&self) -> &str {
        self.config.alias()
    }
}

/// 发送给插件的实例描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub alias: String,
    pub login: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
    pub settings: BTreeMap<String, String>,
}

impl From<&PluginInstanceConfig> for PluginDescriptor {
    fn from(config: &PluginInstanceConfig) -> Self {
        Self {
            name: config.name.clone(),
            alias: config.alias().to_string(),
            login: config.login.clone(),
            password: config.password.clone(),
            url: config.url.clone(),
            settings: config.settings.clone(),
        }
    }
}

/// 插件请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRequest {
    pub action: String,
    pub plugin: PluginDescriptor,
    pub timeframe: Value,
}

impl PluginRequest {
    pub fn collect(config: &PluginInstanceConfig, timeframe: &Timeframe) -> Self {
        Self {
            action: "collect".to_string(),
            plugin: PluginDescriptor::from(config),
            timeframe: timeframe.to_json(),
        }
    }
}

/// 插件响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PluginResponse {
    /// 转换为收集结果
    pub fn into_result(self) -> Result<Value, PluginError> {
        if !self.success {
            return Err(PluginError::Reported(
                self.error.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// 数据收集插件
///
/// 收集器只依赖此 trait，测试中可以用进程内实现替代外部程序。
pub trait Plugin: Send + Sync {
    /// 插件名称（可执行文件名）
    fn name(&self) -> &str;

    /// 实例别名
    fn alias(&self) -> &str;

    /// 收集时间范围内的数据
    fn collect(&self, timeframe: &Timeframe) -> Result<Value, PluginError>;

    /// 可执行文件所在目录，其中的 `<插件名>.<格式>.tmpl` 作为模板后备
    fn template_dir(&self) -> Option<&Path> {
        None
    }

    /// 模板上下文中的插件描述
    fn summary(&self) -> Value {
        serde_json::json!({ "name": self.name(), "alias": self.alias() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixed_timeframe;

    #[test]
    fn test_collect_request_shape() {
        let mut config = PluginInstanceConfig::new("github");
        config.alias = Some("gh".to_string());
        config.login = Some("jdoe".to_string());
        config.settings.insert("org".to_string(), "acme".to_string());

        let request = PluginRequest::collect(&config, &fixed_timeframe());
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["action"], "collect");
        assert_eq!(value["plugin"]["name"], "github");
        assert_eq!(value["plugin"]["alias"], "gh");
        assert_eq!(value["plugin"]["login"], "jdoe");
        assert_eq!(value["plugin"]["settings"]["org"], "acme");
        assert_eq!(value["timeframe"]["start"], "2026-10-12T00:00:00");
    }

    #[test]
    fn test_response_into_result() {
        let ok: PluginResponse =
            serde_json::from_str(r#"{"success":true,"result":{"count":3}}"#).unwrap();
        assert_eq!(ok.into_result().unwrap()["count"], 3);

        let empty: PluginResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(empty.into_result().unwrap(), Value::Null);

        let failed: PluginResponse =
            serde_json::from_str(r#"{"success":false,"error":"bad token"}"#).unwrap();
        let err = failed.into_result().unwrap_err();
        assert!(matches!(err, PluginError::Reported(ref m) if m == "bad token"));
    }
}
