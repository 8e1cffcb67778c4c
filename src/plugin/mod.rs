//! 插件系统
//!
//! 插件是放在插件目录中的可执行文件，文件名（去掉扩展名）即插件名。
//! 配置中的每个 `[[plugins]]` 段是一个插件实例，按 name 绑定到可执行文件。
//!
//! # 模块结构
//!
//! - `types.rs` - 核心类型定义与 `Plugin` trait
//! - `executable.rs` - 外部可执行文件插件

pub mod executable;
pub mod types;

pub use executable::ExecutablePlugin;
pub use types::{
    DiscoveredPlugin, Plugin, PluginDescriptor, PluginError, PluginInstance, PluginRequest,
    PluginResponse,
};

use crate::config::RapportConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 插件目录中需要跳过的文件扩展名（模板、说明等）
const IGNORED_EXTENSIONS: [&str; 4] = ["tmpl", "md", "txt", "json"];

/// 在一个目录中查找插件可执行文件
fn discover_in(dir: &Path) -> Result<Vec<DiscoveredPlugin>, PluginError> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }

    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let file_name = path.file_name().unwrap_or_default().to_string_lossy();
        if file_name.starts_with('.') {
            continue;
        }
        if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IGNORED_EXTENSIONS.contains(&ext))
        {
            continue;
        }
        if executable::check_executable(&path).is_err() {
            tracing::debug!("跳过不可执行文件: {}", path.display());
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        found.push(DiscoveredPlugin { name, path });
    }
    Ok(found)
}

/// 插件注册表：已发现的插件，按名称索引
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    dirs: Vec<PathBuf>,
    plugins: BTreeMap<String, DiscoveredPlugin>,
}

impl PluginRegistry {
    /// 扫描目录，靠前的目录优先
    pub fn discover(dirs: &[PathBuf]) -> Result<Self, PluginError> {
        let mut plugins = BTreeMap::new();
        for dir in dirs {
            for plugin in discover_in(dir)? {
                plugins.entry(plugin.name.clone()).or_insert(plugin);
            }
        }
        tracing::debug!("发现 {} 个插件", plugins.len());
        Ok(Self {
            dirs: dirs.to_vec(),
            plugins,
        })
    }

    /// 扫描默认插件目录
    pub fn discover_default() -> crate::error::Result<Self> {
        let dirs = crate::utils::paths::get_plugin_dirs()?;
        Ok(Self::discover(&dirs)?)
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn get(&self, name: &str) -> Option<&DiscoveredPlugin> {
        self.plugins.get(name)
    }

    /// 所有已发现的插件（按名称排序）
    pub fn plugins(&self) -> impl Iterator<Item = &DiscoveredPlugin> {
        self.plugins.values()
    }

    /// 将配置中的插件实例绑定到可执行文件
    ///
    /// `only` 非空时只绑定其中列出的别名，顺序保持配置中的顺序。
    pub fn bind(
        &self,
        config: &RapportConfig,
        only: &[String],
    ) -> Result<Vec<PluginInstance>, PluginError> {
        for alias in only {
            if config.plugin(alias).is_none() {
                return Err(PluginError::NotFound(format!("配置中没有别名为 {} 的插件", alias)));
            }
        }

        config
            .plugins
            .iter()
            .filter(|p| only.is_empty() || only.iter().any(|a| a == p.alias()))
            .map(|p| {
                let discovered = self.get(&p.name).ok_or_else(|| {
                    PluginError::NotFound(format!(
                        "{} (已搜索: {})",
                        p.name,
                        self.dirs
                            .iter()
                            .map(|d| d.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                })?;
                Ok(PluginInstance {
                    config: p.clone(),
                    executable: discovered.path.clone(),
                })
            })
            .collect()
    }

    /// 绑定并创建可执行插件
    pub fn load(
        &self,
        config: &RapportConfig,
        only: &[String],
    ) -> Result<Vec<Arc<dyn Plugin>>, PluginError> {
        self.bind(config, only)?
            .into_iter()
            .map(|instance| {
                ExecutablePlugin::new(instance).map(|p| Arc::new(p) as Arc<dyn Plugin>)
            })
            .collect()
    }
}
