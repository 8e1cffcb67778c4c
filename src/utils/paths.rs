//! 跨平台路径处理工具 (传统原则：常识性接口设计)
//!
//! 目录布局：
//! - 用户配置：`~/.rapport/rapport.toml`
//! - 插件：`~/.rapport/plugins`、`$XDG_CONFIG_HOME/rapport/plugins` 等
//! - 报告数据：`$XDG_DATA_HOME/rapport/reports/<报告名>`

use crate::error::{RapportError, Result};
use std::path::{Path, PathBuf};

/// 读取非空环境变量
fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// 获取用户主目录
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| RapportError::DirMissing("无法找到用户主目录".to_string()))
}

/// 获取用户配置目录：~/.rapport
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join(".rapport"))
}

/// 获取默认配置文件路径
pub fn get_config_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("rapport.toml"))
}

/// XDG 配置目录：$XDG_CONFIG_HOME/rapport，缺省为 ~/.config/rapport
pub fn get_xdg_config_dir() -> Result<PathBuf> {
    let base = match env_non_empty("XDG_CONFIG_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => home_dir()?.join(".config"),
    };
    Ok(base.join("rapport"))
}

/// 用户数据目录：$XDG_DATA_HOME/rapport，缺省为 ~/.local/share/rapport
pub fn get_data_dir() -> Result<PathBuf> {
    let base = match env_non_empty("XDG_DATA_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => home_dir()?.join(".local").join("share"),
    };
    Ok(base.join("rapport"))
}

/// 报告根目录
pub fn get_reports_dir() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("reports"))
}

/// 插件搜索目录（按优先级排列）
pub fn get_plugin_dirs() -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();

    if let Some(extra) = std::env::var_os("RAPPORT_PLUGIN_PATH") {
        dirs.extend(std::env::split_paths(&extra).filter(|p| !p.as_os_str().is_empty()));
    }

    dirs.push(get_config_dir()?.join("plugins"));
    dirs.push(get_xdg_config_dir()?.join("plugins"));

    // 随程序安装的插件：<bin>/../share/rapport/plugins
    if let Some(bin_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(bin_dir.join("..").join("share").join("rapport").join("plugins"));
    }

    dedup_keep_order(&mut dirs);
    Ok(dirs)
}

/// 模板搜索目录（按优先级排列）
pub fn get_template_dirs() -> Result<Vec<PathBuf>> {
    let mut dirs = vec![
        get_config_dir()?.join("templates"),
        get_xdg_config_dir()?.join("templates"),
    ];
    dedup_keep_order(&mut dirs);
    Ok(dirs)
}

fn dedup_keep_order(dirs: &mut Vec<PathBuf>) {
    let mut seen = std::collections::HashSet::new();
    dirs.retain(|d| seen.insert(d.clone()));
}

/// 检查文件是否存在
pub fn file_exists(path: &Path) -> bool {
    path.exists() && path.is_file()
}

/// 读取文件内容，返回错误时提供详细信息
pub fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(RapportError::FileNotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|e| {
        RapportError::Io(std::io::Error::new(
            e.kind(),
            format!("读取文件 {} 失败: {}", path.display(), e),
        ))
    })
}

/// 安全写入文件 (使用临时文件 + 原子替换)
pub fn write_file_safe(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    std::fs::write(&temp_path, content)?;

    std::fs::rename(&temp_path, path)?;

    Ok(())
}
