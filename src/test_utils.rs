//! 测试工具模块
//!
//! 环境变量守卫、伪造插件脚本和固定时间范围，供各模块单元测试共用

use crate::timeframe::{Timeframe, TimeframeKind};
use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// 环境变量守卫 - 释放时恢复被修改过的变量
#[derive(Default)]
pub struct EnvGuard {
    touched: RefCell<HashMap<String, Option<String>>>,
}

impl EnvGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn remember(&self, key: &str) {
        self.touched
            .borrow_mut()
            .entry(key.to_string())
            .or_insert_with(|| env::var(key).ok());
    }

    /// 设置测试环境变量（自动包装为 unsafe）
    pub fn set_var(&self, key: &str, value: &str) {
        self.remember(key);
        unsafe {
            env::set_var(key, value);
        }
    }

    /// 移除环境变量（自动包装为 unsafe）
    pub fn remove_var(&self, key: &str) {
        self.remember(key);
        unsafe {
            env::remove_var(key);
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, original) in self.touched.borrow().iter() {
            unsafe {
                match original {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

/// 2026-10-12 (周一) 00:00 到 2026-10-16 17:30:00 的固定时间范围
pub fn fixed_timeframe() -> Timeframe {
    let now = NaiveDate::from_ymd_opt(2026, 10, 16)
        .and_then(|d| d.and_hms_opt(17, 30, 0))
        .unwrap();
    Timeframe::resolve(TimeframeKind::CurrentWeek, now).unwrap()
}

/// 在目录中写入一个可执行的 shell 插件脚本
#[cfg(unix)]
pub fn write_script_plugin(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_guard_restores_removed_and_added() {
        unsafe {
            env::set_var("RAPPORT_GUARD_KEEP", "original");
        }
        {
            let guard = EnvGuard::new();
            guard.set_var("RAPPORT_GUARD_KEEP", "changed");
            guard.set_var("RAPPORT_GUARD_NEW", "temp");
            assert_eq!(env::var("RAPPORT_GUARD_KEEP").unwrap(), "changed");
        }
        assert_eq!(env::var("RAPPORT_GUARD_KEEP").unwrap(), "original");
        assert!(env::var("RAPPORT_GUARD_NEW").is_err());
        unsafe {
            env::remove_var("RAPPORT_GUARD_KEEP");
        }
    }

    #[test]
    fn test_fixed_timeframe() {
        let tf = fixed_timeframe();
        assert_eq!(tf.report_name(), "2026-10-16T17:30:00");
    }
}
