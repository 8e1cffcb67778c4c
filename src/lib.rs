//! rapport - 工作报告生成工具
//!
//! 插件并行收集一段时间内的工作数据，结果经模板渲染后写入以日期命名的报告目录。

// CLI 定义
pub mod cli;

// 配置
pub mod config;

// 报告核心
pub mod core;

pub mod email;
pub mod error;

// 插件系统
pub mod plugin;

// 模板引擎
pub mod template;

pub mod timeframe;
pub mod types;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

// 重新导出常用类型
pub use error::{RapportError, Result};
