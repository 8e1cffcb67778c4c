//! 报告核心：并行收集、报告生成与存储

pub mod collector;
pub mod report;
pub mod store;

pub use collector::{Collected, collect_all};
pub use report::{CreatedReport, PluginOutput, ReportOptions, create_report, edit_report};
pub use store::{Report, ReportStore};
