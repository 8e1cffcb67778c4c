//! 时间范围
//!
//! 报告覆盖的时间段。所有时间均为本地无时区时间，精确到秒。

use crate::error::{RapportError, Result};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde_json::{Value, json};
use std::fmt;

/// 报告名与插件协议使用的时间格式 (ISO 8601)
pub const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// recent_days 的默认天数
pub const DEFAULT_RECENT_DAYS: u32 = 14;

/// 时间范围类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeframeKind {
    /// 本周一 00:00 至今
    CurrentWeek,
    /// 上周一 00:00 至上周日 23:59:59
    LastWeek,
    /// 本月 1 日 00:00 至今
    CurrentMonth,
    /// 最近 N 天至今
    RecentDays(u32),
    /// 今天 00:00 至今
    Today,
}

impl TimeframeKind {
    /// 所有可用的时间范围名称
    pub const NAMES: [&'static str; 5] = [
        "current_week",
        "last_week",
        "current_month",
        "recent_days",
        "today",
    ];

    /// 从名称解析，`recent_days` 可写作 `recent_days:7`
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        let (base, days) = match name.split_once(':') {
            Some((base, days)) => {
                let days = days
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|d| *d > 0)
                    .ok_or_else(|| RapportError::UnknownTimeframe(name.to_string()))?;
                (base.trim(), Some(days))
            }
            None => (name, None),
        };

        let kind = match (base.to_lowercase().as_str(), days) {
            ("current_week", None) => TimeframeKind::CurrentWeek,
            ("last_week", None) => TimeframeKind::LastWeek,
            ("current_month", None) => TimeframeKind::CurrentMonth,
            ("today", None) => TimeframeKind::Today,
            ("recent_days", d) => TimeframeKind::RecentDays(d.unwrap_or(DEFAULT_RECENT_DAYS)),
            _ => return Err(RapportError::UnknownTimeframe(name.to_string())),
        };
        Ok(kind)
    }

    /// 替换 recent_days 的天数，其余类型不变
    pub fn with_days(self, days: u32) -> Self {
        match self {
            TimeframeKind::RecentDays(_) => TimeframeKind::RecentDays(days),
            other => other,
        }
    }

    /// 命令行显式指定天数：只允许用于 recent_days，且必须大于 0
    pub fn override_days(self, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(RapportError::InvalidArgument("--days 必须大于 0".to_string()));
        }
        match self {
            TimeframeKind::RecentDays(_) => Ok(TimeframeKind::RecentDays(days)),
            other => Err(RapportError::InvalidArgument(format!(
                "--days 只适用于 recent_days，当前时间范围为 {}",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimeframeKind::CurrentWeek => "current_week",
            TimeframeKind::LastWeek => "last_week",
            TimeframeKind::CurrentMonth => "current_month",
            TimeframeKind::RecentDays(_) => "recent_days",
            TimeframeKind::Today => "today",
        }
    }

    /// 简短说明（用于 `rapport timeframes`）
    pub fn describe(&self) -> String {
        match self {
            TimeframeKind::CurrentWeek => "本周一 00:00 至今".to_string(),
            TimeframeKind::LastWeek => "上周一 00:00 至上周日 23:59:59".to_string(),
            TimeframeKind::CurrentMonth => "本月 1 日 00:00 至今".to_string(),
            TimeframeKind::RecentDays(days) => format!("最近 {} 天至今", days),
            TimeframeKind::Today => "今天 00:00 至今".to_string(),
        }
    }
}

impl fmt::Display for TimeframeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeframeKind::RecentDays(days) => write!(f, "recent_days:{}", days),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// 具体的时间范围
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeframe {
    pub kind: TimeframeKind,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

impl Timeframe {
    /// 以给定的当前时间计算时间范围
    ///
    /// 天数过大、起点超出可表示的日期时返回错误。
    pub fn resolve(kind: TimeframeKind, now: NaiveDateTime) -> Result<Self> {
        let now = now.with_nanosecond(0).unwrap_or(now);
        let out_of_range = || {
            RapportError::InvalidArgument(format!("时间范围 {} 超出可表示的日期", kind))
        };
        let days_before = |at: NaiveDateTime, days: i64| {
            Duration::try_days(days)
                .and_then(|d| at.checked_sub_signed(d))
                .ok_or_else(out_of_range)
        };

        let today = midnight(now.date());
        let this_monday = days_before(
            today,
            i64::from(now.date().weekday().num_days_from_monday()),
        )?;

        let (start, end) = match kind {
            TimeframeKind::CurrentWeek => (this_monday, now),
            TimeframeKind::LastWeek => (
                days_before(this_monday, 7)?,
                this_monday - Duration::seconds(1),
            ),
            TimeframeKind::CurrentMonth => {
                let first = now.date().with_day(1).unwrap_or(now.date());
                (midnight(first), now)
            }
            TimeframeKind::RecentDays(days) => (days_before(now, i64::from(days))?, now),
            TimeframeKind::Today => (today, now),
        };

        Ok(Self { kind, start, end })
    }

    /// 以本地当前时间计算
    pub fn now(kind: TimeframeKind) -> Result<Self> {
        Self::resolve(kind, Local::now().naive_local())
    }

    /// 时间点是否落在范围内（两端闭区间）
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at <= self.end
    }

    /// 报告名称：结束时间的 ISO 8601 表示
    pub fn report_name(&self) -> String {
        self.end.format(ISO8601_FORMAT).to_string()
    }

    /// 插件协议与模板上下文中的表示
    pub fn to_json(&self) -> Value {
        json!({
            "kind": self.kind.name(),
            "start": self.start.format(ISO8601_FORMAT).to_string(),
            "end": self.end.format(ISO8601_FORMAT).to_string(),
        })
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} .. {})",
            self.kind,
            self.start.format(ISO8601_FORMAT),
            self.end.format(ISO8601_FORMAT)
        )
    }
}
