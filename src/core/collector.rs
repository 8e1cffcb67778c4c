//! 并行收集
//!
//! 固定数量的工作线程从共享游标领取插件，完成的结果通过通道按完成顺序回传。

use crate::plugin::{Plugin, PluginError};
use crate::timeframe::Timeframe;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

/// 单个插件的收集结果
#[derive(Debug)]
pub struct Collected {
    /// 插件在输入中的位置
    pub index: usize,
    pub result: Result<Value, PluginError>,
}

/// 并行执行所有插件的 collect，返回值按完成顺序排列
pub fn collect_all(
    plugins: &[Arc<dyn Plugin>],
    timeframe: &Timeframe,
    max_workers: usize,
) -> Vec<Collected> {
    if plugins.is_empty() {
        return vec![];
    }

    let workers = max_workers.clamp(1, plugins.len());
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    tracing::debug!("使用 {} 个线程收集 {} 个插件", workers, plugins.len());

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            scope.spawn(move || {
                loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(plugin) = plugins.get(index) else {
                        break;
                    };
                    let result = run_one(plugin.as_ref(), timeframe);
                    if tx.send(Collected { index, result }).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);
        rx.iter().collect()
    })
}

fn run_one(plugin: &dyn Plugin, timeframe: &Timeframe) -> Result<Value, PluginError> {
    tracing::info!("收集 {} ({})", plugin.alias(), plugin.name());
    match catch_unwind(AssertUnwindSafe(|| plugin.collect(timeframe))) {
        Ok(result) => result,
        Err(_) => Err(PluginError::ExecutionFailed(format!(
            "{} 在收集时 panic",
            plugin.alias()
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::test_utils::fixed_timeframe;
    use std::sync::Mutex;
    use std::time::Duration;

    /// 进程内插件，用于测试
    pub(crate) struct FakePlugin {
        pub name: String,
        pub alias: String,
        pub delay: Duration,
        pub outcome: Result<Value, String>,
        pub panic: bool,
    }

    impl FakePlugin {
        pub(crate) fn ok(alias: &str, value: Value) -> Self {
            Self {
                name: "fake".to_string(),
                alias: alias.to_string(),
                delay: Duration::ZERO,
                outcome: Ok(value),
                panic: false,
            }
        }

        pub(crate) fn failing(alias: &str, message: &str) -> Self {
            Self {
                outcome: Err(message.to_string()),
                ..Self::ok(alias, Value::Null)
            }
        }

        pub(crate) fn named(mut self, name: &str) -> Self {
            self.name = name.to_string();
            self
        }

        pub(crate) fn delayed(mut self, millis: u64) -> Self {
            self.delay = Duration::from_millis(millis);
            self
        }
    }

    impl Plugin for FakePlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn alias(&self) -> &str {
            &self.alias
        }

        fn collect(&self, _timeframe: &Timeframe) -> Result<Value, PluginError> {
            std::thread::sleep(self.delay);
            if self.panic {
                panic!("fake plugin panic");
            }
            self.outcome.clone().map_err(PluginError::Reported)
        }
    }

    /// 记录并发峰值的插件
    struct CountingPlugin {
        active: Arc<Mutex<(usize, usize)>>,
    }

    impl Plugin for CountingPlugin {
        fn name(&self) -> &str {
            "counting"
        }

        fn alias(&self) -> &str {
            "counting"
        }

        fn collect(&self, _timeframe: &Timeframe) -> Result<Value, PluginError> {
            {
                let mut guard = self.active.lock().unwrap();
                guard.0 += 1;
                guard.1 = guard.1.max(guard.0);
            }
            std::thread::sleep(Duration::from_millis(30));
            self.active.lock().unwrap().0 -= 1;
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(collect_all(&[], &fixed_timeframe(), 4).is_empty());
    }

    #[test]
    fn test_completion_order() {
        let plugins: Vec<Arc<dyn Plugin>> = vec![
            Arc::new(FakePlugin::ok("slow", Value::from(1)).delayed(200)),
            Arc::new(FakePlugin::ok("fast", Value::from(2))),
        ];

        let collected = collect_all(&plugins, &fixed_timeframe(), 4);

        let order: Vec<_> = collected.iter().map(|c| c.index).collect();
        assert_eq!(order, vec![1, 0]);
        assert_eq!(collected[1].result.as_ref().unwrap(), &Value::from(1));
    }

    #[test]
    fn test_worker_limit_respected() {
        let active = Arc::new(Mutex::new((0, 0)));
        let plugins: Vec<Arc<dyn Plugin>> = (0..6)
            .map(|_| {
                Arc::new(CountingPlugin {
                    active: active.clone(),
                }) as Arc<dyn Plugin>
            })
            .collect();

        let collected = collect_all(&plugins, &fixed_timeframe(), 2);

        assert_eq!(collected.len(), 6);
        assert!(active.lock().unwrap().1 <= 2);
    }

    #[test]
    fn test_failure_and_panic_are_isolated() {
        let mut panicking = FakePlugin::ok("boom", Value::Null);
        panicking.panic = true;
        let plugins: Vec<Arc<dyn Plugin>> = vec![
            Arc::new(FakePlugin::ok("good", Value::from("ok"))),
            Arc::new(FakePlugin::failing("bad", "denied")),
            Arc::new(panicking),
        ];

        let mut collected = collect_all(&plugins, &fixed_timeframe(), 1);
        collected.sort_by_key(|c| c.index);

        assert!(collected[0].result.is_ok());
        assert!(matches!(collected[1].result, Err(PluginError::Reported(_))));
        assert!(matches!(collected[2].result, Err(PluginError::ExecutionFailed(_))));
    }
}
