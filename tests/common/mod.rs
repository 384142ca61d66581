//! 测试公共模块
//! 提供可编排行为的模拟执行器与目标构造工具

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ops_batch::dispatch::RemoteExecutor;
use ops_batch::{ExecError, ExecutionOutcome, TargetDescriptor};

/// 模拟目标的行为
#[derive(Debug, Clone)]
pub enum Behavior {
    /// 命令正常结束（任意退出码）
    Succeed {
        output: String,
        exit_status: u32,
        delay: Duration,
    },
    /// 失败
    Fail { error: ExecError, delay: Duration },
    /// 远端命令永不返回
    Stall,
    /// 执行任务 panic
    Panic,
}

impl Behavior {
    pub fn ok(output: &str) -> Self {
        Behavior::Succeed {
            output: output.to_string(),
            exit_status: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn exit(output: &str, exit_status: u32) -> Self {
        Behavior::Succeed {
            output: output.to_string(),
            exit_status,
            delay: Duration::ZERO,
        }
    }

    pub fn ok_after(output: &str, delay: Duration) -> Self {
        Behavior::Succeed {
            output: output.to_string(),
            exit_status: 0,
            delay,
        }
    }

    pub fn fail(error: ExecError) -> Self {
        Behavior::Fail {
            error,
            delay: Duration::ZERO,
        }
    }
}

/// 按主机名编排行为的模拟执行器
pub struct ScriptedExecutor {
    behaviors: HashMap<String, Behavior>,
    default: Behavior,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    commands: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(default: Behavior) -> Self {
        Self {
            behaviors: HashMap::new(),
            default,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, host: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(host.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn execute(&self, target: Arc<TargetDescriptor>, command: &str) -> ExecutionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.commands.lock().unwrap().push(command.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let behavior = self
            .behaviors
            .get(&target.host)
            .cloned()
            .unwrap_or_else(|| self.default.clone());

        let outcome = match behavior {
            Behavior::Succeed {
                output,
                exit_status,
                delay,
            } => {
                tokio::time::sleep(delay).await;
                ExecutionOutcome::success(target, &output).with_exit_status(Some(exit_status))
            }
            Behavior::Fail { error, delay } => {
                tokio::time::sleep(delay).await;
                ExecutionOutcome::failure(target, error, "")
            }
            Behavior::Stall => std::future::pending().await,
            Behavior::Panic => panic!("executor crashed for {}", target.host),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// 构造一组目标，主机名依次为给定名称
pub fn targets(hosts: &[&str]) -> Vec<TargetDescriptor> {
    hosts
        .iter()
        .enumerate()
        .map(|(i, host)| TargetDescriptor::with_password(i, *host, "deploy", "secret"))
        .collect()
}

/// 把输出按结果块切分
pub fn blocks(output: &str) -> Vec<String> {
    output
        .split_inclusive("\n---\n")
        .filter(|b| !b.trim().is_empty())
        .map(str::to_string)
        .collect()
}
