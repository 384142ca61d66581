//! 命令分发模块
//!
//! 为每个目标启动一个独立任务执行同一条命令，等待全部完成后返回。
//! 执行器从不返回错误，因此分发器本身不包含任何按任务的错误处理逻辑，
//! 只负责并发编排和完成跟踪。

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

use common::{ExecError, ExecutionOutcome, OutcomeStatus, RunResult, TargetDescriptor};

use crate::concurrency::ConcurrencyLimiter;
use crate::telemetry;

/// 远程执行器
///
/// 实现必须把所有失败记录在返回的 ExecutionOutcome 中，不得 panic 或返回错误。
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, target: Arc<TargetDescriptor>, command: &str) -> ExecutionOutcome;
}

/// 命令分发器
pub struct Dispatcher {
    executor: Arc<dyn RemoteExecutor>,
    limiter: ConcurrencyLimiter,
}

impl Dispatcher {
    /// 创建分发器，默认不限制并发
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            executor,
            limiter: ConcurrencyLimiter::unbounded(),
        }
    }

    /// 设置并发上限
    pub fn with_limiter(mut self, limiter: ConcurrencyLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// 对全部目标执行命令，按完成顺序回调 `on_outcome`，全部完成后返回
    ///
    /// 没有提前退出，也没有整体超时：某个目标的命令一直不返回时，本方法也不会返回。
    pub async fn dispatch<F>(
        &self,
        targets: Vec<TargetDescriptor>,
        command: &str,
        mut on_outcome: F,
    ) -> RunResult
    where
        F: FnMut(&ExecutionOutcome),
    {
        let batch_id = Uuid::new_v4();
        let total = targets.len();
        let span = info_span!("batch", batch_id = %batch_id, targets = total);

        async move {
            let command: Arc<str> = Arc::from(command);
            let mut pending = FuturesUnordered::new();

            for target in targets {
                let target = Arc::new(target);
                let task_target = target.clone();
                let executor = self.executor.clone();
                let limiter = self.limiter.clone();
                let command = command.clone();

                let handle = tokio::spawn(
                    async move {
                        let _permit = limiter.acquire().await;
                        executor.execute(task_target, &command).await
                    }
                    .in_current_span(),
                );

                pending.push(async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(host = %target.host, error = %e, "Execution task aborted");
                            ExecutionOutcome::failure(target, ExecError::TaskAborted(e.to_string()), "")
                        }
                    }
                });
            }

            debug!(
                targets = total,
                max_concurrency = ?self.limiter.limit(),
                "Batch dispatched"
            );

            let mut result = RunResult::default();
            while let Some(outcome) = pending.next().await {
                telemetry::record_outcome(&outcome);
                on_outcome(&outcome);
                result.push(outcome);
            }

            debug!(
                targets = total,
                succeeded = result.count(OutcomeStatus::Success),
                connect_failed = result.count(OutcomeStatus::ConnectFailed),
                session_failed = result.count(OutcomeStatus::SessionFailed),
                command_failed = result.count(OutcomeStatus::CommandFailed),
                "Batch complete"
            );

            result
        }
        .instrument(span)
        .await
    }
}
