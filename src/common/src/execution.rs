//! 统一执行结果模型
//!
//! 每个目标恰好产生一个 ExecutionOutcome，一次批量执行的全部结果汇总为 RunResult

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExecError;
use crate::ssh::TargetDescriptor;

/// 单个目标的执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// 已建立连接（中间状态，不会出现在返回的结果中）
    Connected,
    /// 连接或认证失败
    ConnectFailed,
    /// 连接成功但打开会话失败
    SessionFailed,
    /// 命令通道传输层失败
    CommandFailed,
    /// 命令已执行完毕（不区分远端退出码）
    Success,
}

impl OutcomeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Connected => "connected",
            OutcomeStatus::ConnectFailed => "connect_failed",
            OutcomeStatus::SessionFailed => "session_failed",
            OutcomeStatus::CommandFailed => "command_failed",
            OutcomeStatus::Success => "success",
        }
    }

    /// 报告中使用的状态标记
    pub fn marker(&self) -> &'static str {
        match self {
            OutcomeStatus::Connected => "Connected",
            OutcomeStatus::ConnectFailed => "Connect Failed",
            OutcomeStatus::SessionFailed => "Session Failed",
            OutcomeStatus::CommandFailed => "Command Failed",
            OutcomeStatus::Success => "OK",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个目标的最终执行结果
///
/// 创建后不可变；`error` 当且仅当状态不是 `Success` 时存在。
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    target: Arc<TargetDescriptor>,
    status: OutcomeStatus,
    output: String,
    error: Option<ExecError>,
    exit_status: Option<u32>,
    exit_signal: Option<String>,
    started_at: DateTime<Utc>,
    duration_secs: f64,
}

impl ExecutionOutcome {
    /// 创建成功结果（远端退出码不影响状态）
    pub fn success(target: Arc<TargetDescriptor>, output: &str) -> Self {
        Self {
            target,
            status: OutcomeStatus::Success,
            output: output.trim().to_string(),
            error: None,
            exit_status: None,
            exit_signal: None,
            started_at: Utc::now(),
            duration_secs: 0.0,
        }
    }

    /// 创建失败结果，状态由错误类型决定
    pub fn failure(target: Arc<TargetDescriptor>, error: ExecError, output: &str) -> Self {
        Self {
            target,
            status: error.status(),
            output: output.trim().to_string(),
            error: Some(error),
            exit_status: None,
            exit_signal: None,
            started_at: Utc::now(),
            duration_secs: 0.0,
        }
    }

    pub fn with_exit_status(mut self, exit_status: Option<u32>) -> Self {
        self.exit_status = exit_status;
        self
    }

    pub fn with_exit_signal(mut self, exit_signal: Option<String>) -> Self {
        self.exit_signal = exit_signal;
        self
    }

    /// 记录开始时间与耗时
    pub fn with_timing(mut self, started_at: DateTime<Utc>, duration_secs: f64) -> Self {
        self.started_at = started_at;
        self.duration_secs = duration_secs;
        self
    }

    pub fn target(&self) -> &TargetDescriptor {
        &self.target
    }

    pub fn host(&self) -> &str {
        &self.target.host
    }

    pub fn status(&self) -> OutcomeStatus {
        self.status
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn error(&self) -> Option<&ExecError> {
        self.error.as_ref()
    }

    pub fn exit_status(&self) -> Option<u32> {
        self.exit_status
    }

    pub fn exit_signal(&self) -> Option<&str> {
        self.exit_signal.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// 一次批量执行的全部结果（按到达顺序）
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    outcomes: Vec<ExecutionOutcome>,
}

impl RunResult {
    pub fn new(outcomes: Vec<ExecutionOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn push(&mut self, outcome: ExecutionOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionOutcome> {
        self.outcomes.iter()
    }

    pub fn outcomes(&self) -> &[ExecutionOutcome] {
        &self.outcomes
    }

    /// 指定状态的结果数量
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status() == status).count()
    }

    /// 按清单顺序排列的结果
    pub fn sorted_by_target(&self) -> Vec<&ExecutionOutcome> {
        let mut sorted: Vec<&ExecutionOutcome> = self.outcomes.iter().collect();
        sorted.sort_by_key(|o| o.target().index);
        sorted
    }

    /// 检查结果集是否与提交的目标一一对应
    pub fn covers(&self, targets: &[TargetDescriptor]) -> bool {
        if self.outcomes.len() != targets.len() {
            return false;
        }
        let mut seen: Vec<usize> = self.outcomes.iter().map(|o| o.target().index).collect();
        let mut expected: Vec<usize> = targets.iter().map(|t| t.index).collect();
        seen.sort_unstable();
        expected.sort_unstable();
        seen == expected
    }
}

impl IntoIterator for RunResult {
    type Item = ExecutionOutcome;
    type IntoIter = std::vec::IntoIter<ExecutionOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(index: usize, host: &str) -> Arc<TargetDescriptor> {
        Arc::new(TargetDescriptor::with_password(index, host, "root", "pw"))
    }

    #[test]
    fn test_success_trims_output_and_has_no_error() {
        let outcome = ExecutionOutcome::success(target(0, "a"), "\n  web-01\n\n");
        assert_eq!(outcome.status(), OutcomeStatus::Success);
        assert_eq!(outcome.output(), "web-01");
        assert!(outcome.error().is_none());
        assert!(outcome.is_success());
    }

    #[test]
    fn test_failure_status_follows_error() {
        let outcome = ExecutionOutcome::failure(
            target(0, "a"),
            ExecError::Session("administratively prohibited".to_string()),
            "",
        );
        assert_eq!(outcome.status(), OutcomeStatus::SessionFailed);
        assert!(outcome.error().is_some());
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_exit_status_does_not_change_status() {
        let outcome =
            ExecutionOutcome::success(target(0, "a"), "no such file").with_exit_status(Some(1));
        assert_eq!(outcome.status(), OutcomeStatus::Success);
        assert_eq!(outcome.exit_status(), Some(1));
    }

    #[test]
    fn test_status_serialization() {
        let cases = vec![
            (OutcomeStatus::Connected, "connected"),
            (OutcomeStatus::ConnectFailed, "connect_failed"),
            (OutcomeStatus::SessionFailed, "session_failed"),
            (OutcomeStatus::CommandFailed, "command_failed"),
            (OutcomeStatus::Success, "success"),
        ];

        for (status, expected) in cases {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", expected));
            assert_eq!(status.as_str(), expected);
        }
    }

    #[test]
    fn test_run_result_covers_targets() {
        let targets: Vec<TargetDescriptor> = (0..3)
            .map(|i| TargetDescriptor::with_password(i, format!("h{}", i), "u", "p"))
            .collect();

        let mut result = RunResult::default();
        for t in targets.iter().rev() {
            result.push(ExecutionOutcome::success(Arc::new(t.clone()), "ok"));
        }
        assert!(result.covers(&targets));
        assert_eq!(result.count(OutcomeStatus::Success), 3);

        let order: Vec<usize> = result.sorted_by_target().iter().map(|o| o.target().index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_run_result_detects_duplicates() {
        let targets: Vec<TargetDescriptor> = (0..2)
            .map(|i| TargetDescriptor::with_password(i, format!("h{}", i), "u", "p"))
            .collect();

        let first = Arc::new(targets[0].clone());
        let result = RunResult::new(vec![
            ExecutionOutcome::success(first.clone(), ""),
            ExecutionOutcome::success(first, ""),
        ]);
        assert!(!result.covers(&targets));
    }
}
