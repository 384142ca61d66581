//! 单目标执行错误
//!
//! 这些错误不会向调用方传播，而是被记录在对应目标的 ExecutionOutcome 中

use std::time::Duration;

use crate::execution::OutcomeStatus;

/// 单个目标执行过程中的错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection timed out after {timeout:?}: {target}")]
    Timeout { target: String, timeout: Duration },

    #[error("host key rejected for {0}")]
    HostKeyRejected(String),

    #[error("authentication rejected for {0}")]
    Authentication(String),

    #[error("failed to load private key: {0}")]
    KeyLoad(String),

    #[error("failed to open session: {0}")]
    Session(String),

    #[error("failed to execute command: {0}")]
    Exec(String),

    #[error("channel closed without an exit status")]
    ChannelClosed,

    #[error("command timed out after {0:?}")]
    CommandTimeout(Duration),

    #[error("execution task aborted: {0}")]
    TaskAborted(String),
}

impl ExecError {
    /// 错误对应的结果状态
    pub fn status(&self) -> OutcomeStatus {
        match self {
            ExecError::Connect(_)
            | ExecError::Timeout { .. }
            | ExecError::HostKeyRejected(_)
            | ExecError::Authentication(_)
            | ExecError::KeyLoad(_) => OutcomeStatus::ConnectFailed,
            ExecError::Session(_) => OutcomeStatus::SessionFailed,
            ExecError::Exec(_)
            | ExecError::ChannelClosed
            | ExecError::CommandTimeout(_)
            | ExecError::TaskAborted(_) => OutcomeStatus::CommandFailed,
        }
    }
}
