//! 批量远程命令执行
//! 对清单中的每台主机并行执行同一条命令，逐台隔离失败并输出结果

pub mod batch;
pub mod cli;
pub mod concurrency;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod inventory;
pub mod output;
pub mod ssh;
pub mod telemetry;

pub use common::{ExecError, ExecutionOutcome, OutcomeStatus, RunResult, TargetDescriptor};
