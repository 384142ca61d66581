//! Common types shared between the ops-batch dispatcher and its executors

pub mod error;
pub mod execution;
pub mod ssh;

pub use error::ExecError;
pub use execution::{ExecutionOutcome, OutcomeStatus, RunResult};
pub use ssh::{HostKeyVerification, KnownHost, SshAuth, TargetDescriptor};
