//! SSH执行模块
//! 单目标连接管理和命令执行

pub mod executor;

pub use executor::{fingerprint, HostKeyHandler, SshExecutor, SshSettings};
