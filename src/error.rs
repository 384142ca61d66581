//! 统一错误模型
//! 批量执行开始之前的致命错误；单个目标的失败见 `common::ExecError`

use thiserror::Error;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Inventory error: {0}")]
    Inventory(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// 进程退出码（批量执行开始前的错误）
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

/// 从 validator::ValidationErrors 转换
impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}
