//! 配置系统
//! 从环境变量加载运行参数（前缀 OPS_），命令行参数可覆盖

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

use common::HostKeyVerification;

use crate::error::Result as AppResult;
use crate::output::OutputFormat;

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: compact, pretty, json
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    /// 目标清单文件路径
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    /// 连接超时（秒），覆盖 TCP 连接、握手与认证
    pub connect_timeout_secs: u64,
    /// 命令执行超时（秒），未设置表示不限制
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
    /// 主机密钥验证策略（disabled/accept/strict）
    pub host_key_verification: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// 最大并发连接数（0 表示不限制）
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// 输出格式（text/json）
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub inventory: InventoryConfig,
    pub ssh: SshConfig,
    pub dispatch: DispatchConfig,
    pub output: OutputConfig,
}

/// 命令行覆盖项
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub inventory_path: Option<String>,
    pub max_concurrency: Option<usize>,
    pub connect_timeout_secs: Option<u64>,
    pub command_timeout_secs: Option<u64>,
    pub host_key_verification: Option<String>,
    pub output_format: Option<String>,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("logging.level", "warn")?
            .set_default("logging.format", "compact")?
            .set_default("inventory.path", "servers.yaml")?
            .set_default("ssh.connect_timeout_secs", 10)?
            .set_default("ssh.host_key_verification", "disabled")?
            .set_default("dispatch.max_concurrency", 0)?
            .set_default("output.format", "text")?;

        // 从环境变量加载配置（前缀为 OPS_）
        settings = settings.add_source(
            Environment::with_prefix("OPS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 加载环境配置并应用命令行覆盖项
    pub fn load(overrides: Overrides) -> AppResult<Self> {
        Ok(Self::from_env()?.apply(overrides)?)
    }

    /// 应用命令行覆盖项并重新验证
    pub fn apply(mut self, overrides: Overrides) -> Result<Self, ConfigError> {
        if let Some(path) = overrides.inventory_path {
            self.inventory.path = path;
        }
        if let Some(limit) = overrides.max_concurrency {
            self.dispatch.max_concurrency = limit;
        }
        if let Some(secs) = overrides.connect_timeout_secs {
            self.ssh.connect_timeout_secs = secs;
        }
        if let Some(secs) = overrides.command_timeout_secs {
            self.ssh.command_timeout_secs = Some(secs);
        }
        if let Some(mode) = overrides.host_key_verification {
            self.ssh.host_key_verification = mode;
        }
        if let Some(format) = overrides.output_format {
            self.output.format = format;
        }

        self.validate()?;
        Ok(self)
    }

    /// 验证配置合法性
    fn validate(&self) -> Result<(), ConfigError> {
        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "compact" | "pretty" | "json" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: compact, pretty, json",
                    self.logging.format
                )))
            }
        }

        if self.ssh.connect_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "ssh.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.ssh.command_timeout_secs == Some(0) {
            return Err(ConfigError::Message(
                "ssh.command_timeout_secs must be greater than 0 when set".to_string(),
            ));
        }

        self.ssh
            .host_key_verification
            .parse::<HostKeyVerification>()
            .map_err(ConfigError::Message)?;

        self.output.format.parse::<OutputFormat>().map_err(ConfigError::Message)?;

        Ok(())
    }

    /// 主机密钥验证策略（已在 validate 中校验）
    pub fn host_key_verification(&self) -> HostKeyVerification {
        self.ssh.host_key_verification.parse().unwrap_or_default()
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output.format.parse().unwrap_or_default()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.ssh.command_timeout_secs.map(Duration::from_secs)
    }

    /// 并发上限，None 表示不限制
    pub fn max_concurrency(&self) -> Option<usize> {
        match self.dispatch.max_concurrency {
            0 => None,
            n => Some(n),
        }
    }
}
