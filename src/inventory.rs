//! 目标清单加载
//!
//! 从清单文件（默认 servers.yaml）读取目标主机列表，验证后生成有序的 TargetDescriptor

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use secrecy::Secret;
use serde::Deserialize;
use tracing::debug;
use validator::{Validate, ValidationError};

use common::{KnownHost, SshAuth, TargetDescriptor};

use crate::error::{AppError, Result};

/// 清单中的单个服务器条目
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_credentials"))]
pub struct ServerEntry {
    /// 主机地址
    #[validate(length(min = 1, message = "host must not be empty"))]
    pub host: String,

    /// 端口
    #[serde(default = "default_port")]
    #[validate(range(min = 1, message = "port must be between 1 and 65535"))]
    pub port: u16,

    /// 用户名
    #[validate(length(min = 1, message = "user must not be empty"))]
    pub user: String,

    /// 密码（明文存储于清单中，已知的安全弱点）
    #[serde(default, alias = "password")]
    pub credential: Option<Secret<String>>,

    /// 私钥文件路径
    #[serde(default)]
    pub private_key: Option<String>,

    /// 私钥密码
    #[serde(default)]
    pub passphrase: Option<Secret<String>>,
}

fn default_port() -> u16 {
    common::ssh::DEFAULT_SSH_PORT
}

fn validate_credentials(entry: &ServerEntry) -> std::result::Result<(), ValidationError> {
    let has_key = entry.private_key.as_deref().is_some_and(|k| !k.is_empty());
    if entry.credential.is_none() && !has_key {
        let mut error = ValidationError::new("missing_credential");
        error.message = Some("either credential/password or private_key is required".into());
        return Err(error);
    }
    Ok(())
}

impl ServerEntry {
    /// 转换为认证方式；同时配置时优先使用私钥
    fn auth(&self) -> SshAuth {
        match self.private_key.as_deref().filter(|k| !k.is_empty()) {
            Some(path) => SshAuth::KeyFile {
                path: expand_home(path),
                passphrase: self.passphrase.clone(),
            },
            None => SshAuth::Password {
                password: self
                    .credential
                    .clone()
                    .unwrap_or_else(|| Secret::new(String::new())),
            },
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// 目标清单
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct Inventory {
    /// 目标服务器
    #[serde(default)]
    #[validate(nested)]
    pub servers: Vec<ServerEntry>,

    /// 已登记的主机密钥（仅 strict/accept 模式使用）
    #[serde(default)]
    pub known_hosts: Vec<KnownHost>,
}

impl Inventory {
    /// 生成有序的目标列表，保留清单顺序
    pub fn targets(&self) -> Vec<TargetDescriptor> {
        self.servers
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                TargetDescriptor::new(index, entry.host.clone(), entry.user.clone(), entry.auth())
                    .with_port(entry.port)
            })
            .collect()
    }

    /// `host:port -> fingerprint` 映射
    pub fn known_hosts_map(&self) -> HashMap<String, String> {
        KnownHost::to_map(&self.known_hosts)
    }
}

/// 根据扩展名推断文件格式，默认 YAML
fn file_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => FileFormat::Json,
        Some("toml") => FileFormat::Toml,
        _ => FileFormat::Yaml,
    }
}

/// 从文件加载并验证清单
pub fn load_inventory(path: impl AsRef<Path>) -> Result<Inventory> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(AppError::Inventory(format!(
            "inventory file not found: {}",
            path.display()
        )));
    }

    let inventory: Inventory = Config::builder()
        .add_source(File::from(path).format(file_format(path)).required(true))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| AppError::Inventory(format!("{}: {}", path.display(), e)))?;

    inventory.validate()?;

    debug!(
        path = %path.display(),
        servers = inventory.servers.len(),
        known_hosts = inventory.known_hosts.len(),
        "Inventory loaded"
    );

    Ok(inventory)
}

/// 从 YAML 字符串解析并验证清单
pub fn parse_inventory(content: &str) -> Result<Inventory> {
    let inventory: Inventory = Config::builder()
        .add_source(File::from_str(content, FileFormat::Yaml))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| AppError::Inventory(e.to_string()))?;

    inventory.validate()?;
    Ok(inventory)
}
