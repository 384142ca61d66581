//! SSH 目标模型
//!
//! 批量执行的目标描述、认证方式以及主机密钥验证策略

use secrecy::Secret;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// 默认 SSH 端口
pub const DEFAULT_SSH_PORT: u16 = 22;

/// 主机密钥验证策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// 严格模式：只接受 known_hosts 中已登记的主机密钥
    Strict,
    /// 接受模式：未登记的主机直接接受，已登记的必须匹配
    Accept,
    /// 禁用验证：无条件信任远端身份（不安全）
    #[default]
    Disabled,
}

impl HostKeyVerification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Accept => "accept",
            Self::Disabled => "disabled",
        }
    }
}

impl std::str::FromStr for HostKeyVerification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "accept" => Ok(Self::Accept),
            "disabled" | "none" | "false" => Ok(Self::Disabled),
            _ => Err(format!("Unknown host key verification mode: {}", s)),
        }
    }
}

impl std::fmt::Display for HostKeyVerification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SSH 认证方式
///
/// 对调度器来说是不透明的凭据，只有执行器会读取其内容。
#[derive(Debug, Clone)]
pub enum SshAuth {
    /// 密码认证
    Password { password: Secret<String> },
    /// 私钥文件认证
    KeyFile {
        /// 私钥文件路径
        path: PathBuf,
        /// 私钥密码（如果有）
        passphrase: Option<Secret<String>>,
    },
}

impl SshAuth {
    /// 认证方式名称（用于日志，不含敏感信息）
    pub fn method(&self) -> &'static str {
        match self {
            SshAuth::Password { .. } => "password",
            SshAuth::KeyFile { .. } => "publickey",
        }
    }
}

/// 批量执行的单个目标主机
///
/// 由清单加载器创建，之后只读。
#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    /// 在清单中的位置
    pub index: usize,
    /// 主机地址
    pub host: String,
    /// 端口
    pub port: u16,
    /// 用户名
    pub user: String,
    /// 认证凭据
    pub auth: SshAuth,
}

impl TargetDescriptor {
    pub fn new(index: usize, host: impl Into<String>, user: impl Into<String>, auth: SshAuth) -> Self {
        Self {
            index,
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            user: user.into(),
            auth,
        }
    }

    /// 创建使用密码认证的目标
    pub fn with_password(
        index: usize,
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(
            index,
            host,
            user,
            SshAuth::Password {
                password: Secret::new(password.into()),
            },
        )
    }

    /// 设置端口
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `host:port` 形式的地址，也是 known_hosts 的键
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 获取目标地址字符串
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

/// 已登记的主机密钥
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownHost {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// 公钥 base64 编码的 SHA-256 指纹（十六进制）
    pub fingerprint: String,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl KnownHost {
    /// 将登记列表转换为 `host:port -> fingerprint` 映射
    pub fn to_map(entries: &[KnownHost]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|e| (format!("{}:{}", e.host, e.port), e.fingerprint.to_lowercase()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_host_key_verification_default_is_disabled() {
        assert_eq!(HostKeyVerification::default(), HostKeyVerification::Disabled);
    }

    #[test]
    fn test_host_key_verification_from_str() {
        assert_eq!("strict".parse::<HostKeyVerification>().unwrap(), HostKeyVerification::Strict);
        assert_eq!("ACCEPT".parse::<HostKeyVerification>().unwrap(), HostKeyVerification::Accept);
        assert_eq!(
            "disabled".parse::<HostKeyVerification>().unwrap(),
            HostKeyVerification::Disabled
        );
        assert_eq!("none".parse::<HostKeyVerification>().unwrap(), HostKeyVerification::Disabled);
        assert!("trust-me".parse::<HostKeyVerification>().is_err());
    }

    #[test]
    fn test_target_with_password() {
        let target = TargetDescriptor::with_password(0, "example.com", "root", "pass");
        assert_eq!(target.port, 22);
        assert_eq!(target.target(), "root@example.com:22");
        match &target.auth {
            SshAuth::Password { password } => assert_eq!(password.expose_secret(), "pass"),
            _ => panic!("Expected password auth"),
        }
    }

    #[test]
    fn test_target_address_with_port() {
        let target = TargetDescriptor::with_password(3, "10.0.0.5", "admin", "x").with_port(2222);
        assert_eq!(target.address(), "10.0.0.5:2222");
        assert_eq!(target.index, 3);
    }

    #[test]
    fn test_debug_does_not_leak_password() {
        let target = TargetDescriptor::with_password(0, "host", "user", "hunter2");
        let debug = format!("{:?}", target);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_known_host_map() {
        let entries = vec![
            KnownHost {
                host: "a.example".to_string(),
                port: 22,
                fingerprint: "ABCDEF".to_string(),
            },
            KnownHost {
                host: "b.example".to_string(),
                port: 2200,
                fingerprint: "0123".to_string(),
            },
        ];
        let map = KnownHost::to_map(&entries);
        assert_eq!(map.get("a.example:22").map(String::as_str), Some("abcdef"));
        assert_eq!(map.get("b.example:2200").map(String::as_str), Some("0123"));
    }
}
