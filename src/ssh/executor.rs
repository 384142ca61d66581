//! SSH执行器模块
//! 对单个目标建立连接、执行命令并收集合并输出
//!
//! 使用 russh 库实现真实的 SSH 连接和命令执行。所有失败都记录在返回的
//! ExecutionOutcome 中，不会向调用方返回错误。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use russh::client::{self, Config, Handle};
use russh::{Channel, ChannelMsg, Disconnect, Sig};
use russh_keys::key::PublicKey;
use russh_keys::load_secret_key;
use russh_keys::PublicKeyBase64;
use secrecy::ExposeSecret;
use sha2::Digest;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use common::{
    ExecError, ExecutionOutcome, HostKeyVerification, OutcomeStatus, SshAuth, TargetDescriptor,
};

use crate::dispatch::RemoteExecutor;

/// SSH_EXTENDED_DATA_STDERR
const EXTENDED_DATA_STDERR: u32 = 1;

/// 执行器设置
#[derive(Debug, Clone)]
pub struct SshSettings {
    /// 连接超时（TCP 连接 + 握手 + 认证）
    pub connect_timeout: Duration,
    /// 命令执行超时，None 表示不限制
    pub command_timeout: Option<Duration>,
    /// 主机密钥验证策略
    pub host_key_verification: HostKeyVerification,
    /// 已登记的主机密钥（`host:port` -> 指纹）
    pub known_hosts: Arc<HashMap<String, String>>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: None,
            host_key_verification: HostKeyVerification::Disabled,
            known_hosts: Arc::new(HashMap::new()),
        }
    }
}

impl SshSettings {
    /// 设置连接超时
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// 设置命令超时
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// 设置主机密钥验证策略
    pub fn with_host_key_verification(mut self, verification: HostKeyVerification) -> Self {
        self.host_key_verification = verification;
        self
    }

    pub fn with_known_hosts(mut self, known_hosts: HashMap<String, String>) -> Self {
        self.known_hosts = Arc::new(known_hosts);
        self
    }
}

/// SSH 命令执行器
pub struct SshExecutor {
    settings: SshSettings,
    client_config: Arc<Config>,
}

/// 命令通道上收集到的数据
#[derive(Default)]
struct Capture {
    output: Vec<u8>,
    exit_status: Option<u32>,
    exit_signal: Option<String>,
}

impl SshExecutor {
    pub fn new(settings: SshSettings) -> Self {
        // 创建 SSH 客户端配置
        let client_config = Arc::new(Config {
            preferred: russh::Preferred::default(),
            ..Default::default()
        });

        Self {
            settings,
            client_config,
        }
    }

    /// 创建带验证策略的会话处理器
    fn create_handler(&self, target: &TargetDescriptor) -> HostKeyHandler {
        HostKeyHandler {
            verification_mode: self.settings.host_key_verification,
            known_hosts: self.settings.known_hosts.clone(),
            address: target.address(),
        }
    }

    /// 建立连接并认证，整个过程受连接超时约束
    async fn connect(&self, target: &TargetDescriptor) -> Result<Handle<HostKeyHandler>, ExecError> {
        let establish = async {
            let handler = self.create_handler(target);
            let mut handle = client::connect(
                self.client_config.clone(),
                (target.host.as_str(), target.port),
                handler,
            )
            .await
            .map_err(|e| match e {
                russh::Error::UnknownKey => ExecError::HostKeyRejected(target.address()),
                other => ExecError::Connect(other.to_string()),
            })?;

            if let Err(e) = Self::authenticate(&mut handle, target).await {
                let _ = handle
                    .disconnect(Disconnect::ByApplication, "", "")
                    .await;
                return Err(e);
            }

            Ok(handle)
        };

        timeout(self.settings.connect_timeout, establish)
            .await
            .map_err(|_| ExecError::Timeout {
                target: target.address(),
                timeout: self.settings.connect_timeout,
            })?
    }

    /// 认证
    async fn authenticate(
        handle: &mut Handle<HostKeyHandler>,
        target: &TargetDescriptor,
    ) -> Result<(), ExecError> {
        let auth_result = match &target.auth {
            SshAuth::Password { password } => {
                handle
                    .authenticate_password(target.user.clone(), password.expose_secret())
                    .await
            }
            SshAuth::KeyFile { path, passphrase } => {
                let key = load_secret_key(
                    path,
                    passphrase.as_ref().map(|p| p.expose_secret().as_str()),
                )
                .map_err(|e| {
                    error!(path = %path.display(), error = %e, "Failed to load private key");
                    ExecError::KeyLoad(format!("{}: {}", path.display(), e))
                })?;

                handle
                    .authenticate_publickey(target.user.clone(), Arc::new(key))
                    .await
            }
        };

        match auth_result {
            Ok(true) => Ok(()),
            Ok(false) => Err(ExecError::Authentication(target.target())),
            Err(e) => Err(ExecError::Connect(e.to_string())),
        }
    }

    /// 在已建立的连接上打开会话并执行命令
    ///
    /// 会话通道在每条返回路径上都会关闭。
    async fn run_on_connection(
        &self,
        handle: &mut Handle<HostKeyHandler>,
        target: Arc<TargetDescriptor>,
        command: &str,
    ) -> ExecutionOutcome {
        let mut channel = match handle.channel_open_session().await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(host = %target.host, error = %e, "Failed to open session");
                return ExecutionOutcome::failure(target, ExecError::Session(e.to_string()), "");
            }
        };

        if let Err(e) = channel.exec(true, command).await {
            warn!(host = %target.host, error = %e, "Failed to execute command");
            let _ = channel.close().await;
            return ExecutionOutcome::failure(target, ExecError::Exec(e.to_string()), "");
        }

        let mut capture = Capture::default();
        // 超时后返回已配置的时长，用于错误信息
        let timed_out = match self.settings.command_timeout {
            Some(limit) => timeout(limit, read_channel(&mut channel, &mut capture))
                .await
                .err()
                .map(|_| limit),
            None => {
                read_channel(&mut channel, &mut capture).await;
                None
            }
        };

        let _ = channel.close().await;

        let output = String::from_utf8_lossy(&capture.output);

        if let Some(limit) = timed_out {
            warn!(host = %target.host, timeout = ?limit, "Command timed out");
            return ExecutionOutcome::failure(target, ExecError::CommandTimeout(limit), &output);
        }

        if capture.exit_status.is_none() && capture.exit_signal.is_none() {
            warn!(host = %target.host, "Channel closed without exit status");
            return ExecutionOutcome::failure(target, ExecError::ChannelClosed, &output);
        }

        // 远端退出码只作为附加信息，不影响状态
        ExecutionOutcome::success(target, &output)
            .with_exit_status(capture.exit_status)
            .with_exit_signal(capture.exit_signal)
    }
}

/// 读取通道直至关闭；stdout 与 stderr 按到达顺序合并
async fn read_channel(channel: &mut Channel<client::Msg>, capture: &mut Capture) {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { ref data }) => {
                capture.output.extend_from_slice(data);
            }
            Some(ChannelMsg::ExtendedData { ref data, ext }) => {
                if ext == EXTENDED_DATA_STDERR {
                    capture.output.extend_from_slice(data);
                }
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                capture.exit_status = Some(exit_status);
            }
            Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                capture.exit_signal = Some(signal_name_of(&signal_name));
            }
            Some(ChannelMsg::Close) | None => break,
            Some(_) => {}
        }
    }
}

/// 信号的协议名（RFC 4254 中不带 "SIG" 前缀的名称）
fn signal_name_of(signal: &Sig) -> String {
    let name = match signal {
        Sig::ABRT => "ABRT",
        Sig::ALRM => "ALRM",
        Sig::FPE => "FPE",
        Sig::HUP => "HUP",
        Sig::ILL => "ILL",
        Sig::INT => "INT",
        Sig::KILL => "KILL",
        Sig::PIPE => "PIPE",
        Sig::QUIT => "QUIT",
        Sig::SEGV => "SEGV",
        Sig::TERM => "TERM",
        Sig::USR1 => "USR1",
        Sig::Custom(name) => name,
    };
    name.to_string()
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, target: Arc<TargetDescriptor>, command: &str) -> ExecutionOutcome {
        let started_at = Utc::now();
        let start_time = Instant::now();

        debug!(
            host = %target.host,
            port = target.port,
            user = %target.user,
            auth = target.auth.method(),
            command = %command,
            "Executing SSH command"
        );

        let outcome = match self.connect(&target).await {
            Ok(mut handle) => {
                debug!(host = %target.host, status = %OutcomeStatus::Connected, "SSH connection established");

                let outcome = self.run_on_connection(&mut handle, target.clone(), command).await;

                // 关闭连接
                let _ = handle
                    .disconnect(Disconnect::ByApplication, "", "")
                    .await;
                outcome
            }
            Err(e) => {
                warn!(host = %target.host, port = target.port, error = %e, "SSH connection failed");
                ExecutionOutcome::failure(target.clone(), e, "")
            }
        };

        let duration_secs = start_time.elapsed().as_secs_f64();

        info!(
            host = %target.host,
            status = %outcome.status(),
            exit_status = ?outcome.exit_status(),
            duration_secs = duration_secs,
            output_len = outcome.output().len(),
            "Command executed"
        );

        outcome.with_timing(started_at, duration_secs)
    }
}

/// 计算主机公钥指纹（base64 编码的 SHA-256，十六进制）
pub fn fingerprint(server_public_key: &PublicKey) -> String {
    let key_data = server_public_key.public_key_base64();
    let mut hasher = sha2::Sha256::new();
    hasher.update(key_data.as_bytes());
    hex::encode(hasher.finalize())
}

/// SSH 客户端会话处理器，负责主机密钥验证
pub struct HostKeyHandler {
    verification_mode: HostKeyVerification,
    known_hosts: Arc<HashMap<String, String>>,
    address: String,
}

impl HostKeyHandler {
    /// 按验证策略判断是否接受给定指纹
    fn verify(&self, fingerprint: &str) -> bool {
        match self.verification_mode {
            HostKeyVerification::Disabled => {
                debug!(host = %self.address, "Host key verification disabled - accepting key");
                true
            }
            HostKeyVerification::Accept | HostKeyVerification::Strict => {
                match self.known_hosts.get(&self.address) {
                    Some(stored) if stored.eq_ignore_ascii_case(fingerprint) => {
                        debug!(host = %self.address, "Host key verified");
                        true
                    }
                    Some(stored) => {
                        error!(
                            host = %self.address,
                            expected = %stored,
                            actual = %fingerprint,
                            "Host key mismatch - REJECTING CONNECTION"
                        );
                        false
                    }
                    None if self.verification_mode == HostKeyVerification::Accept => {
                        info!(
                            host = %self.address,
                            fingerprint = %fingerprint,
                            "Unknown host - accepting host key"
                        );
                        true
                    }
                    None => {
                        error!(host = %self.address, "Unknown host in strict mode - rejecting connection");
                        false
                    }
                }
            }
        }
    }
}

#[async_trait]
impl client::Handler for HostKeyHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(self.verify(&fingerprint(server_public_key)))
    }
}
