//! 批量执行流程
//! 清单加载 -> 分发 -> 并行执行 -> 结果输出

use std::io::Write;
use std::sync::Arc;

use tracing::{info, warn};

use common::{HostKeyVerification, RunResult, TargetDescriptor};

use crate::concurrency::ConcurrencyLimiter;
use crate::config::AppConfig;
use crate::dispatch::{Dispatcher, RemoteExecutor};
use crate::error::Result;
use crate::inventory::{load_inventory, Inventory};
use crate::output::{reporter_for, Reporter};
use crate::ssh::{SshExecutor, SshSettings};

/// 由配置与清单构建执行器设置
pub fn ssh_settings(config: &AppConfig, inventory: &Inventory) -> SshSettings {
    SshSettings::default()
        .with_connect_timeout(config.connect_timeout())
        .with_command_timeout(config.command_timeout())
        .with_host_key_verification(config.host_key_verification())
        .with_known_hosts(inventory.known_hosts_map())
}

/// 主机身份不做验证时明确提示
pub fn warn_if_unverified(mode: HostKeyVerification, targets: usize) {
    if mode == HostKeyVerification::Disabled && targets > 0 {
        warn!(
            targets = targets,
            "Host key verification is DISABLED - remote host identities are accepted without checking \
             (set --host-key-verification or OPS_SSH__HOST_KEY_VERIFICATION to accept/strict)"
        );
    }
}

/// 执行一次批量任务，结果按到达顺序写入 `writer`
///
/// 写入失败只记录日志，不影响其余目标的执行与收集。
pub async fn run_batch(
    dispatcher: &Dispatcher,
    targets: Vec<TargetDescriptor>,
    command: &str,
    reporter: &dyn Reporter,
    writer: &mut dyn Write,
) -> RunResult {
    let mut write_failed = false;

    dispatcher
        .dispatch(targets, command, |outcome| {
            if write_failed {
                return;
            }
            if let Err(e) = reporter.report(&mut *writer, outcome) {
                warn!(host = %outcome.host(), error = %e, "Failed to write result");
                write_failed = true;
            }
        })
        .await
}

/// 按配置从清单加载目标并对其执行命令，结果写到 stdout
pub async fn run(config: &AppConfig, command: &str) -> Result<RunResult> {
    let inventory = load_inventory(&config.inventory.path)?;
    let targets = inventory.targets();

    info!(
        inventory = %config.inventory.path,
        targets = targets.len(),
        "Inventory ready"
    );

    let settings = ssh_settings(config, &inventory);
    warn_if_unverified(settings.host_key_verification, targets.len());

    let executor: Arc<dyn RemoteExecutor> = Arc::new(SshExecutor::new(settings));
    let dispatcher = Dispatcher::new(executor)
        .with_limiter(ConcurrencyLimiter::new(config.max_concurrency()));
    let reporter = reporter_for(config.output_format());

    let mut writer = std::io::stdout();

    Ok(run_batch(&dispatcher, targets, command, reporter.as_ref(), &mut writer).await)
}
