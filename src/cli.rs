//! 命令行参数

use clap::Parser;

use crate::config::Overrides;

/// 在清单中的所有主机上并行执行同一条命令
#[derive(Debug, Parser)]
#[command(name = "ops-batch", version, about)]
pub struct Cli {
    /// 要在每台主机上执行的命令（原样传给远端 shell）
    pub command: String,

    /// 目标清单文件（默认 servers.yaml）
    #[arg(short, long)]
    pub inventory: Option<String>,

    /// 最大并发连接数（0 表示不限制）
    #[arg(short = 'c', long)]
    pub max_concurrency: Option<usize>,

    /// 连接超时（秒）
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// 命令执行超时（秒），默认不限制
    #[arg(long)]
    pub command_timeout: Option<u64>,

    /// 主机密钥验证策略：disabled, accept, strict
    #[arg(long)]
    pub host_key_verification: Option<String>,

    /// 输出格式：text, json
    #[arg(short, long)]
    pub format: Option<String>,
}

impl Cli {
    /// 转换为配置覆盖项
    pub fn overrides(&self) -> Overrides {
        Overrides {
            inventory_path: self.inventory.clone(),
            max_concurrency: self.max_concurrency,
            connect_timeout_secs: self.connect_timeout,
            command_timeout_secs: self.command_timeout,
            host_key_verification: self.host_key_verification.clone(),
            output_format: self.format.clone(),
        }
    }
}
