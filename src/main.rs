//! ops-batch 主入口
//! 在清单中的所有主机上并行执行一条命令并按到达顺序输出结果

use clap::Parser;
use ops_batch::{batch, cli::Cli, config::AppConfig, error::Result, telemetry};

#[tokio::main]
async fn main() {
    // 缺少命令参数时 clap 输出用法到 stderr 并以非零码退出，不会连接任何主机
    let cli = Cli::parse();

    // 加载 .env 文件
    // 按优先级加载：.env.<OPS_ENV> 或 .env.local > .env
    if let Ok(name) = std::env::var("OPS_ENV") {
        dotenv::from_filename(format!(".env.{}", name)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    // 单个目标的失败只体现在输出中，不影响退出码
    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: &Cli) -> Result<()> {
    // 1. 加载配置，命令行参数优先
    let config = AppConfig::load(cli.overrides())?;

    // 2. 初始化日志与指标
    telemetry::init_telemetry(&config);
    telemetry::init_metrics();

    // 3. 执行批量任务
    let result = batch::run(&config, &cli.command).await?;

    tracing::debug!(outcomes = result.len(), "Batch finished");
    Ok(())
}
