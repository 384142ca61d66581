//! 日志与追踪系统
//! 初始化结构化日志和指标收集
//!
//! 日志统一写入 stderr，stdout 只用于输出执行结果

use crate::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 结果计数指标
pub const OUTCOMES_TOTAL: &str = "ops_batch_outcomes_total";
/// 单目标耗时指标
pub const OUTCOME_DURATION_SECONDS: &str = "ops_batch_outcome_duration_seconds";

/// 初始化日志与追踪系统
pub fn init_telemetry(config: &AppConfig) {
    // 从环境变量构建过滤器
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // 根据配置选择日志格式
    let log_layer = match config.logging.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
            .boxed(),
        "pretty" => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
    };

    // 初始化 subscriber
    tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .init();

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.logging.level,
        format = %config.logging.format,
        "Telemetry initialized"
    );
}

/// 初始化指标收集器
pub fn init_metrics() {
    // metrics 0.24 无需显式注册，未安装 recorder 时记录为空操作
    metrics::describe_counter!(OUTCOMES_TOTAL, "Execution outcomes by status");
    metrics::describe_histogram!(
        OUTCOME_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Wall time per target from connect to release"
    );
    tracing::debug!("Metrics initialized");
}

/// 记录单个目标的结果指标
pub fn record_outcome(outcome: &common::ExecutionOutcome) {
    metrics::counter!(OUTCOMES_TOTAL, "status" => outcome.status().as_str()).increment(1);
    metrics::histogram!(OUTCOME_DURATION_SECONDS).record(outcome.duration_secs());
}
