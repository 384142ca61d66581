//! 结果输出模块
//! 把单个目标的执行结果渲染为固定格式的文本块或 JSON 行

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use common::{ExecutionOutcome, OutcomeStatus};

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// 主机标注的文本块
    #[default]
    Text,
    /// 每行一个 JSON 对象
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {}. Must be one of: text, json", s)),
        }
    }
}

/// 结果渲染器
///
/// 渲染是纯投影：同一个结果多次渲染得到完全相同的字节。
pub trait Reporter: Send + Sync {
    fn render(&self, outcome: &ExecutionOutcome) -> String;

    /// 渲染并写入输出流
    fn report(&self, writer: &mut dyn Write, outcome: &ExecutionOutcome) -> std::io::Result<()> {
        writer.write_all(self.render(outcome).as_bytes())?;
        writer.flush()
    }
}

/// 文本块渲染器
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReporter;

impl Reporter for TextReporter {
    fn render(&self, outcome: &ExecutionOutcome) -> String {
        let mut block = format!("--- [Result from {}] ---\n", outcome.host());
        block.push_str(&format!("Status: {}\n", outcome.status().marker()));
        if let Some(error) = outcome.error() {
            block.push_str(&format!("Error: {}\n", error));
        }
        // 无论成功与否都输出（可能为空行）
        block.push_str(outcome.output());
        block.push('\n');
        block.push_str("---\n");
        block
    }
}

/// JSON 行渲染器
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReporter;

#[derive(Serialize)]
struct OutcomeRecord<'a> {
    host: &'a str,
    port: u16,
    user: &'a str,
    status: OutcomeStatus,
    output: &'a str,
    error: Option<String>,
    exit_status: Option<u32>,
    exit_signal: Option<&'a str>,
    duration_secs: f64,
    started_at: DateTime<Utc>,
}

impl<'a> From<&'a ExecutionOutcome> for OutcomeRecord<'a> {
    fn from(outcome: &'a ExecutionOutcome) -> Self {
        let target = outcome.target();
        Self {
            host: &target.host,
            port: target.port,
            user: &target.user,
            status: outcome.status(),
            output: outcome.output(),
            error: outcome.error().map(|e| e.to_string()),
            exit_status: outcome.exit_status(),
            exit_signal: outcome.exit_signal(),
            duration_secs: outcome.duration_secs(),
            started_at: outcome.started_at(),
        }
    }
}

impl Reporter for JsonReporter {
    fn render(&self, outcome: &ExecutionOutcome) -> String {
        let record = OutcomeRecord::from(outcome);
        // 记录只包含字符串、数字与时间，序列化不会失败
        let mut line = serde_json::to_string(&record).unwrap_or_default();
        line.push('\n');
        line
    }
}

/// 根据格式选择渲染器
pub fn reporter_for(format: OutputFormat) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Text => Box::new(TextReporter),
        OutputFormat::Json => Box::new(JsonReporter),
    }
}
