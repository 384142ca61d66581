//! 并发控制模块
//! 为批量执行提供可选的全局并发上限，默认不限制

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// 并发许可（持有 semaphore 许可，drop 时释放）
pub struct ConcurrencyPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

/// 并发控制器
///
/// `limit` 为 None 时所有任务立即获得许可。
#[derive(Clone, Default)]
pub struct ConcurrencyLimiter {
    semaphore: Option<Arc<Semaphore>>,
    limit: Option<usize>,
}

impl ConcurrencyLimiter {
    /// 创建并发控制器，None 或 0 表示不限制
    pub fn new(limit: Option<usize>) -> Self {
        match limit.filter(|&n| n > 0) {
            Some(n) => Self {
                semaphore: Some(Arc::new(Semaphore::new(n))),
                limit: Some(n),
            },
            None => Self::unbounded(),
        }
    }

    /// 不限制并发
    pub fn unbounded() -> Self {
        Self {
            semaphore: None,
            limit: None,
        }
    }

    /// 获取执行许可，达到上限时等待
    pub async fn acquire(&self) -> ConcurrencyPermit {
        let permit = match &self.semaphore {
            // semaphore 从不关闭，acquire_owned 只会在关闭时失败
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
            None => None,
        };

        if permit.is_some() {
            debug!(available = self.available(), "Acquired concurrency permit");
        }

        ConcurrencyPermit { _permit: permit }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// 当前可用许可数，不限制时返回 None
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    pub fn is_bounded(&self) -> bool {
        self.semaphore.is_some()
    }
}
