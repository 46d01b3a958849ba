//! 取消令牌

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 显式取消令牌
///
/// 克隆共享同一个标志位。轮询循环每次迭代至少检查一次
/// [`CancelToken::is_cancelled`]（轮询式取消，非抢占）。
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发出取消信号（幂等）
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}
