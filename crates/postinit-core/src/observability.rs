//! 分派结果计数。
//!
//! 计数器仅用于观测，使用 `Relaxed` 序即可；它们不参与任何正确性判断，
//! 快照中的各字段之间也不保证处于同一瞬间。
use core::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 日志 target，便于通过 `RUST_LOG=postinit=debug` 单独打开核心层日志。
pub const LOG_TARGET: &str = "postinit";

/// 各条调用路径的累计次数。
#[derive(Debug, Default)]
pub struct DispatchStats {
    strict_rejected: AtomicU64,
    strict_executed: AtomicU64,
    deferred_inline: AtomicU64,
    deferred_queued: AtomicU64,
    replayed: AtomicU64,
    replay_failed: AtomicU64,
    operation_failed: AtomicU64,
}

/// [`DispatchStats`] 的只读副本。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// `strict` 因未就绪被拒绝的次数。
    pub strict_rejected: u64,
    /// `strict` 同步执行的次数（含失败）。
    pub strict_executed: u64,
    /// `deferred` 在就绪后同步执行的次数（含失败）。
    pub deferred_inline: u64,
    /// `deferred` 被暂存的次数。
    pub deferred_queued: u64,
    /// 回放成功的条目数。
    pub replayed: u64,
    /// 回放失败的条目数。
    pub replay_failed: u64,
    /// 同步执行路径上底层操作失败的次数。
    pub operation_failed: u64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            strict_rejected: self.strict_rejected.load(Ordering::Relaxed),
            strict_executed: self.strict_executed.load(Ordering::Relaxed),
            deferred_inline: self.deferred_inline.load(Ordering::Relaxed),
            deferred_queued: self.deferred_queued.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            replay_failed: self.replay_failed.load(Ordering::Relaxed),
            operation_failed: self.operation_failed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_strict_rejected(&self) {
        self.strict_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_strict_executed(&self) {
        self.strict_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred_inline(&self) {
        self.deferred_inline.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred_queued(&self) {
        self.deferred_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_replay(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.replayed
        } else {
            &self.replay_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_operation_failed(&self) {
        self.operation_failed.fetch_add(1, Ordering::Relaxed);
    }
}

impl StatsSnapshot {
    /// 底层操作被实际调用的总次数（同步 + 回放）。
    pub fn executions(&self) -> u64 {
        self.strict_executed + self.deferred_inline + self.replayed + self.replay_failed
    }
}
