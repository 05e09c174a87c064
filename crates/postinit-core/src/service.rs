//! 延迟分派门面。
//!
//! # 设计背景（Why）
//! - 调用方可能在服务完成初始化之前就发起调用；不同调用方对“未就绪”的容忍度不同；
//! - `strict` 面向无法容忍未初始化状态的调用方：快速失败并把问题暴露给运维；
//! - `deferred` 面向只要求“最终被执行”的调用方：以即时反馈换取对启动顺序的鲁棒性。
//!
//! # 逻辑解析（How）
//! - 服务对象是共享句柄（内部 `Arc`），在启动时构造一次，克隆后交给所有调用方与初始化器，
//!   不依赖任何进程级全局变量；
//! - `deferred` 先做无锁的就绪快路径判断；未就绪时通过 [`PendingQueue::enqueue_unless`]
//!   在队列锁内复查门闩。初始化器先翻转门闩、再持锁排空队列，因此入队临界区要么早于排空
//!   （条目进入本次回放），要么晚于排空（复查必然看到 `Ready`，载荷就地执行）。
//!
//! # 风险提示（Trade-offs）
//! - 就绪后的同步执行与回放在不同线程进行，两者之间不保证先后；回放内部保持到达顺序。
use std::sync::Arc;

use tracing::debug;

use crate::error::DispatchError;
use crate::gate::{ReadinessGate, ReadinessState};
use crate::initializer::Initializer;
use crate::observability::{DispatchStats, LOG_TARGET, StatsSnapshot};
use crate::operation::Operation;
use crate::queue::{Admission, Drained, PendingQueue};

/// `deferred` 成功时的去向。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// 服务已就绪，操作已同步执行并成功。
    Executed,
    /// 服务未就绪，载荷已暂存；成功仅代表入队被受理，执行结果在回放时记录。
    Queued { sequence: u64 },
}

impl Dispatch {
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }
}

/// 组合门闩与队列的服务句柄。
pub struct DeferredService<O: Operation> {
    inner: Arc<ServiceInner<O>>,
}

struct ServiceInner<O: Operation> {
    gate: ReadinessGate,
    queue: PendingQueue<O::Payload>,
    operation: O,
    stats: DispatchStats,
}

impl<O: Operation> DeferredService<O> {
    /// 构造服务句柄及其唯一的初始化器。
    ///
    /// 初始化器不可克隆，且 [`Initializer::run`] 消耗自身，从类型上保证每个服务实例只初始化一次。
    pub fn new(operation: O) -> (Self, Initializer<O>) {
        let service = Self {
            inner: Arc::new(ServiceInner {
                gate: ReadinessGate::new(),
                queue: PendingQueue::new(),
                operation,
                stats: DispatchStats::new(),
            }),
        };
        let initializer = Initializer::new(service.clone());
        (service, initializer)
    }

    pub fn is_ready(&self) -> bool {
        self.inner.gate.is_ready()
    }

    pub fn readiness(&self) -> ReadinessState {
        self.inner.gate.state()
    }

    /// 严格调用：未就绪立即返回 [`DispatchError::NotInitialized`]，且不触碰底层操作。
    pub fn strict(&self, payload: O::Payload) -> Result<(), DispatchError<O::Error>> {
        if !self.inner.gate.is_ready() {
            self.inner.stats.record_strict_rejected();
            debug!(target: LOG_TARGET, "strict call rejected: service not initialized");
            return Err(DispatchError::NotInitialized);
        }
        self.inner.stats.record_strict_executed();
        self.execute_inline(payload)
    }

    /// 延迟调用：就绪时等同于 [`strict`](Self::strict)；未就绪时暂存并立即返回成功。
    pub fn deferred(&self, payload: O::Payload) -> Result<Dispatch, DispatchError<O::Error>> {
        let payload = if self.inner.gate.is_ready() {
            payload
        } else {
            let gate = &self.inner.gate;
            match self.inner.queue.enqueue_unless(payload, || gate.is_ready()) {
                Admission::Queued { sequence } => {
                    self.inner.stats.record_deferred_queued();
                    debug!(target: LOG_TARGET, sequence, "deferred call queued until ready");
                    return Ok(Dispatch::Queued { sequence });
                }
                Admission::Declined(payload) => payload,
            }
        };
        self.inner.stats.record_deferred_inline();
        self.execute_inline(payload).map(|()| Dispatch::Executed)
    }

    /// 当前尚未回放的暂存条目数。
    pub fn pending_len(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// 访问底层操作，例如在测试中检查其记录。
    pub fn operation(&self) -> &O {
        &self.inner.operation
    }

    /// 翻转门闩并取走全部暂存条目；仅由初始化器调用。
    ///
    /// 顺序不可颠倒：必须先对所有线程发布 `Ready`，再持锁排空。
    pub(crate) fn open_and_drain(&self) -> Drained<O::Payload> {
        self.inner.gate.mark_ready();
        self.inner.queue.drain_all()
    }

    pub(crate) fn replay(&self, payload: O::Payload) -> Result<(), O::Error> {
        let outcome = self.inner.operation.execute(payload);
        self.inner.stats.record_replay(outcome.is_ok());
        outcome
    }

    fn execute_inline(&self, payload: O::Payload) -> Result<(), DispatchError<O::Error>> {
        self.inner.operation.execute(payload).map_err(|err| {
            self.inner.stats.record_operation_failed();
            DispatchError::Operation(err)
        })
    }
}

impl<O: Operation> Clone for DeferredService<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O: Operation> std::fmt::Debug for DeferredService<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredService")
            .field("readiness", &self.readiness())
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}
