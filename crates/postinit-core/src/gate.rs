//! 一次性就绪标记。
//!
//! # 设计背景（Why）
//! - 服务在后台完成初始化之前，任何调用都需要一个廉价且线程安全的判断依据；
//! - 该判断必须对所有线程可见，而不仅仅是执行翻转的那个线程。
//!
//! # 契约说明（What）
//! - [`ReadinessGate::is_ready`] 为无锁读，可在翻转过程中被任意数量的线程并发调用；
//! - `mark_ready` 仅对本 crate 可见，由 [`Initializer`](crate::Initializer) 在初始化成功后调用；
//! - 状态只允许 `NotReady -> Ready` 单向迁移，之后不会回退。
//
// 教案级说明：为了让 Loom 在模型检查阶段能够捕获原子操作的所有调度交错，
// 当启用 `--cfg loom` 时切换到它提供的原子类型。
#[cfg(not(any(loom, postinit_loom)))]
use core::sync::atomic::{AtomicBool, Ordering};
use core::fmt;
#[cfg(any(loom, postinit_loom))]
use loom::sync::atomic::{AtomicBool, Ordering};

/// 服务级就绪状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadinessState {
    /// 初始化尚未成功完成；若初始化失败，服务将永久停留于此。
    NotReady,
    /// 初始化已完成，终态。
    Ready,
}

impl ReadinessState {
    /// 是否处于 `Ready`。
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// 用于日志字段的稳定标签。
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotReady => "not_ready",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 就绪门闩。
///
/// # 逻辑解析（How）
/// - 内部使用 [`AtomicBool`]，读取使用 `Acquire`，翻转使用 `AcqRel` 的比较交换；
/// - 翻转线程在 `mark_ready` 之前完成的全部写入（例如初始化产物），对观测到 `Ready` 的线程可见。
///
/// # 设计取舍与风险（Trade-offs）
/// - 未提供“等待就绪”的阻塞接口；需要等待的调用方应持有 [`InitHandle`](crate::InitHandle) 并 `join`。
pub struct ReadinessGate {
    ready: AtomicBool,
}

impl ReadinessGate {
    /// 创建处于 `NotReady` 的门闩。
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }

    /// 查询当前是否已就绪。
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// 以枚举形式返回当前状态。
    pub fn state(&self) -> ReadinessState {
        if self.is_ready() {
            ReadinessState::Ready
        } else {
            ReadinessState::NotReady
        }
    }

    /// 将门闩翻转为 `Ready`。
    ///
    /// 返回 `true` 表示本次调用完成了翻转；返回 `false` 表示此前已经就绪。
    pub(crate) fn mark_ready(&self) -> bool {
        self.ready
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("state", &self.state())
            .finish()
    }
}
