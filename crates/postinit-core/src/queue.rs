//! 就绪前调用的有序暂存队列。
//!
//! # 设计背景（Why）
//! - 未就绪期间没有任何消费者存在，写入方不能依赖“有人接收”才返回；
//! - 因此采用“互斥锁 + 动态数组”的追加式缓冲，而非逐条创建单槽通道。
//!
//! # 契约说明（What）
//! - 每条 [`PendingEntry`] 在入队时于锁内获得单调递增的 `sequence`，回放顺序与其一致；
//! - [`PendingQueue::drain_all`] 一次性取走当前全部条目并开启新一代，之后的入队进入下一代；
//! - 任意条目只会出现在恰好一个 [`Drained`] 批次中：不丢失，不重复。
//!
//! # 风险提示（Trade-offs）
//! - 队列无容量上限；调用方需自行保证初始化最终完成或失败。
use core::{fmt, mem};
use std::sync::PoisonError;
use std::vec;

// 教案级说明：`loom` 运行时需要接管互斥锁以枚举调度交错，因此在模型检查配置下
// 显式切换到 `loom::sync::Mutex`；常规构建保留 `std::sync::Mutex`。
#[cfg(any(loom, postinit_loom))]
use loom::sync::{Mutex, MutexGuard};
#[cfg(not(any(loom, postinit_loom)))]
use std::sync::{Mutex, MutexGuard};

/// 单条被延迟的调用。
///
/// 创建后不可变；只能通过 [`PendingEntry::into_payload`] 交出所有权用于回放。
#[derive(Clone, PartialEq, Eq)]
pub struct PendingEntry<P> {
    sequence: u64,
    payload: P,
}

impl<P> PendingEntry<P> {
    /// 入队时分配的到达序号，从 0 开始跨代单调递增。
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }
}

impl<P: fmt::Debug> fmt::Debug for PendingEntry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingEntry")
            .field("sequence", &self.sequence)
            .field("payload", &self.payload)
            .finish()
    }
}

/// 条件入队的结果。
#[derive(Debug, PartialEq, Eq)]
pub enum Admission<P> {
    /// 已追加到当前代，附带到达序号。
    Queued { sequence: u64 },
    /// 旁路条件在锁内成立，载荷原样归还给调用方。
    Declined(P),
}

/// 一次排空得到的批次。
#[derive(Debug)]
pub struct Drained<P> {
    generation: u64,
    entries: Vec<PendingEntry<P>>,
}

impl<P> Drained<P> {
    /// 批次所属的代，首次排空为 0。
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 按到达顺序排列的条目。
    pub fn entries(&self) -> &[PendingEntry<P>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P> IntoIterator for Drained<P> {
    type Item = PendingEntry<P>;
    type IntoIter = vec::IntoIter<PendingEntry<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

struct QueueState<P> {
    entries: Vec<PendingEntry<P>>,
    next_sequence: u64,
    generation: u64,
}

/// 并发安全的追加式暂存队列。
///
/// # 逻辑解析（How）
/// - 单把互斥锁同时保护条目、下一个序号与当前代号，保证“分配序号 + 追加”原子完成；
/// - `enqueue_unless` 在持锁期间评估旁路条件，使“检查就绪 -> 追加”与 `drain_all` 互斥，
///   这是 [`DeferredService`](crate::DeferredService) 消除迟到条目竞态的基础；
/// - 锁中毒时直接取回内部数据：所有临界区要么完整执行要么未开始修改，不存在半更新状态。
pub struct PendingQueue<P> {
    state: Mutex<QueueState<P>>,
}

impl<P> PendingQueue<P> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                entries: Vec::new(),
                next_sequence: 0,
                generation: 0,
            }),
        }
    }

    /// 无条件追加一条载荷，返回其到达序号。
    ///
    /// 不会等待任何消费者；只在与其他入队或排空争用锁时短暂阻塞。
    pub fn enqueue(&self, payload: P) -> u64 {
        let mut state = self.lock();
        Self::push(&mut state, payload)
    }

    /// 在持锁期间评估 `bypass`：成立则归还载荷，否则追加。
    ///
    /// # 契约说明（What）
    /// - `bypass` 恰好被调用一次，且与其他入队、排空互斥执行；
    /// - `bypass` 不得再次访问同一队列，否则会自锁。
    pub fn enqueue_unless<F>(&self, payload: P, bypass: F) -> Admission<P>
    where
        F: FnOnce() -> bool,
    {
        let mut state = self.lock();
        if bypass() {
            return Admission::Declined(payload);
        }
        let sequence = Self::push(&mut state, payload);
        Admission::Queued { sequence }
    }

    /// 原子地取走当前代的全部条目，并开启下一代。
    pub fn drain_all(&self) -> Drained<P> {
        let mut state = self.lock();
        let generation = state.generation;
        state.generation += 1;
        Drained {
            generation,
            entries: mem::take(&mut state.entries),
        }
    }

    /// 当前代中尚未被取走的条目数。
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(state: &mut QueueState<P>, payload: P) -> u64 {
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.push(PendingEntry { sequence, payload });
        sequence
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P> Default for PendingQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for PendingQueue<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("PendingQueue")
            .field("len", &state.entries.len())
            .field("generation", &state.generation)
            .field("next_sequence", &state.next_sequence)
            .finish()
    }
}
