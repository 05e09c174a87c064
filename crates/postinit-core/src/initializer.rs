//! 一次性初始化与回放。
//!
//! # 设计背景（Why）
//! - 初始化是唯一允许长时间阻塞的步骤，且只阻塞它自己的执行线程；
//! - 后台任务以显式句柄 [`InitHandle`] 交还给进程入口，完成与失败都可被 `join` 观测，
//!   而不是“发射后不管”。
//!
//! # 契约说明（What）
//! - [`Initializer::run`]：执行 [`Setup`]；成功则翻转门闩、排空队列并在当前线程按序回放；
//! - 初始化失败时绝不翻转门闩：服务永久停留在 `NotReady`，`strict` 持续返回
//!   `NotInitialized`，`deferred` 持续排队；这是终局状态，不会自动重试；
//! - 回放失败只记录日志与报告，不会中断后续条目，也不会回传给原调用方。
use std::error::Error as StdError;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info, info_span, warn};

use crate::error::InitError;
use crate::observability::LOG_TARGET;
use crate::operation::Operation;
use crate::service::DeferredService;

/// 初始化器线程的默认名称。
pub const DEFAULT_THREAD_NAME: &str = "postinit-init";

/// 不透明的初始化步骤。
pub trait Setup: Send + 'static {
    type Error: StdError + Send + Sync + 'static;

    fn setup(self) -> Result<(), Self::Error>;
}

impl<F, E> Setup for F
where
    F: FnOnce() -> Result<(), E> + Send + 'static,
    E: StdError + Send + Sync + 'static,
{
    type Error = E;

    fn setup(self) -> Result<(), E> {
        self()
    }
}

/// 单条回放失败的记录。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayFailure {
    pub sequence: u64,
    pub message: String,
}

/// 一次成功初始化的回放结果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayReport {
    generation: u64,
    setup_elapsed: Duration,
    replayed: usize,
    failures: Vec<ReplayFailure>,
}

impl ReplayReport {
    /// 被回放批次的代号。
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 初始化步骤本身耗时。
    pub fn setup_elapsed(&self) -> Duration {
        self.setup_elapsed
    }

    /// 回放成功的条目数。
    pub fn replayed(&self) -> usize {
        self.replayed
    }

    pub fn failures(&self) -> &[ReplayFailure] {
        &self.failures
    }

    /// 被回放的条目总数（成功 + 失败）。
    pub fn total(&self) -> usize {
        self.replayed + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 服务的唯一初始化器。
///
/// 由 [`DeferredService::new`] 成对产出；不可克隆，`run`/`spawn` 均消耗自身。
#[must_use = "dropping the initializer leaves the service permanently not ready"]
pub struct Initializer<O: Operation> {
    service: DeferredService<O>,
}

impl<O: Operation> Initializer<O> {
    pub(crate) fn new(service: DeferredService<O>) -> Self {
        Self { service }
    }

    /// 在当前线程执行初始化与回放。
    ///
    /// # 执行逻辑（How）
    /// 1. 执行 `setup`，失败则记录 `error` 日志并返回 [`InitError::Setup`]；
    /// 2. 翻转门闩，此后新的调用直接同步执行；
    /// 3. 排空队列，按到达顺序逐条执行底层操作；失败条目记录 `warn` 日志并写入报告。
    pub fn run<S: Setup>(self, setup: S) -> Result<ReplayReport, InitError> {
        let span = info_span!(target: LOG_TARGET, "postinit.initialize");
        let _entered = span.enter();

        let started = Instant::now();
        if let Err(err) = setup.setup() {
            error!(
                target: LOG_TARGET,
                error = %err,
                "initialization failed; service stays not ready"
            );
            return Err(InitError::setup(err));
        }
        let setup_elapsed = started.elapsed();

        let drained = self.service.open_and_drain();
        let generation = drained.generation();
        info!(
            target: LOG_TARGET,
            generation,
            pending = drained.len(),
            setup_ms = setup_elapsed.as_millis() as u64,
            "service marked ready; replaying deferred calls"
        );

        let mut replayed = 0;
        let mut failures = Vec::new();
        for entry in drained {
            let sequence = entry.sequence();
            match self.service.replay(entry.into_payload()) {
                Ok(()) => replayed += 1,
                Err(err) => {
                    warn!(target: LOG_TARGET, sequence, error = %err, "replayed call failed");
                    failures.push(ReplayFailure {
                        sequence,
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            target: LOG_TARGET,
            replayed,
            failed = failures.len(),
            "deferred replay finished"
        );
        Ok(ReplayReport {
            generation,
            setup_elapsed,
            replayed,
            failures,
        })
    }

    /// 在名为 [`DEFAULT_THREAD_NAME`] 的后台线程中执行 [`run`](Self::run)。
    pub fn spawn<S: Setup>(self, setup: S) -> Result<InitHandle, InitError> {
        self.spawn_named(DEFAULT_THREAD_NAME, setup)
    }

    /// 在指定名称的后台线程中执行 [`run`](Self::run)，返回可 `join` 的句柄。
    pub fn spawn_named<S: Setup>(
        self,
        name: impl Into<String>,
        setup: S,
    ) -> Result<InitHandle, InitError> {
        let thread = thread::Builder::new()
            .name(name.into())
            .spawn(move || self.run(setup))
            .map_err(InitError::Spawn)?;
        Ok(InitHandle { thread })
    }
}

impl<O: Operation> std::fmt::Debug for Initializer<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Initializer")
            .field("service", &self.service)
            .finish()
    }
}

/// 后台初始化线程的句柄。
#[derive(Debug)]
#[must_use = "join the handle to observe initialization failure"]
pub struct InitHandle {
    thread: JoinHandle<Result<ReplayReport, InitError>>,
}

impl InitHandle {
    /// 等待初始化线程结束并取回结果；线程 panic 映射为 [`InitError::Panicked`]。
    pub fn join(self) -> Result<ReplayReport, InitError> {
        self.thread.join().map_err(|_| InitError::Panicked)?
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}
