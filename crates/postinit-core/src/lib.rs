#![deny(unsafe_code)]
#![doc = "postinit-core: 在共享服务完成一次性初始化之前，拒绝或暂存调用，并在就绪后按到达顺序回放。"]
#![doc = ""]
#![doc = "== 组件分层 =="]
#![doc = "1. [`ReadinessGate`]：一次性就绪标记，任意线程可无锁查询。"]
#![doc = "2. [`PendingQueue`]：就绪前暂存的有序缓冲，按代（generation）整体取出。"]
#![doc = "3. [`DeferredService`]：对外门面，提供 `strict`（未就绪即失败）与 `deferred`（未就绪即排队）两种调用契约。"]
#![doc = "4. [`Initializer`]：执行初始化、翻转就绪标记、排空队列并逐条回放。"]
#![doc = ""]
#![doc = "== 并发模型 =="]
#![doc = "调用方线程与唯一的初始化线程并发运行；所有共享状态均为 `Send + Sync`。"]
#![doc = "启用 `--cfg loom`（或 `--cfg postinit_loom`）并打开 `loom-model` Feature 时，原子与互斥锁切换为 Loom 实现以穷举调度交错。"]

pub mod config;
pub mod error;
pub mod gate;
pub mod initializer;
pub mod observability;
pub mod operation;
pub mod queue;
pub mod service;

pub use config::{ConfigError, StartupConfig};
pub use error::{DispatchError, InitError};
pub use gate::{ReadinessGate, ReadinessState};
pub use initializer::{InitHandle, Initializer, ReplayFailure, ReplayReport, Setup};
pub use observability::{DispatchStats, StatsSnapshot};
pub use operation::{FnOperation, Operation, from_fn};
pub use queue::{Admission, Drained, PendingEntry, PendingQueue};
pub use service::{DeferredService, Dispatch};
