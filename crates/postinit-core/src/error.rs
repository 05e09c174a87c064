//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义调用路径与初始化路径的错误语义；
//! - 所有错误均以值的形式返回给直接调用方，核心逻辑中不存在 panic 或中止。
//!
//! ## 错误分类（What）
//! - [`DispatchError::NotInitialized`]：`strict` 在未就绪时快速失败，可恢复（稍后重试或改用 `deferred`）；
//! - [`DispatchError::Operation`]：同步执行时底层操作的失败，原样透传；
//! - [`InitError`]：初始化失败对服务是终局性的，服务将永久停留在 `NotReady`，不会自动重试。
use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// 调用路径上的错误。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“门闩拒绝”与“操作本身失败”，便于调用方选择重试或告警；
/// - **契约 (What)**：`Operation` 仅在同步执行（`strict` 或就绪后的 `deferred`）时出现；
///   已排队条目在回放时的失败不会经由原调用返回，而是记录在 [`ReplayReport`](crate::ReplayReport) 中。
#[derive(Debug, Error)]
pub enum DispatchError<E> {
    #[error("service instance not initialized")]
    NotInitialized,
    #[error("operation failed: {0}")]
    Operation(#[source] E),
}

impl<E> DispatchError<E> {
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized)
    }

    /// 取出底层操作错误；门闩拒绝时返回 `None`。
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::NotInitialized => None,
            Self::Operation(err) => Some(err),
        }
    }
}

/// 初始化路径上的错误。
#[derive(Debug, Error)]
pub enum InitError {
    /// 初始化步骤返回失败；门闩保持 `NotReady`。
    #[error("initialization setup failed: {0}")]
    Setup(#[source] Box<dyn StdError + Send + Sync + 'static>),
    /// 无法创建初始化线程；初始化步骤从未执行。
    #[error("failed to spawn initializer thread: {0}")]
    Spawn(#[source] io::Error),
    /// 初始化线程在执行过程中 panic。
    #[error("initializer thread panicked")]
    Panicked,
}

impl InitError {
    pub(crate) fn setup<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Setup(Box::new(err))
    }
}
