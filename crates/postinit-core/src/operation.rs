//! 被门闩保护的底层操作契约。
//!
//! # 契约说明（What）
//! - [`Operation::execute`] 即外部协作方的 `Execute(payload) -> error`，被 `strict`、`deferred`
//!   以及回放三条路径共用；
//! - 核心层把它视为不透明的副作用调用，不做重试，也不解释错误内容；
//! - 实现必须 `Send + Sync`：同一实例会同时被调用方线程与初始化线程访问。
use core::fmt;
use core::marker::PhantomData;
use std::error::Error;

/// 底层操作（例如日志落盘）。
pub trait Operation: Send + Sync + 'static {
    /// 单次调用携带的载荷；未就绪时会被暂存到队列中。
    type Payload: Send + 'static;
    /// 操作失败时的错误，原样透传给同步调用方。
    type Error: Error + Send + Sync + 'static;

    fn execute(&self, payload: Self::Payload) -> Result<(), Self::Error>;
}

/// 将闭包适配为 [`Operation`]。
pub struct FnOperation<F, P, E> {
    func: F,
    _marker: PhantomData<fn(P) -> E>,
}

/// 以闭包构造 [`Operation`]，便于测试与轻量接入。
///
/// ```
/// use postinit_core::{DeferredService, from_fn};
///
/// let (service, _initializer) = DeferredService::new(from_fn(|line: String| {
///     println!("{line}");
///     Ok::<_, std::io::Error>(())
/// }));
/// assert!(service.strict("too early".to_owned()).is_err());
/// ```
pub fn from_fn<P, E, F>(func: F) -> FnOperation<F, P, E>
where
    F: Fn(P) -> Result<(), E>,
{
    FnOperation {
        func,
        _marker: PhantomData,
    }
}

impl<F, P, E> Operation for FnOperation<F, P, E>
where
    F: Fn(P) -> Result<(), E> + Send + Sync + 'static,
    P: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    type Payload = P;
    type Error = E;

    fn execute(&self, payload: P) -> Result<(), E> {
        (self.func)(payload)
    }
}

impl<F, P, E> fmt::Debug for FnOperation<F, P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation").finish_non_exhaustive()
    }
}
