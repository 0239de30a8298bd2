use std::{future::Future, sync::Arc};

use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

/// Runs upstream futures to completion from synchronous state access.
///
/// This is the only point where execution may suspend. Either an ambient multi-threaded
/// runtime is borrowed through its [`Handle`] (the calling worker is moved out of the
/// scheduler with `block_in_place`), or the bridge owns a runtime of its own. An owned runtime
/// cannot be blocked on from inside a current-thread runtime, so it is then driven from a
/// helper thread.
///
/// Upstream connections are bound to the runtime that opened them. Futures that open
/// connections from async code go through [`BlockingBridge::run`] so that they land on the
/// same runtime as the blocking fetches.
#[derive(Debug, Clone)]
pub enum BlockingBridge {
    /// A handle to a multi-threaded runtime the caller is running on.
    Handle(Handle),
    /// A runtime owned by the bridge, for callers without a multi-threaded runtime.
    Runtime(Arc<OwnedRuntime>),
}

/// A runtime owned by a [`BlockingBridge`]. It shuts down in the background when the last
/// bridge is dropped, which is allowed from async code.
#[derive(Debug)]
pub struct OwnedRuntime {
    handle: Handle,
    runtime: Option<Runtime>,
}

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl BlockingBridge {
    /// Borrows the current runtime if it is multi-threaded.
    pub fn current() -> Option<Self> {
        Handle::try_current()
            .ok()
            .filter(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread)
            .map(Self::Handle)
    }

    /// Creates a bridge owning a new multi-threaded runtime.
    pub fn new_runtime() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
        let handle = runtime.handle().clone();
        Ok(Self::Runtime(Arc::new(OwnedRuntime { handle, runtime: Some(runtime) })))
    }

    /// Borrows the current runtime, or creates one when there is none.
    pub fn current_or_new() -> std::io::Result<Self> {
        match Self::current() {
            Some(bridge) => Ok(bridge),
            None => Self::new_runtime(),
        }
    }

    /// Blocks the current thread on `future`.
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send,
        F::Output: Send,
    {
        match self {
            Self::Handle(handle) => tokio::task::block_in_place(|| handle.block_on(future)),
            Self::Runtime(owned) => match Handle::try_current().map(|h| h.runtime_flavor()) {
                Ok(RuntimeFlavor::MultiThread) => {
                    tokio::task::block_in_place(|| owned.handle.block_on(future))
                }
                Ok(_) => std::thread::scope(|scope| {
                    scope
                        .spawn(|| owned.handle.block_on(future))
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                }),
                Err(_) => owned.handle.block_on(future),
            },
        }
    }

    /// Awaits `future` on the bridged runtime.
    pub async fn run<F>(&self, future: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match self {
            Self::Handle(_) => future.await,
            Self::Runtime(owned) => match owned.handle.spawn(future).await {
                Ok(output) => output,
                Err(err) => std::panic::resume_unwind(
                    err.try_into_panic().unwrap_or_else(|err| Box::new(err)),
                ),
            },
        }
    }

    /// Spawns a task on the bridged runtime.
    pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match self {
            Self::Handle(handle) => handle.spawn(future),
            Self::Runtime(owned) => owned.handle.spawn(future),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_runtime_outside_async_context() {
        assert!(BlockingBridge::current().is_none());
        let bridge = BlockingBridge::new_runtime().unwrap();
        assert_eq!(bridge.block_on(async { 7 }), 7);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_borrowed_handle_inside_runtime() {
        let bridge = BlockingBridge::current().unwrap();
        assert_eq!(bridge.block_on(async { 7 }), 7);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_current_thread_runtime_is_not_borrowed() {
        assert!(BlockingBridge::current().is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_owned_runtime_inside_current_thread_runtime() {
        let bridge = BlockingBridge::current_or_new().unwrap();
        assert!(matches!(bridge, BlockingBridge::Runtime(_)));
        assert_eq!(bridge.block_on(async { 7 }), 7);
        assert_eq!(bridge.run(async { 8 }).await, 8);
    }
}
