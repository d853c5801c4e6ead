//! Waiting for a module to become usable.
//!
//! Readiness comes in two stages. A [`ModuleSlot`] resolves once the loader
//! hands over an instantiated module. After that, [`wait_for`] polls the
//! module's own readiness predicate on a fixed interval, yielding to the
//! runtime between checks instead of blocking the thread.

use crate::error::RelayError;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Resolve once `condition` returns true, re-checking every `interval`.
///
/// There is no timeout: if the condition never holds, neither does the future.
pub async fn wait_for<F>(mut condition: F, interval: Duration)
where
    F: FnMut() -> bool,
{
    let mut polls = 0u64;
    while !condition() {
        polls += 1;
        tokio::time::sleep(interval).await;
    }
    if polls > 0 {
        debug!("Module ready after {} polls", polls);
    }
}

/// Completion side of a pending [`ModuleSlot`], handed to the loader.
pub struct ModuleInit<M> {
    tx: oneshot::Sender<Result<M, String>>,
}

impl<M> ModuleInit<M> {
    /// Deliver the loader's outcome to the slot.
    pub fn complete(self, result: anyhow::Result<M>) {
        // The slot may already be gone if the worker shut down
        let _ = self.tx.send(result.map_err(|e| format!("{:#}", e)));
    }
}

enum SlotState<M> {
    Loading(oneshot::Receiver<Result<M, String>>),
    Ready(M),
    Failed(String),
}

/// Holds a module that may still be loading.
pub struct ModuleSlot<M> {
    state: SlotState<M>,
}

impl<M: Send + 'static> ModuleSlot<M> {
    /// A slot whose module is already available
    pub fn ready(module: M) -> Self {
        Self {
            state: SlotState::Ready(module),
        }
    }

    /// A slot that resolves when the returned [`ModuleInit`] completes.
    pub fn pending() -> (ModuleInit<M>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            ModuleInit { tx },
            Self {
                state: SlotState::Loading(rx),
            },
        )
    }

    /// Run `loader` on the blocking pool and resolve the slot with its result.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_loader<F>(loader: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<M> + Send + 'static,
    {
        let (init, slot) = Self::pending();
        tokio::task::spawn_blocking(move || init.complete(loader()));
        slot
    }

    /// Whether the loader has delivered a module
    pub fn is_loaded(&self) -> bool {
        matches!(self.state, SlotState::Ready(_))
    }

    /// Wait for the loader, then borrow the module.
    pub async fn get(&mut self) -> Result<&mut M, RelayError> {
        if let SlotState::Loading(rx) = &mut self.state {
            let outcome = rx.await;
            self.state = match outcome {
                Ok(Ok(module)) => SlotState::Ready(module),
                Ok(Err(reason)) => SlotState::Failed(reason),
                Err(_) => SlotState::Failed("module loader exited without a result".to_string()),
            };
        }

        match &mut self.state {
            SlotState::Ready(module) => Ok(module),
            SlotState::Failed(reason) => Err(RelayError::ModuleUnavailable(reason.clone())),
            SlotState::Loading(_) => unreachable!("loading slot resolved above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_wait_for_immediate() {
        let checks = AtomicU32::new(0);
        wait_for(
            || {
                checks.fetch_add(1, Ordering::SeqCst);
                true
            },
            Duration::from_millis(5),
        )
        .await;
        assert_eq!(checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_for_flag_set_later() {
        let flag = Arc::new(AtomicBool::new(false));
        let setter = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            setter.store(true, Ordering::SeqCst);
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            wait_for(|| flag.load(Ordering::SeqCst), Duration::from_millis(5)),
        )
        .await
        .expect("condition should be observed");
    }

    #[tokio::test]
    async fn test_wait_for_never_resolves() {
        let result = tokio::time::timeout(
            Duration::from_millis(30),
            wait_for(|| false, Duration::from_millis(5)),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_slot_resolves_from_loader() {
        let mut slot = ModuleSlot::spawn_loader(|| Ok(42u32));
        assert_eq!(*slot.get().await.unwrap(), 42);
        assert!(slot.is_loaded());
        // later calls reuse the module
        *slot.get().await.unwrap() += 1;
        assert_eq!(*slot.get().await.unwrap(), 43);
    }

    #[tokio::test]
    async fn test_slot_loader_failure() {
        let mut slot: ModuleSlot<u32> =
            ModuleSlot::spawn_loader(|| Err(anyhow::anyhow!("bad magic")));
        let err = slot.get().await.unwrap_err();
        assert!(matches!(err, RelayError::ModuleUnavailable(ref r) if r.contains("bad magic")));
    }

    #[tokio::test]
    async fn test_slot_dropped_init() {
        let (init, mut slot) = ModuleSlot::<u32>::pending();
        drop(init);
        assert!(matches!(
            slot.get().await,
            Err(RelayError::ModuleUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_slot_pending_until_complete() {
        let (init, mut slot) = ModuleSlot::<u32>::pending();
        assert!(!slot.is_loaded());

        let pending = tokio::time::timeout(Duration::from_millis(20), slot.get()).await;
        assert!(pending.is_err());

        init.complete(Ok(7));
        assert_eq!(*slot.get().await.unwrap(), 7);
    }
}
