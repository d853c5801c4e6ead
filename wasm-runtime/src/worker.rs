//! Relay worker: a dedicated thread that owns one relay and its module.
//!
//! Callers post [`InboundMessage`]s through a [`RelayHandle`] and get one
//! [`OutboundMessage`] back per request. Requests are served strictly in
//! arrival order, one at a time; the next request is not looked at until
//! the previous reply has been sent.

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::module::GuestModule;
use crate::readiness::ModuleSlot;
use crate::relay::Relay;
use blurworker_shared::{InboundMessage, OutboundMessage};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Reply = oneshot::Sender<Result<OutboundMessage, RelayError>>;

/// Name given to worker threads
pub const WORKER_THREAD_NAME: &str = "relay-worker";

/// Sending side of a running relay worker.
pub struct RelayHandle {
    tx: mpsc::Sender<(InboundMessage, Reply)>,
    thread: JoinHandle<()>,
}

pub struct RelayWorker;

impl RelayWorker {
    /// Start a worker thread.
    ///
    /// `loader` runs on the worker's blocking pool; requests posted before it
    /// finishes wait for it.
    pub fn spawn<M, F>(config: RelayConfig, loader: F) -> Result<RelayHandle, RelayError>
    where
        M: GuestModule + 'static,
        F: FnOnce() -> anyhow::Result<M> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<(InboundMessage, Reply)>(config.queue_capacity);

        let thread = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to start relay worker runtime: {}", e);
                        return;
                    }
                };

                runtime.block_on(async move {
                    let slot = ModuleSlot::spawn_loader(loader);
                    let mut relay = Relay::new(slot, &config);

                    while let Some((msg, reply)) = rx.recv().await {
                        let response = relay.handle(msg).await;
                        if reply.send(response).is_err() {
                            debug!("Caller went away before the reply was sent");
                        }
                    }

                    debug!("Relay worker stopping after {} requests", relay.handled());
                });

                // Don't wait on a loader that may never finish
                runtime.shutdown_background();
            })?;

        Ok(RelayHandle { tx, thread })
    }
}

impl RelayHandle {
    /// Send one request and wait for its reply.
    pub async fn post(&self, msg: InboundMessage) -> Result<OutboundMessage, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((msg, reply_tx))
            .await
            .map_err(|_| RelayError::WorkerStopped)?;
        reply_rx.await.map_err(|_| RelayError::WorkerStopped)?
    }

    /// Blocking form of [`post`](Self::post) for callers outside a runtime.
    pub fn post_blocking(&self, msg: InboundMessage) -> Result<OutboundMessage, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .blocking_send((msg, reply_tx))
            .map_err(|_| RelayError::WorkerStopped)?;
        reply_rx
            .blocking_recv()
            .map_err(|_| RelayError::WorkerStopped)?
    }

    /// Stop accepting requests and wait for the worker thread to exit.
    ///
    /// A request still waiting on an unready module keeps the worker alive.
    pub fn shutdown(self) -> Result<(), RelayError> {
        let RelayHandle { tx, thread } = self;
        drop(tx);
        thread.join().map_err(|_| RelayError::WorkerPanicked)
    }
}
