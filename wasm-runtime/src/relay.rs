//! Request relay: moves one inbound message into the module and reports back.

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::module::GuestModule;
use crate::readiness::{wait_for, ModuleSlot};
use blurworker_shared::utils::time::elapsed_ms;
use blurworker_shared::{encode_c_string, InboundMessage, ModuleResult, OutboundMessage};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Serves requests against a single module, one at a time.
pub struct Relay<M> {
    slot: ModuleSlot<M>,
    poll_interval: Duration,
    handled: u64,
}

impl<M: GuestModule + 'static> Relay<M> {
    pub fn new(slot: ModuleSlot<M>, config: &RelayConfig) -> Self {
        Self::with_poll_interval(slot, config.poll_interval())
    }

    pub fn with_poll_interval(slot: ModuleSlot<M>, poll_interval: Duration) -> Self {
        Self {
            slot,
            poll_interval,
            handled: 0,
        }
    }

    /// Number of requests that reached the module's entry point
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Relay one request.
    ///
    /// Waits for the module without a timeout, transfers the argument string
    /// (NUL-terminated) and the payload, calls the entry point exactly once
    /// and returns its raw result, decoded where possible, with the elapsed
    /// time. Transferred buffers are released by the module, never here.
    pub async fn handle(&mut self, msg: InboundMessage) -> Result<OutboundMessage, RelayError> {
        let start = Instant::now();
        let InboundMessage { payload, args } = msg;
        let args_buf = encode_c_string(&args);

        let module = self.slot.get().await?;
        wait_for(|| module.is_ready(), self.poll_interval).await;

        let args_ptr = module
            .transfer(&args_buf)
            .map_err(|e| RelayError::guest("transfer arguments", e))?;
        let payload_ptr = module
            .transfer(&payload)
            .map_err(|e| RelayError::guest("transfer payload", e))?;
        debug!(
            args_addr = args_ptr.addr(),
            payload_addr = payload_ptr.addr(),
            payload_len = payload_ptr.len(),
            "Buffers transferred to module"
        );

        let raw = module
            .invoke(args_ptr, payload_ptr)
            .map_err(|e| RelayError::guest("run entry point", e))?;
        self.handled += 1;

        // The module already ran; whatever it returned still goes back
        let result = module.read_result(raw).unwrap_or_else(|e| {
            warn!("Return value {} is not a readable output record: {:#}", raw, e);
            ModuleResult::Unreadable(raw)
        });

        let elapsed_ms = elapsed_ms(start);
        info!("Relay time: {:.3} ms", elapsed_ms);

        Ok(OutboundMessage {
            raw,
            result,
            elapsed_ms,
        })
    }
}
