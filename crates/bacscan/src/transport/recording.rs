//! Recording transport for tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{RequestToken, Transport};
use crate::bacnet::OutgoingMessage;
use crate::error::{DiscoveryError, DiscoveryResult};

#[derive(Debug, Clone)]
pub(crate) struct UnicastRecord {
    pub address: String,
    pub message: OutgoingMessage,
    /// `None` when the send was made to fail
    pub token: Option<RequestToken>,
}

/// Records every send attempt; can be switched to fail all sends
#[derive(Default)]
pub(crate) struct RecordingTransport {
    broadcasts: Mutex<Vec<(Instant, OutgoingMessage)>>,
    unicasts: Mutex<Vec<UnicastRecord>>,
    fail_sends: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let transport = Self::new();
        transport.set_failing(true);
        transport
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    pub fn broadcasts(&self) -> Vec<(Instant, OutgoingMessage)> {
        self.broadcasts.lock().clone()
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().len()
    }

    pub fn unicasts(&self) -> Vec<UnicastRecord> {
        self.unicasts.lock().clone()
    }

    pub fn unicast_count(&self) -> usize {
        self.unicasts.lock().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_broadcast(&self, message: OutgoingMessage) -> DiscoveryResult<()> {
        self.broadcasts.lock().push((Instant::now(), message));
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Transport("network unreachable".into()));
        }
        Ok(())
    }

    async fn send_unicast(&self, address: &str, message: OutgoingMessage) -> DiscoveryResult<RequestToken> {
        let failing = self.fail_sends.load(Ordering::SeqCst);
        let token = (!failing).then(RequestToken::new);
        self.unicasts.lock().push(UnicastRecord {
            address: address.to_string(),
            message,
            token,
        });
        token.ok_or_else(|| DiscoveryError::Transport("network unreachable".into()))
    }
}
