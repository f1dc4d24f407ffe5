//! Transport Abstraction
//!
//! The protocol stack that frames and moves BACnet messages is treated as a
//! black box. The discovery engine sends through [`Transport`] and receives
//! every inbound exchange as a [`Delivery`] on a single channel.
//!
//! # Delivery
//!
//! A transport is constructed with a [`DeliverySender`]. It pushes:
//! - `Delivery::Announcement` for every I-Am it receives
//! - `Delivery::Completion` once per confirmed request it was asked to send,
//!   whether it succeeded, was rejected/aborted, or timed out

mod sim;

#[cfg(test)]
pub(crate) mod recording;

pub use sim::{CatalogEncoding, SimulatedDevice, SimulatedNetwork};

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::bacnet::{IAmAnnouncement, OutgoingMessage, ReadPropertyAck};
use crate::error::DiscoveryResult;

// ─────────────────────────────────────────────────────────────────────────────
// Request Token
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque handle the transport returns for a unicast request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(Uuid);

impl RequestToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Deliveries
// ─────────────────────────────────────────────────────────────────────────────

/// Why a confirmed request did not produce an ACK
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestFailure {
    #[error("error response: {0}")]
    Error(String),

    #[error("rejected (reason {0})")]
    Reject(u8),

    #[error("aborted (reason {0})")]
    Abort(u8),

    #[error("timed out")]
    Timeout,
}

/// The end of one confirmed exchange
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub token: RequestToken,
    pub outcome: Result<ReadPropertyAck, RequestFailure>,
}

/// Inbound traffic pushed by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Announcement(IAmAnnouncement),
    Completion(Completion),
}

pub type DeliverySender = mpsc::UnboundedSender<Delivery>;
pub type DeliveryReceiver = mpsc::UnboundedReceiver<Delivery>;

/// Create the channel a transport delivers inbound traffic on
pub fn delivery_channel() -> (DeliverySender, DeliveryReceiver) {
    mpsc::unbounded_channel()
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Sending side of the protocol stack
///
/// Both methods are fire-and-forget: they return once the message has been
/// handed off, never waiting for a reply.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send an unconfirmed message to every device on the network
    async fn send_broadcast(&self, message: OutgoingMessage) -> DiscoveryResult<()>;

    /// Send a message to one device, returning the token its completion will carry
    async fn send_unicast(&self, address: &str, message: OutgoingMessage) -> DiscoveryResult<RequestToken>;
}
