//! Request Correlator
//!
//! Issues object-list reads and matches their completions back to the device
//! that was asked. Completions are keyed by the token the transport returned;
//! a successful ACK is attributed by its source address, the same way the
//! device was last heard from.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::catalog::decode_object_list;
use super::registry::{AttachOutcome, DeviceRegistry};
use super::types::PendingRequest;
use crate::bacnet::{ObjectType, OutgoingMessage, PropertyIdentifier, ReadPropertyRequest};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::transport::{Completion, RequestFailure, RequestToken, Transport};

/// What happened to one completion
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// No pending request carries this token
    UnknownToken,
    /// The request failed; the device's catalog is left as it was
    Failed { device_id: u32, failure: RequestFailure },
    /// No device is known at the ACK's source address
    Unresolved { address: String },
    /// The ACK is not a whole device object-list
    UnexpectedShape { device_id: u32 },
    /// The catalog could not be decoded at all
    DecodeFailed { device_id: u32, error: DiscoveryError },
    /// The device was removed before the ACK arrived
    DeviceVanished { device_id: u32 },
    Attached { device_id: u32, count: usize },
}

/// Correlates object-list reads with their completions
pub struct RequestCorrelator {
    registry: Arc<DeviceRegistry>,
    transport: Arc<dyn Transport>,
    pending: DashMap<RequestToken, PendingRequest>,
}

impl RequestCorrelator {
    pub fn new(registry: Arc<DeviceRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
            pending: DashMap::new(),
        }
    }

    /// Ask a known device for its object list
    ///
    /// Nothing is sent for an unknown device. A failed send leaves no
    /// pending entry behind.
    pub async fn issue_read(&self, device_id: u32) -> DiscoveryResult<PendingRequest> {
        let device = self
            .registry
            .get(device_id)
            .ok_or(DiscoveryError::DeviceNotFound(device_id))?;

        let message = OutgoingMessage::ReadProperty(ReadPropertyRequest::object_list(device_id));
        let request_token = self.transport.send_unicast(&device.address, message).await?;

        let request = PendingRequest {
            device_id,
            issued_at: Utc::now(),
            request_token,
        };
        self.pending.insert(request_token, request.clone());

        debug!(device_id, address = %device.address, token = %request_token, "Object-list read issued");
        Ok(request)
    }

    /// Consume one completion
    pub fn on_response(&self, completion: Completion) -> ResponseOutcome {
        let Some((token, request)) = self.pending.remove(&completion.token) else {
            debug!(token = %completion.token, "Completion for unknown request ignored");
            return ResponseOutcome::UnknownToken;
        };

        let ack = match completion.outcome {
            Ok(ack) => ack,
            Err(failure) => {
                warn!(device_id = request.device_id, token = %token, error = %failure, "Object-list read failed");
                return ResponseOutcome::Failed {
                    device_id: request.device_id,
                    failure,
                };
            }
        };

        let Some(device) = self.registry.find_by_address(&ack.source_address) else {
            debug!(address = %ack.source_address, token = %token, "No device known at response address");
            return ResponseOutcome::Unresolved {
                address: ack.source_address,
            };
        };
        let device_id = device.device_id;

        if device_id != request.device_id {
            debug!(
                device_id,
                requested = request.device_id,
                address = %ack.source_address,
                "Response attributed by address to a different device"
            );
        }

        if ack.object_identifier.object_type != ObjectType::Device
            || ack.property_identifier != PropertyIdentifier::ObjectList
            || ack.array_index.is_some()
        {
            debug!(
                device_id,
                object = %ack.object_identifier,
                property = %ack.property_identifier,
                array_index = ?ack.array_index,
                "Ignoring response that is not a device object-list"
            );
            return ResponseOutcome::UnexpectedShape { device_id };
        }

        let points = match decode_object_list(&ack.value) {
            Ok(points) => points,
            Err(error) => {
                warn!(device_id, error = %error, "Failed to decode object-list");
                return ResponseOutcome::DecodeFailed { device_id, error };
            }
        };

        match self.registry.attach_points(device_id, points) {
            AttachOutcome::Attached { count } => {
                info!(device_id, points = count, "Point catalog attached");
                ResponseOutcome::Attached { device_id, count }
            }
            AttachOutcome::NotFound => {
                debug!(device_id, "Device removed before its catalog arrived");
                ResponseOutcome::DeviceVanished { device_id }
            }
        }
    }

    /// Number of reads awaiting completion
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Reads issued more than `max_age` before `now`
    pub fn stale_requests(&self, max_age: Duration, now: DateTime<Utc>) -> Vec<PendingRequest> {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let mut stale: Vec<_> = self
            .pending
            .iter()
            .filter(|entry| now.signed_duration_since(entry.issued_at) > max_age)
            .map(|entry| entry.value().clone())
            .collect();
        stale.sort_by_key(|request| request.issued_at);
        stale
    }

    /// Drop every pending read; later completions become unknown tokens
    pub fn clear_pending(&self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }
}
