//! bacscan - BACnet device discovery
//!
//! This crate provides the discovery-and-correlation engine:
//! - Periodic Who-Is probes and status reports
//! - Device presence tracking from I-Am announcements
//! - Object-list reads correlated back to devices by source address
//! - Decoding of object-list values into a point catalog

// Error types
pub mod error;

// Configuration loading
pub mod config;

// BACnet value and message types
pub mod bacnet;

// Transport abstraction and the in-memory simulated network
pub mod transport;

// Discovery engine
pub mod discovery;

pub use error::{DiscoveryError, DiscoveryResult};
