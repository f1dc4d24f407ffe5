//! Discovery Engine
//!
//! Finds BACnet devices with periodic Who-Is probes, tracks them from their
//! I-Am announcements, and reads each device's object list into a point
//! catalog.
//!
//! # Flow
//!
//! ```text
//! scheduler ──Who-Is──▶ transport ──I-Am──▶ presence ──upsert──▶ registry
//!                                              │
//!                                          issue_read
//!                                              ▼
//!                       transport ◀─ReadProperty─ correlator
//!                           │                      ▲
//!                           └──────completion──────┘──attach_points──▶ registry
//! ```

mod catalog;
mod correlator;
mod presence;
mod registry;
mod report;
mod scheduler;
mod service;
mod types;

pub use catalog::{decode_object_list, object_reference};
pub use correlator::{RequestCorrelator, ResponseOutcome};
pub use presence::{PresenceHandler, PresenceOutcome};
pub use registry::{AttachOutcome, DeviceRegistry, DeviceUpdate};
pub use report::{DeviceStatus, StatusReport, StatusSink, TracingSink};
pub use scheduler::{DiscoveryScheduler, SchedulerConfig, SchedulerState};
pub use service::DiscoveryService;
pub use types::{Device, DeviceFields, PendingRequest, Point};
