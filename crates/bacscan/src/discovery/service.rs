//! Discovery Service
//!
//! Wires the registry, correlator, presence handler and scheduler together
//! and owns the single task that consumes transport deliveries.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::correlator::RequestCorrelator;
use super::presence::PresenceHandler;
use super::registry::DeviceRegistry;
use super::report::StatusSink;
use super::scheduler::{DiscoveryScheduler, SchedulerState};
use super::types::{Device, PendingRequest};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::transport::{Delivery, DeliveryReceiver, Transport};

pub struct DiscoveryService {
    registry: Arc<DeviceRegistry>,
    correlator: Arc<RequestCorrelator>,
    presence: Arc<PresenceHandler>,
    scheduler: DiscoveryScheduler,
    probe_on_start: bool,
    deliveries: Mutex<Option<DeliveryReceiver>>,
    shutdown_tx: broadcast::Sender<()>,
    delivery_task: Mutex<Option<JoinHandle<()>>>,
}

impl DiscoveryService {
    /// Build a service around a transport and the receiving end of its delivery channel
    pub fn new(
        config: &DiscoveryConfig,
        transport: Arc<dyn Transport>,
        deliveries: DeliveryReceiver,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let correlator = Arc::new(RequestCorrelator::new(Arc::clone(&registry), Arc::clone(&transport)));
        let presence = Arc::new(PresenceHandler::new(
            Arc::clone(&registry),
            Arc::clone(&correlator),
            Some(config.local_device.object_identifier),
        ));
        let scheduler = DiscoveryScheduler::new(config.scheduler_config(), transport, Arc::clone(&registry), sink);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            registry,
            correlator,
            presence,
            scheduler,
            probe_on_start: config.probe_on_start,
            deliveries: Mutex::new(Some(deliveries)),
            shutdown_tx,
            delivery_task: Mutex::new(None),
        }
    }

    /// Start consuming deliveries and run the timers
    pub async fn start(&self) -> DiscoveryResult<()> {
        self.scheduler.start()?;

        let deliveries = self
            .deliveries
            .lock()
            .take()
            .ok_or(DiscoveryError::AlreadyRunning)?;
        let task = tokio::spawn(delivery_loop(
            deliveries,
            Arc::clone(&self.presence),
            Arc::clone(&self.correlator),
            self.shutdown_tx.subscribe(),
        ));
        *self.delivery_task.lock() = Some(task);

        info!("Discovery service started");

        if self.probe_on_start {
            if let Err(e) = self.scheduler.trigger_probe_now().await {
                warn!(error = %e, "Initial Who-Is failed");
            }
        }
        Ok(())
    }

    /// Broadcast a Who-Is now
    pub async fn discover_now(&self) -> DiscoveryResult<()> {
        self.scheduler.trigger_probe_now().await
    }

    /// Re-read one device's object list
    pub async fn read_points(&self, device_id: u32) -> DiscoveryResult<PendingRequest> {
        if self.scheduler.state() == SchedulerState::Stopped {
            return Err(DiscoveryError::SchedulerStopped);
        }
        self.correlator.issue_read(device_id).await
    }

    /// Forget every device and in-flight read; returns the number of devices removed
    pub fn clear(&self) -> usize {
        let pending = self.correlator.clear_pending();
        let devices = self.registry.clear();
        info!(devices, pending, "Registry cleared");
        devices
    }

    pub fn snapshot(&self) -> Vec<Device> {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn pending_reads(&self) -> usize {
        self.correlator.pending_count()
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Stop timers and the delivery loop, then drop outstanding reads
    pub async fn stop(&self) {
        self.scheduler.stop();
        let _ = self.shutdown_tx.send(());
        self.scheduler.join().await;

        let task = self.delivery_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Delivery loop ended abnormally");
            }
        }

        let dropped = self.correlator.clear_pending();
        info!(dropped_reads = dropped, "Discovery service stopped");
    }
}

async fn delivery_loop(
    mut deliveries: DeliveryReceiver,
    presence: Arc<PresenceHandler>,
    correlator: Arc<RequestCorrelator>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            delivery = deliveries.recv() => match delivery {
                Some(Delivery::Announcement(announcement)) => {
                    presence.on_presence_announcement(announcement).await;
                }
                Some(Delivery::Completion(completion)) => {
                    let outcome = correlator.on_response(completion);
                    debug!(outcome = ?outcome, "Completion handled");
                }
                None => {
                    info!("Delivery channel closed");
                    break;
                }
            },
            _ = shutdown.recv() => {
                debug!("Delivery loop shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio_test::assert_ok;

    use crate::bacnet::{ObjectIdentifier, ObjectType};
    use crate::discovery::report::TracingSink;
    use crate::transport::{CatalogEncoding, SimulatedDevice, SimulatedNetwork, delivery_channel};

    fn service_with(devices: Vec<SimulatedDevice>, config: DiscoveryConfig) -> (DiscoveryService, Arc<SimulatedNetwork>) {
        let (tx, rx) = delivery_channel();
        let network = Arc::new(SimulatedNetwork::new(devices, tx));
        let service = DiscoveryService::new(&config, network.clone(), rx, Arc::new(TracingSink));
        (service, network)
    }

    /// Let the delivery loop drain everything queued so far
    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_discovery() {
        let (service, _) = service_with(SimulatedDevice::demo_fleet(3), DiscoveryConfig::default());

        assert_ok!(service.start().await);
        settle().await;

        let devices = service.snapshot();
        assert_eq!(devices.len(), 3);
        for device in &devices {
            assert!(device.points_read, "device {} not cataloged", device.device_id);
            assert_eq!(device.points.len(), 7);
            assert_eq!(device.points[0].identifier(), format!("device:{}", device.device_id));
        }
        assert_eq!(devices[1].points[1].identifier(), "analog-input:1");
        assert_eq!(service.pending_reads(), 0);

        service.stop().await;
        assert_eq!(service.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_device_found_on_next_probe() {
        let config = DiscoveryConfig {
            discovery_interval: 10,
            ..Default::default()
        };
        let (service, network) = service_with(vec![SimulatedDevice::new(1001, "10.0.0.1:47808")], config);

        service.start().await.unwrap();
        settle().await;
        assert_eq!(service.snapshot().len(), 1);

        network.add_device(
            SimulatedDevice::new(1002, "10.0.0.2:47808")
                .with_objects(vec![ObjectIdentifier::new(ObjectType::AnalogValue, 4).unwrap()])
                .with_encoding(CatalogEncoding::Array, true),
        );
        tokio::time::sleep(Duration::from_secs(11)).await;
        settle().await;

        let device = service.registry().get(1002).unwrap();
        assert!(device.points_read);
        assert_eq!(device.points.len(), 2);
        assert_eq!(device.points[1].identifier(), "analog-value:4");

        service.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_initial_probe_when_disabled() {
        let config = DiscoveryConfig {
            probe_on_start: false,
            ..Default::default()
        };
        let (service, _) = service_with(SimulatedDevice::demo_fleet(2), config);

        service.start().await.unwrap();
        settle().await;
        assert!(service.snapshot().is_empty());

        service.discover_now().await.unwrap();
        settle().await;
        assert_eq!(service.snapshot().len(), 2);

        service.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_device_not_registered() {
        let mut config = DiscoveryConfig::default();
        config.local_device.object_identifier = 1001;
        let (service, _) = service_with(SimulatedDevice::demo_fleet(2), config);

        service.start().await.unwrap();
        settle().await;

        let ids: Vec<_> = service.snapshot().iter().map(|d| d.device_id).collect();
        assert_eq!(ids, vec![1002]);
        service.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_points_and_clear() {
        let (service, network) = service_with(SimulatedDevice::demo_fleet(1), DiscoveryConfig::default());
        service.start().await.unwrap();
        settle().await;

        assert_eq!(service.read_points(4242).await, Err(DiscoveryError::DeviceNotFound(4242)));

        network.remove_device(1001);
        service.read_points(1001).await.unwrap();
        settle().await;
        // The timeout leaves the earlier catalog in place
        assert!(service.registry().get(1001).unwrap().points_read);

        assert_eq!(service.clear(), 1);
        assert!(service.snapshot().is_empty());
        assert_eq!(service.pending_reads(), 0);

        service.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_service_refuses_work() {
        let (service, _) = service_with(SimulatedDevice::demo_fleet(1), DiscoveryConfig::default());
        service.start().await.unwrap();
        assert_eq!(service.start().await, Err(DiscoveryError::AlreadyRunning));

        service.stop().await;
        service.stop().await;
        assert_eq!(service.discover_now().await, Err(DiscoveryError::SchedulerStopped));
        assert_eq!(service.read_points(1001).await, Err(DiscoveryError::SchedulerStopped));
        assert_eq!(service.pending_reads(), 0);
    }
}
