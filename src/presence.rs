use std::time::Duration;

use log::{error, info, trace, warn};
use thiserror::Error;

use crate::device::{DeviceEventHandler, DeviceStack, EndpointHandle, NodeHandle, StackError};
use crate::sensor::{PresenceSensor, SensorError};
use crate::store::{KvStore, StoreError, init_store};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to initialize store: {0}")]
    Store(#[source] StoreError),
    #[error("failed to create node: {0}")]
    Node(#[source] StackError),
    #[error("failed to initialize presence sensor: {0}")]
    Sensor(#[source] SensorError),
    #[error("failed to create occupancy endpoint: {0}")]
    Endpoint(#[source] StackError),
    #[error("failed to start device stack: {0}")]
    Stack(#[source] StackError),
}

/// Brings up the store, the node and the occupancy endpoint, in that order.
pub fn start_device<K, S, D>(
    store: &mut K,
    sensor: S,
    mut stack: D,
    name: &str,
    handler: Box<dyn DeviceEventHandler + Send>,
) -> Result<PresenceSync<S, D>, StartupError>
where
    K: KvStore,
    S: PresenceSensor,
    D: DeviceStack,
{
    init_store(store).map_err(StartupError::Store)?;
    let node = stack.create_node().map_err(StartupError::Node)?;
    PresenceSync::initialize(sensor, stack, &node, name, handler)
}

/// Mirrors the sensor's presence reading onto the occupancy attribute of one endpoint,
/// writing the attribute only when the reading changes.
pub struct PresenceSync<S, D> {
    sensor: S,
    stack: D,
    endpoint: EndpointHandle,
    present: bool,
}

impl<S: PresenceSensor, D: DeviceStack> PresenceSync<S, D> {
    pub fn initialize(
        mut sensor: S,
        mut stack: D,
        node: &NodeHandle,
        name: &str,
        handler: Box<dyn DeviceEventHandler + Send>,
    ) -> Result<Self, StartupError> {
        sensor.init().map_err(StartupError::Sensor)?;

        let endpoint = stack
            .create_occupancy_endpoint(node, name)
            .map_err(StartupError::Endpoint)?;

        stack.start(handler).map_err(StartupError::Stack)?;

        Ok(PresenceSync {
            sensor,
            stack,
            endpoint,
            present: false,
        })
    }

    pub fn endpoint(&self) -> EndpointHandle {
        self.endpoint
    }

    /// Runs one poll-compare-update cycle. Returns the new value if occupancy changed.
    pub fn tick(&mut self) -> Option<bool> {
        if let Err(err) = self.sensor.poll() {
            warn!("Failed to poll presence sensor: {}", err);
            return None;
        }

        let present = self.sensor.is_present();
        if present == self.present {
            trace!("Occupancy unchanged ({})", present);
            return None;
        }

        // Committed even if the write fails; the next transition rewrites the attribute.
        self.present = present;
        if let Err(err) = self.stack.set_occupancy(self.endpoint, present) {
            error!(
                "Failed to update occupancy on endpoint {}: {}",
                self.endpoint, err
            );
        }

        if present {
            info!("Occupancy detected");
        } else {
            info!("Occupancy cleared");
        }
        Some(present)
    }

    pub async fn run_loop(&mut self, period: Duration) {
        loop {
            self.tick();
            tokio::time::sleep(period).await;
        }
    }
}
