use std::fmt;
use std::num::NonZeroU16;

use log::debug;
use thiserror::Error;

use crate::messages::DeviceEvent;

/// Matter device type id for an occupancy sensor.
pub const OCCUPANCY_SENSOR_DEVICE_TYPE: u16 = 0x0107;

/// Occupancy sensing type and type bitmap advertised for the radar endpoint.
pub const OCCUPANCY_SENSOR_TYPE: u8 = 4;
pub const OCCUPANCY_SENSOR_TYPE_BITMAP: u8 = 1 << 2;

#[derive(Debug, Error)]
pub enum StackError {
    #[error("node {0:?} does not belong to this device stack")]
    InvalidNode(String),
    #[error("no endpoint ids left on node")]
    EndpointsExhausted,
    #[error("unknown endpoint {0}")]
    UnknownEndpoint(EndpointHandle),
    #[error("device stack already started")]
    AlreadyStarted,
    #[error("failed to serialize payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("failed to publish: {0}")]
    Publish(#[from] rumqttc::ClientError),
}

/// A node created by a [`DeviceStack`]. Endpoints hang off a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    id: String,
}

impl NodeHandle {
    pub fn new(id: impl Into<String>) -> Self {
        NodeHandle { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Identifies one endpoint on a node. Id zero is never a valid endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointHandle(NonZeroU16);

impl EndpointHandle {
    pub fn new(id: u16) -> Option<Self> {
        NonZeroU16::new(id).map(EndpointHandle)
    }

    pub fn id(self) -> u16 {
        self.0.get()
    }
}

impl fmt::Display for EndpointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait DeviceEventHandler {
    fn on_event(&self, event: &DeviceEvent) {
        debug!("Received device event: {:?}", event);
    }
}

/// Handler that only logs what the stack reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventHandler;

impl DeviceEventHandler for LoggingEventHandler {}

/// The smart-home stack the occupancy endpoint is published through.
pub trait DeviceStack {
    fn create_node(&mut self) -> Result<NodeHandle, StackError>;

    fn create_occupancy_endpoint(
        &mut self,
        node: &NodeHandle,
        name: &str,
    ) -> Result<EndpointHandle, StackError>;

    fn set_occupancy(&self, endpoint: EndpointHandle, occupied: bool) -> Result<(), StackError>;

    /// Begins stack operation. May only be called once.
    fn start(&mut self, handler: Box<dyn DeviceEventHandler + Send>) -> Result<(), StackError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_endpoint_is_invalid() {
        assert!(EndpointHandle::new(0).is_none());
        assert_eq!(EndpointHandle::new(7).map(EndpointHandle::id), Some(7));
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint = EndpointHandle::new(12).unwrap();
        assert_eq!(endpoint.to_string(), "12");
    }
}
