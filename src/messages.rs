use serde_derive::Serialize;

/// Lifecycle events reported by the device stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    Connected,
    AttributeAcknowledged { packet_id: u16 },
    ConnectionLost { reason: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct EndpointDescriptor {
    pub name: String,
    pub endpoint: u16,
    pub device_type: u16,
    pub sensor_type: u8,
    pub sensor_type_bitmap: u8,
}

#[derive(Clone, Debug, Serialize)]
pub struct OccupancyReport {
    pub endpoint: u16,
    pub occupied: bool,
}
