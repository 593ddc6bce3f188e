use std::time::Duration;

use log::{debug, error, info};
use rumqttc::{Event, MqttOptions, Packet, QoS};

use crate::config;
use crate::device::{
    DeviceEventHandler, DeviceStack, EndpointHandle, NodeHandle, OCCUPANCY_SENSOR_DEVICE_TYPE,
    OCCUPANCY_SENSOR_TYPE, OCCUPANCY_SENSOR_TYPE_BITMAP, StackError,
};
use crate::messages::{DeviceEvent, EndpointDescriptor, OccupancyReport};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Device stack that exposes endpoints as retained MQTT topics.
pub struct MqttStack {
    client: rumqttc::AsyncClient,
    event_loop: Option<rumqttc::EventLoop>,
    node_id: String,
    topic_path: String,
    endpoints: Vec<EndpointHandle>,
}

impl MqttStack {
    pub fn new(config: &config::MqttConfig) -> Self {
        let publisher_id = config
            .publisher_id
            .as_ref()
            .unwrap_or(&"occupancy-bridge".to_string())
            .to_string();

        let mut mqttoptions = MqttOptions::new(
            publisher_id.clone(),
            config.host.clone(),
            config.port.unwrap_or(1883),
        );

        mqttoptions.set_keep_alive(Duration::from_secs(config.keep_alive_seconds.unwrap_or(5)));

        if let (Some(username), Some(password)) =
            (config.username.as_ref(), config.password.as_ref())
        {
            mqttoptions.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = rumqttc::AsyncClient::new(mqttoptions, 10);

        MqttStack {
            client,
            event_loop: Some(eventloop),
            node_id: sanitize_name(&publisher_id),
            topic_path: config
                .topic_path
                .clone()
                .unwrap_or("occupancy".to_string()),
            endpoints: Vec::new(),
        }
    }

    fn endpoint_topic(&self, endpoint: EndpointHandle, leaf: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.topic_path,
            self.node_id,
            endpoint.id(),
            leaf
        )
    }

    fn publish_retained<T: serde::Serialize>(
        &self,
        topic: String,
        payload: &T,
    ) -> Result<(), StackError> {
        let payload = serde_json::to_string(payload)?;
        debug!("Publishing {} to {}", payload, topic);
        self.client
            .try_publish(topic, QoS::AtLeastOnce, true, payload)?;
        Ok(())
    }
}

impl DeviceStack for MqttStack {
    fn create_node(&mut self) -> Result<NodeHandle, StackError> {
        info!("Created node {}", self.node_id);
        Ok(NodeHandle::new(self.node_id.clone()))
    }

    fn create_occupancy_endpoint(
        &mut self,
        node: &NodeHandle,
        name: &str,
    ) -> Result<EndpointHandle, StackError> {
        if node.id() != self.node_id {
            return Err(StackError::InvalidNode(node.id().to_string()));
        }

        let endpoint = u16::try_from(self.endpoints.len() + 1)
            .ok()
            .and_then(EndpointHandle::new)
            .ok_or(StackError::EndpointsExhausted)?;

        let descriptor = occupancy_descriptor(endpoint, name);
        self.publish_retained(self.endpoint_topic(endpoint, "config"), &descriptor)?;
        self.endpoints.push(endpoint);

        info!("Created occupancy endpoint {} ({})", endpoint, name);
        Ok(endpoint)
    }

    fn set_occupancy(&self, endpoint: EndpointHandle, occupied: bool) -> Result<(), StackError> {
        if !self.endpoints.contains(&endpoint) {
            return Err(StackError::UnknownEndpoint(endpoint));
        }

        let report = OccupancyReport {
            endpoint: endpoint.id(),
            occupied,
        };
        self.publish_retained(self.endpoint_topic(endpoint, "occupancy"), &report)
    }

    fn start(&mut self, handler: Box<dyn DeviceEventHandler + Send>) -> Result<(), StackError> {
        let eventloop = self.event_loop.take().ok_or(StackError::AlreadyStarted)?;
        tokio::task::spawn(event_loop(eventloop, handler));
        Ok(())
    }
}

async fn event_loop(
    mut eventloop: rumqttc::EventLoop,
    handler: Box<dyn DeviceEventHandler + Send>,
) {
    loop {
        match eventloop.poll().await {
            Ok(notification) => {
                if let Some(event) = device_event(&notification) {
                    handler.on_event(&event);
                }
            }
            Err(e) => {
                error!("Error polling MQTT event loop: {:?}", e);
                handler.on_event(&DeviceEvent::ConnectionLost {
                    reason: e.to_string(),
                });
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

fn occupancy_descriptor(endpoint: EndpointHandle, name: &str) -> EndpointDescriptor {
    EndpointDescriptor {
        name: name.to_string(),
        endpoint: endpoint.id(),
        device_type: OCCUPANCY_SENSOR_DEVICE_TYPE,
        sensor_type: OCCUPANCY_SENSOR_TYPE,
        sensor_type_bitmap: OCCUPANCY_SENSOR_TYPE_BITMAP,
    }
}

fn device_event(notification: &Event) -> Option<DeviceEvent> {
    match notification {
        Event::Incoming(Packet::ConnAck(_)) => Some(DeviceEvent::Connected),
        Event::Incoming(Packet::PubAck(ack)) => Some(DeviceEvent::AttributeAcknowledged {
            packet_id: ack.pkid,
        }),
        _ => None,
    }
}

fn sanitize_name(name: &str) -> String {
    // Remove any non-alphanumeric characters and replace spaces with underscores
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
}
