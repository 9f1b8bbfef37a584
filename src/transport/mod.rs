//! MQTT transport for the overlay bridge.
//!
//! Detection and image messages arrive on one MQTT connection and are handled
//! on the thread that polls it, which gives the node its one-at-a-time
//! callback ordering.

mod mqtt;

pub use mqtt::{parse_mqtt_endpoint, validate_loopback_addr, MqttEndpoint, TlsMaterials};
