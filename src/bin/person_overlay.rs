//! person_overlay - Draw person detections onto a camera stream over MQTT.
//!
//! 1. Subscribes to the detector's topic (SpatialDetectionArray or
//!    Detection2DArray, chosen by configuration) and to the camera image topic
//! 2. Keeps the people from the latest detection message
//! 3. Draws them onto every incoming image and publishes the overlay
//!
//! Both subscriptions are served from the one connection loop below, so a
//! detection message and an image message are never handled at the same time.

use anyhow::{Context, Result};
use clap::Parser;
use rumqttc::v5::{mqttbytes::QoS, Client, Connection, Event, Incoming, MqttOptions};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use person_overlay::transport::{
    parse_mqtt_endpoint, validate_loopback_addr, MqttEndpoint, TlsMaterials,
};
use person_overlay::{FrameAnnotator, Overlay, OverlayConfig, PersonDetectionNode, TopicSettings};

const BRIDGE_NAME: &str = "person_overlay";
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Raw camera frames are large; allow well above a 1080p bgr8 frame in JSON.
const MAX_PACKET_BYTES: u32 = 64 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Draw person detections onto a camera stream over MQTT"
)]
struct Args {
    /// MQTT broker address.
    /// By default, only loopback addresses are allowed.
    #[arg(long, env = "MQTT_BROKER_ADDR", default_value = "127.0.0.1:1883")]
    mqtt_broker_addr: String,

    /// Allow non-loopback MQTT connections.
    #[arg(long, env = "ALLOW_REMOTE_MQTT")]
    allow_remote_mqtt: bool,

    /// MQTT username for authentication.
    #[arg(long, env = "MQTT_USERNAME")]
    mqtt_username: Option<String>,

    /// MQTT password for authentication.
    #[arg(long, env = "MQTT_PASSWORD")]
    mqtt_password: Option<String>,

    /// Enable TLS for MQTT (implied by mqtts:// brokers).
    #[arg(long, env = "MQTT_USE_TLS")]
    mqtt_use_tls: bool,

    /// Path to a PEM-encoded CA certificate to trust for MQTT TLS.
    #[arg(long, env = "MQTT_TLS_CA_PATH")]
    mqtt_tls_ca_path: Option<PathBuf>,

    /// Path to a PEM-encoded client certificate for MQTT TLS.
    #[arg(long, env = "MQTT_TLS_CLIENT_CERT_PATH")]
    mqtt_tls_client_cert_path: Option<PathBuf>,

    /// Path to a PEM-encoded client private key for MQTT TLS.
    #[arg(long, env = "MQTT_TLS_CLIENT_KEY_PATH")]
    mqtt_tls_client_key_path: Option<PathBuf>,

    /// MQTT client identifier.
    #[arg(long, env = "MQTT_CLIENT_ID", default_value = BRIDGE_NAME)]
    mqtt_client_id: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let cfg = OverlayConfig::load()?;

    let endpoint = parse_mqtt_endpoint(&args.mqtt_broker_addr, args.mqtt_use_tls)?;
    if !args.allow_remote_mqtt {
        validate_loopback_addr(&endpoint, &args.mqtt_broker_addr)?;
    } else {
        log::warn!("Remote MQTT enabled - ensure broker is in a trusted network");
    }
    let tls = TlsMaterials::load(
        args.mqtt_tls_ca_path.as_ref(),
        args.mqtt_tls_client_cert_path.as_ref(),
        args.mqtt_tls_client_key_path.as_ref(),
    )?;

    log::info!("Person overlay starting");
    log::info!(
        "  MQTT broker: {}:{} (TLS: {})",
        endpoint.host,
        endpoint.port,
        endpoint.use_tls
    );
    log::info!("  Detections topic: {}", cfg.topics.detections);
    log::info!("  Image topic: {}", cfg.topics.image);
    log::info!("  Overlay topic: {}", cfg.topics.overlay);

    let annotator = FrameAnnotator::from_settings(cfg.font_path.as_deref(), cfg.font_required)?;
    let mut node = PersonDetectionNode::new(cfg.schema, annotator);

    let shutdown = Arc::new(AtomicBool::new(false));
    let active_client: Arc<Mutex<Option<Client>>> = Arc::new(Mutex::new(None));
    {
        let shutdown = shutdown.clone();
        let active_client = active_client.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
            if let Ok(guard) = active_client.lock() {
                if let Some(client) = guard.as_ref() {
                    let _ = client.disconnect();
                }
            }
        })
        .context("install Ctrl-C handler")?;
    }

    while !shutdown.load(Ordering::SeqCst) {
        let (client, mut connection) = connect_mqtt(
            &endpoint,
            &tls,
            &args.mqtt_client_id,
            args.mqtt_username.as_deref(),
            args.mqtt_password.as_deref(),
        )?;
        client.subscribe(cfg.topics.detections.as_str(), QoS::AtMostOnce)?;
        client.subscribe(cfg.topics.image.as_str(), QoS::AtMostOnce)?;
        log::info!(
            "Subscribed to {} and {}",
            cfg.topics.detections,
            cfg.topics.image
        );
        set_active_client(&active_client, Some(client.clone()));

        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    let topic = match std::str::from_utf8(&publish.topic) {
                        Ok(topic) => topic,
                        Err(e) => {
                            log::warn!("Skipping publish with invalid topic: {}", e);
                            continue;
                        }
                    };
                    handle_publish(&mut node, &client, &cfg.topics, topic, &publish.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    if !shutdown.load(Ordering::SeqCst) {
                        log::error!("MQTT connection error: {}", e);
                    }
                    break;
                }
            }
        }

        set_active_client(&active_client, None);
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        log::warn!(
            "MQTT connection closed. Reconnecting in {}s...",
            RECONNECT_DELAY.as_secs()
        );
        std::thread::sleep(RECONNECT_DELAY);
    }

    log::info!("Person overlay stopped");
    Ok(())
}

fn handle_publish(
    node: &mut PersonDetectionNode,
    client: &Client,
    topics: &TopicSettings,
    topic: &str,
    payload: &[u8],
) {
    match node.on_message(topics, topic, payload) {
        Ok(Some(overlay)) => publish_overlay(client, &topics.overlay, &overlay),
        Ok(None) => {}
        Err(e) => log::warn!("Dropping message on {}: {:#}", topic, e),
    }
}

fn publish_overlay(client: &Client, topic: &str, overlay: &Overlay) {
    let payload = match overlay.image.to_json() {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("Dropping overlay: {:#}", e);
            return;
        }
    };
    // try_publish: a blocking publish would stall the loop that drains the
    // request queue.
    if let Err(e) = client.try_publish(topic.to_string(), QoS::AtMostOnce, false, payload) {
        log::warn!("Dropping overlay: {}", e);
    }
}

fn set_active_client(slot: &Mutex<Option<Client>>, client: Option<Client>) {
    if let Ok(mut guard) = slot.lock() {
        *guard = client;
    }
}

fn connect_mqtt(
    endpoint: &MqttEndpoint,
    tls: &TlsMaterials,
    client_id: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<(Client, Connection)> {
    let mut options = MqttOptions::new(client_id, &endpoint.host, endpoint.port);
    options.set_keep_alive(Duration::from_secs(30));
    options.set_clean_start(true);
    options.set_max_packet_size(Some(MAX_PACKET_BYTES));
    if let Some(user) = username {
        options.set_credentials(user, password.unwrap_or_default());
    }
    options.set_transport(tls.build_transport(endpoint)?);

    let (client, connection) = Client::new(options, 10);
    log::info!(
        "Connecting to MQTT broker (TLS: {}, auth: {})",
        endpoint.use_tls,
        username.is_some()
    );
    Ok((client, connection))
}
