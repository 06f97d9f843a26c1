// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/hygrolink

//! MQTT reporting sink

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, Transport};
use secrecy::ExposeSecret;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::assets::Credentials;
use super::{AttributeSet, ReportingSink, ThresholdHandler};
use crate::config::{DeviceConfig, MqttConfig};
use crate::error::ReportingError;
use crate::sensors::DeviceMetadata;

/// How long `close` waits for the disconnect to be flushed
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct MetadataMessage<'a> {
    endpoint_id: &'a str,
    model_urn: &'a str,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    metadata: &'a DeviceMetadata,
}

#[derive(Serialize)]
struct AttributesMessage<'a> {
    endpoint_id: &'a str,
    timestamp: DateTime<Utc>,
    attributes: &'a AttributeSet,
}

#[derive(Serialize)]
struct AlertMessage<'a> {
    endpoint_id: &'a str,
    timestamp: DateTime<Utc>,
    alert: &'a str,
    attributes: &'a AttributeSet,
}

/// Reporting sink backed by an MQTT broker connection
pub struct MqttSink {
    client: AsyncClient,
    endpoint_id: String,
    device_topic: String,
    /// Last event loop failure, surfaced on the next call
    failure: Arc<Mutex<Option<String>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl MqttSink {
    /// Connect to the broker and wait for it to accept the session
    ///
    /// `on_threshold` receives values written to the device's
    /// `settings/<max_threshold_attribute>` topic.
    pub async fn connect(
        credentials: &Credentials,
        device: &DeviceConfig,
        config: &MqttConfig,
        on_threshold: Option<ThresholdHandler>,
    ) -> Result<Self, ReportingError> {
        let assets = &credentials.assets;
        let broker = assets.broker();

        let mut options = MqttOptions::new(&assets.endpoint_id, &assets.broker_host, assets.broker_port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_credentials(assets.username(), credentials.password.expose_secret().as_str());

        if assets.use_tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        let (client, mut eventloop) = AsyncClient::new(options, config.channel_capacity);

        let timeout = Duration::from_secs(config.connect_timeout_secs);
        match tokio::time::timeout(timeout, wait_for_connack(&mut eventloop)).await {
            Err(_) => {
                return Err(ReportingError::ConnectTimeout {
                    broker,
                    secs: config.connect_timeout_secs,
                })
            }
            Ok(Err(ConnectionError::ConnectionRefused(code))) => {
                return Err(ReportingError::Rejected {
                    broker,
                    reason: format!("{:?}", code),
                })
            }
            Ok(Err(source)) => return Err(ReportingError::Connection { broker, source }),
            Ok(Ok(())) => {}
        }
        info!("MQTT connected to {} as {}", broker, assets.endpoint_id);

        let device_topic = assets.device_topic();
        let settings_topic = format!("{}/settings/{}", device_topic, device.max_threshold_attribute);
        client.subscribe(&settings_topic, QoS::AtLeastOnce).await?;
        info!("Subscribed to MQTT topic: {}", settings_topic);

        let failure = Arc::new(Mutex::new(None));
        let cancel = CancellationToken::new();
        let event_task = tokio::spawn(drive_event_loop(
            eventloop,
            settings_topic,
            on_threshold,
            failure.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            client,
            endpoint_id: assets.endpoint_id.clone(),
            device_topic,
            failure,
            event_task: Mutex::new(Some(event_task)),
            cancel,
            closed: AtomicBool::new(false),
        })
    }

    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    fn ensure_healthy(&self) -> Result<(), ReportingError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ReportingError::Closed);
        }
        if let Some(message) = self.failure.lock().clone() {
            return Err(ReportingError::Transport { message });
        }
        Ok(())
    }

    async fn publish<T: Serialize>(&self, suffix: &str, retain: bool, payload: &T) -> Result<(), ReportingError> {
        self.ensure_healthy()?;
        let json = serde_json::to_vec(payload)?;
        let topic = format!("{}/{}", self.device_topic, suffix);
        self.client.publish(topic, QoS::AtLeastOnce, retain, json).await?;
        Ok(())
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

async fn drive_event_loop(
    mut eventloop: EventLoop,
    settings_topic: String,
    on_threshold: Option<ThresholdHandler>,
    failure: Arc<Mutex<Option<String>>>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        let flow = handle_event(event, &settings_topic, on_threshold.as_ref(), &failure);
        if flow.is_break() {
            break;
        }
    }
}

/// Apply one event loop result. Breaks once the connection is finished.
///
/// A failure is recorded in `failure` so the next publish can report it.
fn handle_event(
    event: Result<Event, ConnectionError>,
    settings_topic: &str,
    on_threshold: Option<&ThresholdHandler>,
    failure: &Mutex<Option<String>>,
) -> ControlFlow<()> {
    match event {
        Ok(Event::Incoming(Packet::Publish(msg))) if msg.topic == settings_topic => {
            match parse_threshold_payload(&msg.payload) {
                Some(value) => {
                    info!("Threshold update received: {}", value);
                    if let Some(handler) = on_threshold {
                        handler(value);
                    }
                }
                None => warn!("Ignoring malformed threshold payload on {}", msg.topic),
            }
        }
        Ok(Event::Incoming(Packet::Publish(msg))) => {
            debug!("MQTT received: {:?}", msg.topic);
        }
        Ok(Event::Outgoing(Outgoing::Disconnect)) => {
            debug!("MQTT disconnect sent");
            return ControlFlow::Break(());
        }
        Ok(_) => {}
        Err(e) => {
            error!("MQTT error: {}", e);
            *failure.lock() = Some(e.to_string());
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

/// Decode a threshold write: a bare integer or `{"value": n}`
pub fn parse_threshold_payload(payload: &[u8]) -> Option<i32> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    let raw = value
        .as_i64()
        .or_else(|| value.get("value").and_then(|v| v.as_i64()))?;
    Some(raw.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

#[async_trait]
impl ReportingSink for MqttSink {
    async fn announce(&self, model_urn: &str, metadata: &DeviceMetadata) -> Result<(), ReportingError> {
        let message = MetadataMessage {
            endpoint_id: &self.endpoint_id,
            model_urn,
            timestamp: Utc::now(),
            metadata,
        };
        self.publish("metadata", true, &message).await
    }

    async fn commit(&self, attributes: AttributeSet) -> Result<(), ReportingError> {
        let message = AttributesMessage {
            endpoint_id: &self.endpoint_id,
            timestamp: Utc::now(),
            attributes: &attributes,
        };
        self.publish("attributes", false, &message).await
    }

    async fn raise_alert(&self, alert_name: &str, attribute: &str, value: i32) -> Result<(), ReportingError> {
        let mut attributes = AttributeSet::new();
        attributes.insert(attribute, value);
        let message = AlertMessage {
            endpoint_id: &self.endpoint_id,
            timestamp: Utc::now(),
            alert: alert_name,
            attributes: &attributes,
        };
        self.publish("alerts", false, &message).await
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Err(e) = self.client.disconnect().await {
            warn!("MQTT disconnect failed: {}", e);
        }

        let task = self.event_task.lock().take();
        if let Some(task) = task {
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                debug!("MQTT event loop did not stop in time");
            }
        }
        self.cancel.cancel();

        info!("MQTT connection for {} closed", self.endpoint_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::TrustedAssets;
    use crate::sensors::{HumiditySensor, Sensor};
    use rumqttc::Publish;
    use secrecy::SecretString;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const SETTINGS: &str = "devices/dev-1/settings/maxThreshold";

    fn local_credentials(port: u16) -> Credentials {
        let assets = TrustedAssets {
            endpoint_id: "dev-1".to_string(),
            broker_host: "127.0.0.1".to_string(),
            broker_port: port,
            username: None,
            use_tls: false,
            topic_prefix: "devices".to_string(),
        };
        Credentials::new(assets, SecretString::new("secret".to_string()))
    }

    fn quick_config() -> MqttConfig {
        MqttConfig {
            connect_timeout_secs: 1,
            ..MqttConfig::default()
        }
    }

    async fn connect_local(port: u16) -> Result<MqttSink, ReportingError> {
        MqttSink::connect(&local_credentials(port), &DeviceConfig::default(), &quick_config(), None).await
    }

    /// Sink whose event loop was never started
    fn detached_sink() -> MqttSink {
        let (client, _eventloop) = AsyncClient::new(MqttOptions::new("dev-1", "127.0.0.1", 1883), 10);
        MqttSink {
            client,
            endpoint_id: "dev-1".to_string(),
            device_topic: "devices/dev-1".to_string(),
            failure: Arc::new(Mutex::new(None)),
            event_task: Mutex::new(None),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn publish(topic: &str, payload: &str) -> Result<Event, ConnectionError> {
        Ok(Event::Incoming(Packet::Publish(Publish::new(topic, QoS::AtLeastOnce, payload))))
    }

    fn recording_handler() -> (ThresholdHandler, Arc<Mutex<Vec<i32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let handler: ThresholdHandler = Arc::new(move |value| record.lock().push(value));
        (handler, seen)
    }

    #[tokio::test]
    async fn test_connect_to_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        match connect_local(port).await {
            Err(ReportingError::Connection { broker, .. }) => assert_eq!(broker, format!("127.0.0.1:{}", port)),
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("connected to a closed port"),
        }
    }

    #[tokio::test]
    async fn test_connect_timeout_when_broker_is_silent() {
        // Accepted by the kernel backlog, never answered
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        match connect_local(port).await {
            Err(ReportingError::ConnectTimeout { secs, .. }) => assert_eq!(secs, 1),
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("connected without a CONNACK"),
        }
        drop(listener);
    }

    #[tokio::test]
    async fn test_connect_rejected_by_broker() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let broker = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut connect = [0u8; 256];
            let _ = socket.read(&mut connect).await;
            // CONNACK, return code 5: not authorized
            socket.write_all(&[0x20, 0x02, 0x00, 0x05]).await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        match connect_local(port).await {
            Err(ReportingError::Rejected { reason, .. }) => assert_eq!(reason, "NotAuthorized"),
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("connection accepted"),
        }
        broker.abort();
    }

    #[test]
    fn test_settings_write_reaches_handler() {
        let (handler, seen) = recording_handler();
        let failure = Mutex::new(None);

        let flow = handle_event(publish(SETTINGS, "85"), SETTINGS, Some(&handler), &failure);
        assert_eq!(flow, ControlFlow::Continue(()));
        let flow = handle_event(publish(SETTINGS, r#"{"value": 70}"#), SETTINGS, Some(&handler), &failure);
        assert_eq!(flow, ControlFlow::Continue(()));

        assert_eq!(*seen.lock(), vec![85, 70]);
        assert!(failure.lock().is_none());
    }

    #[test]
    fn test_settings_write_is_clamped_by_sensor() {
        let sensor = Arc::new(HumiditySensor::new("dev-1_Sample_HS"));
        let target = sensor.clone();
        let handler: ThresholdHandler = Arc::new(move |value| target.set_max_threshold(value));
        let failure = Mutex::new(None);

        for (payload, expected) in [("150", 100), ("65", 65), ("10", 60)] {
            let flow = handle_event(publish(SETTINGS, payload), SETTINGS, Some(&handler), &failure);
            assert_eq!(flow, ControlFlow::Continue(()));
            assert_eq!(sensor.threshold(), expected);
        }
    }

    #[test]
    fn test_malformed_or_foreign_publish_is_ignored() {
        let (handler, seen) = recording_handler();
        let failure = Mutex::new(None);

        for event in [
            publish(SETTINGS, "\"high\""),
            publish(SETTINGS, r#"{"threshold": 70}"#),
            publish("devices/dev-2/settings/maxThreshold", "85"),
        ] {
            let flow = handle_event(event, SETTINGS, Some(&handler), &failure);
            assert_eq!(flow, ControlFlow::Continue(()));
        }

        assert!(seen.lock().is_empty());
        assert!(failure.lock().is_none());
    }

    #[test]
    fn test_outgoing_disconnect_stops_loop() {
        let failure = Mutex::new(None);
        let flow = handle_event(Ok(Event::Outgoing(Outgoing::Disconnect)), SETTINGS, None, &failure);
        assert_eq!(flow, ControlFlow::Break(()));
        assert!(failure.lock().is_none());
    }

    #[tokio::test]
    async fn test_event_loop_failure_surfaces_on_next_call() {
        let sink = detached_sink();
        assert!(sink.ensure_healthy().is_ok());

        let lost = ConnectionError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset"));
        let flow = handle_event(Err(lost), SETTINGS, None, &sink.failure);
        assert_eq!(flow, ControlFlow::Break(()));

        match sink.commit(AttributeSet::new()).await {
            Err(ReportingError::Transport { message }) => assert!(message.contains("peer reset"), "{}", message),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            sink.raise_alert("too_humid", "humidity", 90).await,
            Err(ReportingError::Transport { .. })
        ));
    }

    #[test]
    fn test_parse_threshold_payload() {
        assert_eq!(parse_threshold_payload(b"85"), Some(85));
        assert_eq!(parse_threshold_payload(br#"{"value": 70}"#), Some(70));
        assert_eq!(parse_threshold_payload(b" 90 "), Some(90));
        assert_eq!(parse_threshold_payload(b"99999999999"), Some(i32::MAX));
        assert_eq!(parse_threshold_payload(b"\"high\""), None);
        assert_eq!(parse_threshold_payload(br#"{"threshold": 70}"#), None);
        assert_eq!(parse_threshold_payload(b""), None);
    }

    #[test]
    fn test_attributes_message_shape() {
        let mut attributes = AttributeSet::new();
        attributes.insert("humidity", 81);
        let message = AttributesMessage {
            endpoint_id: "dev-1",
            timestamp: Utc::now(),
            attributes: &attributes,
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["endpoint_id"], "dev-1");
        assert_eq!(json["attributes"]["humidity"], 81);
    }
}
