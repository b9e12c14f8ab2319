//! The Publisher broker capability (spec §4.4): connect, publish, close.
//!
//! One [`MqttPublisher`] is opened per broker and shared (via `Arc`)
//! across every worker whose streams target it; `publish` is safe to
//! call concurrently because `rumqttc::AsyncClient` is itself a cheap,
//! internally-synchronized handle onto the connection.
//!
//! The scheduler depends only on the [`Transport`] trait, not the
//! concrete `rumqttc`-backed type, so a fake transport can stand in for
//! broker-free scheduler tests (spec §5, §8 scenarios).

use async_trait::async_trait;
use mqttsim_types::{BrokerSpec, TransportError};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;

/// Translate the plan's `0..=2` QoS integer into `rumqttc::QoS`,
/// defaulting anything out of range to `AtLeastOnce` the way the broker
/// itself would treat an unrecognized value.
fn qos_of(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

/// The narrow capability the scheduler drives: publish bytes to a topic.
/// `MqttPublisher` is the only production implementation; tests use a
/// fake to drive the scheduler without a live broker.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        bytes: Vec<u8>,
        qos: u8,
        retain: bool,
    ) -> Result<(), TransportError>;
}

pub struct MqttPublisher {
    broker: String,
    client: AsyncClient,
    driver: tokio::task::JoinHandle<()>,
}

impl MqttPublisher {
    /// Connect to `spec`, blocking until the broker's `ConnAck` (or a
    /// connection error) arrives, then spawn the background task that
    /// keeps driving `rumqttc`'s event loop. rumqttc requires the event
    /// loop to be polled continuously for the connection to make
    /// progress; nothing in the Publisher contract needs the events
    /// themselves past the handshake, so they are drained and discarded
    /// by `drive`.
    pub async fn open(spec: &BrokerSpec) -> Result<Self, TransportError> {
        let client_id = spec
            .client_id
            .clone()
            .unwrap_or_else(|| format!("mqtt-sim-{}", spec.name));
        let mut options = MqttOptions::new(client_id, spec.host.clone(), spec.port);
        options.set_keep_alive(Duration::from_secs(spec.keepalive as u64));
        if let (Some(username), Some(password)) = (&spec.username, &spec.password) {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(options, 256);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(TransportError::Connect {
                            broker: spec.name.clone(),
                            message: format!("broker refused connection: {:?}", ack.code),
                        });
                    }
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    return Err(TransportError::Connect {
                        broker: spec.name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let driver = tokio::spawn(drive(eventloop));

        Ok(Self {
            broker: spec.name.clone(),
            client,
            driver,
        })
    }

    pub async fn close(self) -> Result<(), TransportError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::Disconnect {
                broker: self.broker.clone(),
                message: e.to_string(),
            })?;
        self.driver.abort();
        Ok(())
    }
}

#[async_trait]
impl Transport for MqttPublisher {
    async fn publish(
        &self,
        topic: &str,
        bytes: Vec<u8>,
        qos: u8,
        retain: bool,
    ) -> Result<(), TransportError> {
        self.client
            .publish(topic, qos_of(qos), retain, bytes)
            .await
            .map_err(|e| TransportError::Publish {
                broker: self.broker.clone(),
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }
}

async fn drive(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(_) => {}
            Err(_) => break,
        }
    }
}
