//! MQTT unlock publisher using rumqttc.
//!
//! The rumqttc event loop runs on its own tokio task and reconnects after
//! errors.  Publishing is refused while no broker session is up, so a dead
//! broker surfaces as [`UnlockError::NotConnected`] instead of a queued
//! message that opens the door minutes later.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};

use crate::access::{Shutdown, UnlockError, UnlockSignal};
use crate::config::MqttConfig;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Body published on the unlock topic: the JSON string `"success"`.
pub fn unlock_payload() -> Vec<u8> {
    serde_json::to_vec("success").unwrap_or_else(|_| b"\"success\"".to_vec())
}

pub fn qos_from_level(level: u8) -> Option<QoS> {
    match level {
        0 => Some(QoS::AtMostOnce),
        1 => Some(QoS::AtLeastOnce),
        2 => Some(QoS::ExactlyOnce),
        _ => None,
    }
}

pub struct MqttUnlockSignal {
    client: AsyncClient,
    topic: String,
    qos: QoS,
    connected: Arc<AtomicBool>,
}

impl MqttUnlockSignal {
    /// Configure the client and spawn its event loop.  Must be called inside
    /// a tokio runtime.  Returns immediately; the connection is established
    /// in the background.
    pub fn start(config: &MqttConfig, shutdown: Shutdown) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.broker, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.as_deref().unwrap_or_default());
        }

        let qos = qos_from_level(config.qos).unwrap_or_else(|| {
            log::warn!("unlock: invalid MQTT QoS {}, using 1", config.qos);
            QoS::AtLeastOnce
        });

        let (client, event_loop) = AsyncClient::new(options, 10);
        let connected = Arc::new(AtomicBool::new(false));

        log::info!(
            "unlock: connecting to mqtt://{}:{} (topic {})",
            config.broker,
            config.port,
            config.topic
        );
        tokio::spawn(run_event_loop(
            event_loop,
            client.clone(),
            connected.clone(),
            shutdown,
        ));

        Self {
            client,
            topic: config.topic.clone(),
            qos,
            connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnlockSignal for MqttUnlockSignal {
    async fn send_unlock(&self) -> Result<(), UnlockError> {
        if !self.is_connected() {
            return Err(UnlockError::NotConnected);
        }
        self.client
            .publish(&self.topic, self.qos, false, unlock_payload())
            .await
            .map_err(|e| UnlockError::Publish(e.to_string()))?;
        log::info!("unlock: published to {}", self.topic);
        Ok(())
    }
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    shutdown: Shutdown,
) {
    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                connected.store(false, Ordering::SeqCst);
                let _ = client.try_disconnect();
                log::info!("unlock: mqtt event loop stopped");
                break;
            }
            event = event_loop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    log::info!("unlock: connected to broker");
                    connected.store(true, Ordering::SeqCst);
                }
                Ok(Event::Incoming(Packet::PubAck(ack))) => {
                    log::debug!("unlock: publish {} acknowledged", ack.pkid);
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    log::warn!("unlock: broker closed the session");
                    connected.store(false, Ordering::SeqCst);
                }
                Ok(_) => {}
                Err(e) => {
                    if connected.swap(false, Ordering::SeqCst) {
                        log::error!("unlock: connection lost: {}", e);
                    } else {
                        log::debug!("unlock: connect attempt failed: {}", e);
                    }
                    tokio::select! {
                        _ = shutdown.wait() => {}
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            },
        }
    }
}
