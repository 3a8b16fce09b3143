//! Door-release signalling.
//!
//! [`MqttUnlockSignal`] publishes to the door controller's topic.
//! [`LogOnlyUnlock`] stands in when MQTT is disabled, so the rest of the
//! system runs unchanged on a bench setup.

pub mod mqtt;

pub use mqtt::{qos_from_level, unlock_payload, MqttUnlockSignal};

use async_trait::async_trait;

use crate::access::{UnlockError, UnlockSignal};

/// Records the unlock in the log and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyUnlock;

#[async_trait]
impl UnlockSignal for LogOnlyUnlock {
    async fn send_unlock(&self) -> Result<(), UnlockError> {
        log::warn!("unlock: no unlock channel configured, door not signalled");
        Ok(())
    }
}
