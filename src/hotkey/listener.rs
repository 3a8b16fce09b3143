//! Dedicated OS-thread listener that turns a key press into a trigger.
//!
//! `rdev::listen` has no shutdown API.  Dropping [`TriggerListener`] sets a
//! stop flag so the callback discards further events; the thread itself stays
//! blocked in rdev until the process exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::KeyLatch;
use crate::access::Trigger;

pub struct TriggerListener {
    stop: Arc<AtomicBool>,
    _thread: std::thread::JoinHandle<()>,
}

impl TriggerListener {
    /// Spawn the listener thread for `key`.
    ///
    /// Uses `try_send`: when the dispatcher's queue is full the press is
    /// dropped, matching the dispatcher's own drop-while-busy rule.
    pub fn start(key: rdev::Key, tx: mpsc::Sender<Trigger>) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("trigger-listener".into())
            .spawn(move || {
                let mut latch = KeyLatch::new(key);
                let result = rdev::listen(move |event| {
                    if stop_flag.load(Ordering::Relaxed) {
                        return;
                    }
                    if !latch.on_event(&event.event_type) {
                        return;
                    }
                    match tx.try_send(Trigger::Hotkey) {
                        Ok(()) => log::debug!("hotkey: {:?} pressed", key),
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            log::debug!("hotkey: busy, press ignored")
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {}
                    }
                });

                if let Err(e) = result {
                    log::error!("hotkey: rdev::listen exited with error: {:?}", e);
                }
            })?;

        log::info!("hotkey: listening for {:?}", key);
        Ok(Self {
            stop,
            _thread: thread,
        })
    }
}

impl Drop for TriggerListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
