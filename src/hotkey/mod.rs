//! Global hotkey trigger, backed by `rdev`.
//!
//! `rdev::listen()` blocks forever, so [`TriggerListener`] runs it on a
//! dedicated OS thread and forwards [`Trigger::Hotkey`](crate::access::Trigger)
//! into the dispatcher's channel.  Holding the key down fires once; the key
//! must be released before it can fire again.

pub mod listener;

pub use listener::TriggerListener;

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

const NAMED_KEYS: &[(&str, rdev::Key)] = &[
    ("F1", rdev::Key::F1),
    ("F2", rdev::Key::F2),
    ("F3", rdev::Key::F3),
    ("F4", rdev::Key::F4),
    ("F5", rdev::Key::F5),
    ("F6", rdev::Key::F6),
    ("F7", rdev::Key::F7),
    ("F8", rdev::Key::F8),
    ("F9", rdev::Key::F9),
    ("F10", rdev::Key::F10),
    ("F11", rdev::Key::F11),
    ("F12", rdev::Key::F12),
    ("SPACE", rdev::Key::Space),
    ("ENTER", rdev::Key::Return),
    ("RETURN", rdev::Key::Return),
    ("PAUSE", rdev::Key::Pause),
    ("SCROLLLOCK", rdev::Key::ScrollLock),
    ("INSERT", rdev::Key::Insert),
    ("HOME", rdev::Key::Home),
    ("END", rdev::Key::End),
    ("PAGEUP", rdev::Key::PageUp),
    ("PAGEDOWN", rdev::Key::PageDown),
    ("KP0", rdev::Key::Kp0),
    ("KPENTER", rdev::Key::KpReturn),
];

/// Parse a trigger key name (case-insensitive) into an [`rdev::Key`].
///
/// Door panels usually expose a dedicated key such as `F9`, `Pause` or the
/// keypad Enter; `None` is returned for names outside that set.
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    let wanted = name.trim().to_ascii_uppercase().replace(['_', '-', ' '], "");
    NAMED_KEYS
        .iter()
        .find(|(label, _)| *label == wanted)
        .map(|(_, key)| *key)
}

// ---------------------------------------------------------------------------
// KeyLatch
// ---------------------------------------------------------------------------

/// Turns the raw press/auto-repeat/release stream of one key into single
/// activations.
#[derive(Debug, Clone, Copy)]
pub struct KeyLatch {
    key: rdev::Key,
    held: bool,
}

impl KeyLatch {
    pub fn new(key: rdev::Key) -> Self {
        Self { key, held: false }
    }

    /// Returns `true` when `event` is a fresh press of the watched key.
    pub fn on_event(&mut self, event: &rdev::EventType) -> bool {
        match *event {
            rdev::EventType::KeyPress(k) if k == self.key => !std::mem::replace(&mut self.held, true),
            rdev::EventType::KeyRelease(k) if k == self.key => {
                self.held = false;
                false
            }
            _ => false,
        }
    }
}
