use std::sync::atomic::{AtomicBool, Ordering};

pub const NUM_KEYS: usize = 16;

/// The 16-key hex pad. Key identities are a closed enumeration so invalid
/// indices are unrepresentable past the decode boundary.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Key {
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF,
}

impl Key {
    /// Maps the low nibble of `value` onto a key. Register values above 0xF
    /// wrap the way the reference hardware's 4-bit key index does.
    pub fn from_nibble(value: u8) -> Key {
        match value & 0x0F {
            0x0 => Key::Key0,
            0x1 => Key::Key1,
            0x2 => Key::Key2,
            0x3 => Key::Key3,
            0x4 => Key::Key4,
            0x5 => Key::Key5,
            0x6 => Key::Key6,
            0x7 => Key::Key7,
            0x8 => Key::Key8,
            0x9 => Key::Key9,
            0xA => Key::KeyA,
            0xB => Key::KeyB,
            0xC => Key::KeyC,
            0xD => Key::KeyD,
            0xE => Key::KeyE,
            _ => Key::KeyF,
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

/// Level-triggered key state table, written by the input loop and read by the
/// processor mid-tick. One atomic per slot keeps cross-thread access race
/// free without ordering the two loops against each other; a one-frame-stale
/// read is acceptable in this domain.
pub struct Controller {
    key_pad: [AtomicBool; NUM_KEYS],
}

impl Controller {
    pub fn new() -> Self {
        Controller {
            key_pad: [const { AtomicBool::new(false) }; NUM_KEYS],
        }
    }

    /// Overwrites the held state of `key`. Last write wins; there is no
    /// debouncing or queuing.
    pub fn set_key_status(&self, key: Key, pressed: bool) {
        self.key_pad[key as usize].store(pressed, Ordering::Relaxed);
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.key_pad[key as usize].load(Ordering::Relaxed)
    }

    /// Scans the pad in index order and reports the first held key.
    pub fn first_pressed_key(&self) -> Option<Key> {
        (0..NUM_KEYS as u8)
            .map(Key::from_nibble)
            .find(|&key| self.is_key_pressed(key))
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}
