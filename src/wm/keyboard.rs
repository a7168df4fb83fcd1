//! Keyboard Module
//!
//! Hotkey bindings and the key grabs installed for them on the root window.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::wm::display::XConn;

/// Keysym of the Num_Lock key
pub const XK_NUM_LOCK: u32 = 0xff7f;

/// Lock (caps-lock) modifier bit
pub const LOCK_MASK: u16 = 1 << 1;

/// Snapshot of the server's keyboard and modifier mappings
#[derive(Debug, Clone, Default)]
pub struct Keymap {
    pub min_keycode: u8,
    pub keysyms_per_keycode: u8,
    /// `keysyms_per_keycode` entries per keycode, starting at `min_keycode`
    pub keysyms: Vec<u32>,
    pub keycodes_per_modifier: u8,
    /// Eight rows (Shift, Lock, Control, Mod1..Mod5) of
    /// `keycodes_per_modifier` keycodes each
    pub modifier_keycodes: Vec<u8>,
}

impl Keymap {
    /// First keycode carrying `keysym` in any column
    pub fn keysym_to_keycode(&self, keysym: u32) -> Option<u8> {
        if keysym == 0 || self.keysyms_per_keycode == 0 {
            return None;
        }
        let per = self.keysyms_per_keycode as usize;
        self.keysyms
            .chunks(per)
            .position(|syms| syms.contains(&keysym))
            .and_then(|index| u8::try_from(self.min_keycode as usize + index).ok())
    }

    /// Column-0 keysym of `keycode`, 0 (NoSymbol) if unmapped
    pub fn keycode_to_keysym(&self, keycode: u8) -> u32 {
        if keycode < self.min_keycode {
            return 0;
        }
        let index = (keycode - self.min_keycode) as usize * self.keysyms_per_keycode as usize;
        self.keysyms.get(index).copied().unwrap_or(0)
    }

    /// Modifier bit bound to Num_Lock, 0 if it is not a modifier
    pub fn numlock_mask(&self) -> u16 {
        let Some(numlock) = self.keysym_to_keycode(XK_NUM_LOCK) else {
            return 0;
        };
        let per = self.keycodes_per_modifier as usize;
        if per == 0 {
            return 0;
        }
        self.modifier_keycodes
            .chunks(per)
            .take(8)
            .position(|row| row.contains(&numlock))
            .map_or(0, |bit| 1 << bit)
    }
}

/// Key binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub keysym: u32,
    pub modifier: u16,
}

/// Key grab table
///
/// Bindings are kept most-recent-first and are not deduplicated.
#[derive(Debug, Default)]
pub struct KeyGrabTable {
    bindings: Vec<KeyBinding>,
    keymap: Keymap,
    numlock_mask: u16,
}

impl KeyGrabTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding. Takes effect on the next [`KeyGrabTable::rebuild`].
    pub fn register(&mut self, keysym: u32, modifier: u16) {
        debug!("Registering key binding: keysym=0x{:x}, modifier=0x{:x}", keysym, modifier);
        self.bindings.insert(0, KeyBinding { keysym, modifier });
    }

    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    pub fn numlock_mask(&self) -> u16 {
        self.numlock_mask
    }

    /// Modifier variants every binding is grabbed under, so the state of
    /// caps-lock and num-lock does not matter
    pub fn lock_variants(&self) -> [u16; 4] {
        let numlock = self.numlock_mask;
        [0, LOCK_MASK, numlock, numlock | LOCK_MASK]
    }

    /// Reload the keyboard map, drop every key grab on the root and grab
    /// each binding again under all lock variants.
    ///
    /// Individual grab failures are reported asynchronously by the server
    /// and are not treated as errors here.
    pub fn rebuild<C: XConn>(&mut self, conn: &C) -> Result<()> {
        self.keymap = conn.keyboard_map()?;
        self.numlock_mask = self.keymap.numlock_mask();
        debug!("Numlock mask: 0x{:x}", self.numlock_mask);

        conn.ungrab_all_keys()?;
        let variants = self.lock_variants();
        for binding in &self.bindings {
            let Some(keycode) = self.keymap.keysym_to_keycode(binding.keysym) else {
                warn!("No keycode for keysym 0x{:x}, binding skipped", binding.keysym);
                continue;
            };
            debug!(
                "Grab key: keysym=0x{:x} keycode={} modifier=0x{:x}",
                binding.keysym, keycode, binding.modifier
            );
            for extra in variants {
                conn.grab_key(keycode, binding.modifier | extra)?;
            }
        }
        conn.flush()?;

        info!("Key grabs rebuilt for {} bindings", self.bindings.len());
        Ok(())
    }

    /// Keysym and lock-stripped modifier state of a key press
    pub fn resolve_press(&self, keycode: u8, state: u16) -> (u32, u16) {
        let keysym = self.keymap.keycode_to_keysym(keycode);
        (keysym, state & !(self.numlock_mask | LOCK_MASK))
    }
}
