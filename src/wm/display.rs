//! Display Module
//!
//! The seam between the session core and the display server. Everything the
//! core asks of the server goes through [`XConn`]; the x11rb-backed
//! implementation lives in `xconn.rs`.

use anyhow::Result;

use crate::shared::Geometry;
use crate::wm::events::XEvent;
use crate::wm::ewmh::Atoms;
use crate::wm::keyboard::Keymap;

pub use nwm_ipc::Handle;

/// Property atom
pub type Atom = u32;

/// Attributes of a server-side window, as read when it is (re)considered
/// for management.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttributes {
    pub geometry: Geometry,
    pub border_width: u32,
    pub override_redirect: bool,
    /// Mapped and all ancestors mapped
    pub viewable: bool,
}

/// WM_CLASS contents; each half may be missing independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassHint {
    pub instance: Option<String>,
    pub class: Option<String>,
}

/// How protocol errors reported by the server are treated.
///
/// `Log` is the process-wide handler. `Ignore` is swapped in around
/// operations that are expected to fault (forced client kill).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    #[default]
    Log,
    Ignore,
}

// ConfigureWindow value-mask bits
pub const CONFIG_X: u16 = 1 << 0;
pub const CONFIG_Y: u16 = 1 << 1;
pub const CONFIG_WIDTH: u16 = 1 << 2;
pub const CONFIG_HEIGHT: u16 = 1 << 3;
pub const CONFIG_BORDER_WIDTH: u16 = 1 << 4;
pub const CONFIG_SIBLING: u16 = 1 << 5;
pub const CONFIG_STACK_MODE: u16 = 1 << 6;

/// Stack mode "Above"
pub const STACK_ABOVE: u8 = 0;

/// A partial ConfigureWindow request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowChanges {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub border_width: Option<u32>,
    pub sibling: Option<Handle>,
    pub stack_mode: Option<u8>,
}

impl WindowChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(mut self, x: i32, y: i32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn raise(mut self) -> Self {
        self.stack_mode = Some(STACK_ABOVE);
        self
    }

    /// Build the changes selected by a ConfigureWindow value mask.
    #[allow(clippy::too_many_arguments)]
    pub fn from_mask(
        value_mask: u16,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        border_width: u32,
        sibling: Handle,
        stack_mode: u8,
    ) -> Self {
        let pick = |bit: u16| value_mask & bit != 0;
        Self {
            x: pick(CONFIG_X).then_some(x),
            y: pick(CONFIG_Y).then_some(y),
            width: pick(CONFIG_WIDTH).then_some(width),
            height: pick(CONFIG_HEIGHT).then_some(height),
            border_width: pick(CONFIG_BORDER_WIDTH).then_some(border_width),
            sibling: pick(CONFIG_SIBLING).then_some(sibling),
            stack_mode: pick(CONFIG_STACK_MODE).then_some(stack_mode),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Operations the session core needs from the display server.
///
/// Queries about a specific window return `Ok(None)` when the window has
/// gone away; `Err` is reserved for transport failures.
pub trait XConn {
    fn root(&self) -> Handle;
    /// Root window size in pixels
    fn screen_size(&self) -> (u32, u32);
    fn atoms(&self) -> &Atoms;

    // Event queue

    /// Next queued event without blocking
    fn poll_event(&self) -> Result<Option<XEvent>>;
    fn flush(&self) -> Result<()>;
    /// Round-trip to the server so every request sent so far is processed
    fn sync(&self) -> Result<()>;
    fn set_error_mode(&self, mode: ErrorMode);

    // Queries

    fn top_level_windows(&self) -> Result<Vec<Handle>>;
    fn window_attributes(&self, window: Handle) -> Result<Option<WindowAttributes>>;
    fn transient_for(&self, window: Handle) -> Result<Option<Handle>>;
    /// Text property decoded to UTF-8; `None` if unset or empty
    fn text_property(&self, window: Handle, property: Atom) -> Result<Option<String>>;
    fn class_hint(&self, window: Handle) -> Result<Option<ClassHint>>;
    /// Whether `protocol` is listed in the window's WM_PROTOCOLS
    fn supports_protocol(&self, window: Handle, protocol: Atom) -> Result<bool>;
    /// Monitor regions as reported by Xinerama; `None` when inactive
    fn topology(&self) -> Result<Option<Vec<Geometry>>>;
    fn pointer_position(&self) -> Result<Option<(i32, i32)>>;
    fn keyboard_map(&self) -> Result<Keymap>;

    // Requests

    fn select_root_events(&self) -> Result<()>;
    fn select_client_events(&self, window: Handle) -> Result<()>;
    fn ungrab_all_keys(&self) -> Result<()>;
    fn grab_key(&self, keycode: u8, modifiers: u16) -> Result<()>;
    /// Reinstall button grabs on a client. Unfocused clients grab every
    /// button so a click can be reported; focused clients grab none.
    fn grab_buttons(&self, window: Handle, focused: bool) -> Result<()>;
    fn ungrab_buttons(&self, window: Handle) -> Result<()>;
    /// Actively grab the pointer for a drag; `false` if the grab was refused
    fn grab_pointer(&self) -> Result<bool>;
    fn ungrab_pointer(&self) -> Result<()>;
    fn grab_server(&self) -> Result<()>;
    fn ungrab_server(&self) -> Result<()>;
    fn configure_window(&self, window: Handle, changes: &WindowChanges) -> Result<()>;
    /// Synthetic ConfigureNotify telling a client its geometry
    fn send_configure_notify(
        &self,
        window: Handle,
        geometry: Geometry,
        border_width: u32,
    ) -> Result<()>;
    fn map_window(&self, window: Handle) -> Result<()>;
    fn set_input_focus(&self, window: Handle) -> Result<()>;
    /// WM_PROTOCOLS client message carrying `protocol`
    fn send_protocol_message(&self, window: Handle, protocol: Atom) -> Result<()>;
    /// Replace an ATOM-typed property
    fn set_atom_property(&self, window: Handle, property: Atom, values: &[Atom]) -> Result<()>;
    /// Close-down mode DestroyAll followed by KillClient
    fn kill_client(&self, window: Handle) -> Result<()>;
}
