//! X11 connection backed by x11rb

use std::cell::Cell;
use std::os::unix::io::{AsRawFd, RawFd};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::cookie::VoidCookie;
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::xinerama::{self, ConnectionExt as _};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{CURRENT_TIME, NONE};

use crate::shared::Geometry;
use crate::wm::display::{Atom, ClassHint, ErrorMode, Handle, WindowAttributes, WindowChanges, XConn};
use crate::wm::events::XEvent;
use crate::wm::ewmh::Atoms;
use crate::wm::hints;
use crate::wm::keyboard::Keymap;

/// Upper bound on property reads, in 32-bit units
const PROPERTY_LENGTH: u32 = 1024;

/// Live connection to the X server
pub struct X11Conn {
    conn: RustConnection,
    root: Window,
    screen_size: (u32, u32),
    atoms: Atoms,
    xinerama: bool,
    error_mode: Cell<ErrorMode>,
}

/// A reply that fails with a protocol error means the window is gone
fn optional<T>(reply: Result<T, ReplyError>) -> Result<Option<T>> {
    match reply {
        Ok(reply) => Ok(Some(reply)),
        Err(ReplyError::X11Error(err)) => {
            debug!("Request failed: {:?}", err.error_kind);
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

impl X11Conn {
    /// Connect to `display`, or to `$DISPLAY` when `None`
    pub fn connect(display: Option<&str>) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(display)
            .with_context(|| format!("Failed to connect to X server {}", display.unwrap_or("$DISPLAY")))?;

        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .with_context(|| format!("Screen {} not found", screen_num))?;
        let root = screen.root;
        let screen_size = (screen.width_in_pixels.into(), screen.height_in_pixels.into());
        info!(
            "Connected to X server: screen {}, root 0x{:x}, {}x{}",
            screen_num, root, screen_size.0, screen_size.1
        );

        let atoms = Atoms::new(&conn)?;
        let xinerama = conn
            .extension_information(xinerama::X11_EXTENSION_NAME)
            .context("Failed to query Xinerama")?
            .is_some();
        debug!("Xinerama extension present: {}", xinerama);

        Ok(Self {
            conn,
            root,
            screen_size,
            atoms,
            xinerama,
            error_mode: Cell::new(ErrorMode::Log),
        })
    }

    /// Dispose of a request's error cookie according to the error mode.
    ///
    /// A dropped cookie delivers its error through the event queue, where
    /// the drain logs it.
    fn void(&self, cookie: Result<VoidCookie<'_, RustConnection>, ConnectionError>) -> Result<()> {
        let cookie = cookie?;
        if self.error_mode.get() == ErrorMode::Ignore {
            cookie.ignore_error();
        }
        Ok(())
    }

    fn property(&self, window: Handle, property: Atom, type_: impl Into<Atom>) -> Result<Option<GetPropertyReply>> {
        let reply = optional(
            self.conn
                .get_property(false, window, property, type_, 0, PROPERTY_LENGTH)?
                .reply(),
        )?;
        Ok(reply.filter(|r| r.type_ != u32::from(AtomEnum::NONE)))
    }
}

impl AsRawFd for X11Conn {
    fn as_raw_fd(&self) -> RawFd {
        self.conn.stream().as_raw_fd()
    }
}

impl XConn for X11Conn {
    fn root(&self) -> Handle {
        self.root
    }

    fn screen_size(&self) -> (u32, u32) {
        self.screen_size
    }

    fn atoms(&self) -> &Atoms {
        &self.atoms
    }

    fn poll_event(&self) -> Result<Option<XEvent>> {
        let event = self.conn.poll_for_event().context("Failed to read X11 event")?;
        Ok(event.map(XEvent::from))
    }

    fn flush(&self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        // Events read while waiting stay queued for the next poll
        self.conn.get_input_focus()?.reply()?;
        Ok(())
    }

    fn set_error_mode(&self, mode: ErrorMode) {
        self.error_mode.set(mode);
    }

    fn top_level_windows(&self) -> Result<Vec<Handle>> {
        let tree = self
            .conn
            .query_tree(self.root)?
            .reply()
            .context("Failed to query window tree")?;
        Ok(tree.children)
    }

    fn window_attributes(&self, window: Handle) -> Result<Option<WindowAttributes>> {
        let attrs_cookie = self.conn.get_window_attributes(window)?;
        let geometry_cookie = self.conn.get_geometry(window)?;
        let (Some(attrs), Some(geometry)) = (optional(attrs_cookie.reply())?, optional(geometry_cookie.reply())?)
        else {
            return Ok(None);
        };

        Ok(Some(WindowAttributes {
            geometry: Geometry::new(
                geometry.x.into(),
                geometry.y.into(),
                geometry.width.into(),
                geometry.height.into(),
            ),
            border_width: geometry.border_width.into(),
            override_redirect: attrs.override_redirect,
            viewable: attrs.map_state == MapState::VIEWABLE,
        }))
    }

    fn transient_for(&self, window: Handle) -> Result<Option<Handle>> {
        let reply = self.property(window, AtomEnum::WM_TRANSIENT_FOR.into(), AtomEnum::WINDOW)?;
        Ok(hints::transient_parent(
            reply.and_then(|r| r.value32().and_then(|mut values| values.next())),
        ))
    }

    fn text_property(&self, window: Handle, property: Atom) -> Result<Option<String>> {
        let Some(reply) = self.property(window, property, AtomEnum::ANY)? else {
            return Ok(None);
        };
        if reply.format != 8 {
            return Ok(None);
        }
        let is_latin1 = reply.type_ == u32::from(AtomEnum::STRING);
        if !is_latin1 && reply.type_ != self.atoms.utf8_string {
            debug!("Decoding text property {} of type {} as UTF-8", property, reply.type_);
        }
        Ok(hints::decode_text(&reply.value, is_latin1))
    }

    fn class_hint(&self, window: Handle) -> Result<Option<ClassHint>> {
        let reply = self.property(window, AtomEnum::WM_CLASS.into(), AtomEnum::STRING)?;
        Ok(reply.map(|r| hints::parse_wm_class(&r.value)))
    }

    fn supports_protocol(&self, window: Handle, protocol: Atom) -> Result<bool> {
        let reply = self.property(window, self.atoms._wm_protocols, AtomEnum::ATOM)?;
        Ok(reply
            .and_then(|r| r.value32().map(|values| hints::has_protocol(values, protocol)))
            .unwrap_or(false))
    }

    fn topology(&self) -> Result<Option<Vec<Geometry>>> {
        if !self.xinerama {
            return Ok(None);
        }
        let active = self.conn.xinerama_is_active()?.reply()?.state != 0;
        if !active {
            return Ok(None);
        }

        let screens = self
            .conn
            .xinerama_query_screens()?
            .reply()
            .context("Failed to query Xinerama screens")?;
        Ok(Some(
            screens
                .screen_info
                .iter()
                .map(|s| Geometry::new(s.x_org.into(), s.y_org.into(), s.width.into(), s.height.into()))
                .collect(),
        ))
    }

    fn pointer_position(&self) -> Result<Option<(i32, i32)>> {
        let reply = optional(self.conn.query_pointer(self.root)?.reply())?;
        Ok(reply
            .filter(|r| r.same_screen)
            .map(|r| (r.root_x.into(), r.root_y.into())))
    }

    fn keyboard_map(&self) -> Result<Keymap> {
        let setup = self.conn.setup();
        let min_keycode = setup.min_keycode;
        let count = setup.max_keycode.saturating_sub(min_keycode).saturating_add(1);

        let mapping = self
            .conn
            .get_keyboard_mapping(min_keycode, count)?
            .reply()
            .context("Failed to read keyboard mapping")?;
        let modifiers = self
            .conn
            .get_modifier_mapping()?
            .reply()
            .context("Failed to read modifier mapping")?;

        Ok(Keymap {
            min_keycode,
            keysyms_per_keycode: mapping.keysyms_per_keycode,
            keysyms: mapping.keysyms,
            keycodes_per_modifier: (modifiers.keycodes.len() / 8) as u8,
            modifier_keycodes: modifiers.keycodes,
        })
    }

    fn select_root_events(&self) -> Result<()> {
        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::BUTTON_PRESS
            | EventMask::ENTER_WINDOW
            | EventMask::LEAVE_WINDOW
            | EventMask::STRUCTURE_NOTIFY
            | EventMask::PROPERTY_CHANGE;
        self.conn
            .change_window_attributes(self.root, &ChangeWindowAttributesAux::new().event_mask(mask))?
            .check()
            .context("Failed to select root window events (another window manager running?)")?;
        Ok(())
    }

    fn select_client_events(&self, window: Handle) -> Result<()> {
        let mask = EventMask::ENTER_WINDOW
            | EventMask::FOCUS_CHANGE
            | EventMask::PROPERTY_CHANGE
            | EventMask::STRUCTURE_NOTIFY;
        self.void(
            self.conn
                .change_window_attributes(window, &ChangeWindowAttributesAux::new().event_mask(mask)),
        )
    }

    fn ungrab_all_keys(&self) -> Result<()> {
        self.void(self.conn.ungrab_key(Grab::ANY, self.root, ModMask::ANY))
    }

    fn grab_key(&self, keycode: u8, modifiers: u16) -> Result<()> {
        self.void(self.conn.grab_key(
            true,
            self.root,
            ModMask::from(modifiers),
            keycode,
            GrabMode::ASYNC,
            GrabMode::ASYNC,
        ))
    }

    fn grab_buttons(&self, window: Handle, focused: bool) -> Result<()> {
        self.ungrab_buttons(window)?;
        if !focused {
            self.void(self.conn.grab_button(
                false,
                window,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                NONE,
                NONE,
                ButtonIndex::ANY,
                ModMask::ANY,
            ))?;
        }
        Ok(())
    }

    fn ungrab_buttons(&self, window: Handle) -> Result<()> {
        self.void(self.conn.ungrab_button(ButtonIndex::ANY, window, ModMask::ANY))
    }

    fn grab_pointer(&self) -> Result<bool> {
        let reply = self
            .conn
            .grab_pointer(
                false,
                self.root,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                NONE,
                NONE,
                CURRENT_TIME,
            )?
            .reply()?;
        if reply.status != GrabStatus::SUCCESS {
            warn!("Pointer grab refused: {:?}", reply.status);
            return Ok(false);
        }
        Ok(true)
    }

    fn ungrab_pointer(&self) -> Result<()> {
        self.void(self.conn.ungrab_pointer(CURRENT_TIME))
    }

    fn grab_server(&self) -> Result<()> {
        self.void(self.conn.grab_server())
    }

    fn ungrab_server(&self) -> Result<()> {
        self.void(self.conn.ungrab_server())
    }

    fn configure_window(&self, window: Handle, changes: &WindowChanges) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let aux = ConfigureWindowAux::new()
            .x(changes.x)
            .y(changes.y)
            .width(changes.width)
            .height(changes.height)
            .border_width(changes.border_width)
            .sibling(changes.sibling)
            .stack_mode(changes.stack_mode.map(StackMode::from));
        self.void(self.conn.configure_window(window, &aux))
    }

    fn send_configure_notify(&self, window: Handle, geometry: Geometry, border_width: u32) -> Result<()> {
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: NONE,
            x: wire_position(geometry.x),
            y: wire_position(geometry.y),
            width: wire_extent(geometry.width),
            height: wire_extent(geometry.height),
            border_width: wire_extent(border_width),
            override_redirect: false,
        };
        self.void(self.conn.send_event(false, window, EventMask::STRUCTURE_NOTIFY, event))
    }

    fn map_window(&self, window: Handle) -> Result<()> {
        self.void(self.conn.map_window(window))
    }

    fn set_input_focus(&self, window: Handle) -> Result<()> {
        self.void(self.conn.set_input_focus(InputFocus::POINTER_ROOT, window, CURRENT_TIME))
    }

    fn send_protocol_message(&self, window: Handle, protocol: Atom) -> Result<()> {
        let event = ClientMessageEvent::new(32, window, self.atoms._wm_protocols, [protocol, CURRENT_TIME, 0, 0, 0]);
        self.void(self.conn.send_event(false, window, EventMask::NO_EVENT, event))
    }

    fn set_atom_property(&self, window: Handle, property: Atom, values: &[Atom]) -> Result<()> {
        self.void(self.conn.change_property32(PropMode::REPLACE, window, property, AtomEnum::ATOM, values))
    }

    fn kill_client(&self, window: Handle) -> Result<()> {
        self.void(self.conn.set_close_down_mode(CloseDown::DESTROY_ALL))?;
        self.void(self.conn.kill_client(window))
    }
}

/// Fit a coordinate into the 16-bit wire field
fn wire_position(value: i32) -> i16 {
    i16::try_from(value).unwrap_or_else(|_| {
        warn!("Coordinate {} out of range, clamped", value);
        value.clamp(i16::MIN.into(), i16::MAX.into()) as i16
    })
}

/// Fit a size into the 16-bit wire field
fn wire_extent(value: u32) -> u16 {
    u16::try_from(value).unwrap_or_else(|_| {
        warn!("Size {} out of range, clamped", value);
        u16::MAX
    })
}
