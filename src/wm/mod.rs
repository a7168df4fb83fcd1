//! Window Manager Module
//!
//! The session core: owns the X connection, the window/monitor/key
//! registries and focus state, turns queued X events into notifications
//! and applies the controller's commands.

pub mod bridge;
pub mod client;
pub mod client_flags;
pub mod display;
pub mod events;
pub mod ewmh;
pub mod focus;
pub mod hints;
pub mod keyboard;
pub mod moveresize;
pub mod screen;
pub mod terminate;
pub mod xconn;

#[cfg(test)]
pub(crate) mod testing;

use std::os::unix::io::{AsRawFd, RawFd};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use nwm_ipc::{Command, Notification};

use crate::shared::Geometry;
use crate::wm::client::ClientRegistry;
use crate::wm::client_flags::ClientFlags;
use crate::wm::display::{Atom, Handle, WindowChanges, XConn};
use crate::wm::events::XEvent;
use crate::wm::ewmh::{NET_WM_STATE_ADD, NET_WM_STATE_REMOVE, NET_WM_STATE_TOGGLE};
use crate::wm::focus::FocusController;
use crate::wm::keyboard::KeyGrabTable;
use crate::wm::moveresize::DragState;
use crate::wm::screen::MonitorRegistry;

pub use bridge::Bridge;
pub use xconn::X11Conn;

/// Behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Track pointer drags started on managed windows
    pub pointer_drag: bool,
    /// Send focus back to the selected window when a client takes it
    pub revert_focus: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            pointer_drag: false,
            revert_focus: true,
        }
    }
}

/// Session core
///
/// Not thread-safe. The host must serialize `drain` and command calls.
pub struct Session<C: XConn> {
    conn: C,
    root: Handle,
    screen: (u32, u32),
    keys: KeyGrabTable,
    monitors: MonitorRegistry,
    clients: ClientRegistry,
    focus: FocusController,
    drag: DragState,
    bridge: Bridge,
    options: SessionOptions,
}

impl Session<X11Conn> {
    /// Connect to the X server. The session does nothing until
    /// [`Session::start`].
    pub fn open(display: Option<&str>, bridge: Bridge, options: SessionOptions) -> Result<Self> {
        let conn = X11Conn::connect(display)?;
        Ok(Self::new(conn, bridge, options))
    }
}

impl AsRawFd for Session<X11Conn> {
    fn as_raw_fd(&self) -> RawFd {
        self.conn.as_raw_fd()
    }
}

impl<C: XConn> Session<C> {
    pub fn new(conn: C, bridge: Bridge, options: SessionOptions) -> Self {
        let root = conn.root();
        let screen = conn.screen_size();
        Self {
            conn,
            root,
            screen,
            keys: KeyGrabTable::new(),
            monitors: MonitorRegistry::new(),
            clients: ClientRegistry::new(),
            focus: FocusController::new(options.revert_focus),
            drag: DragState::default(),
            bridge,
            options,
        }
    }

    pub fn screen_size(&self) -> (u32, u32) {
        self.screen
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn monitors(&self) -> &MonitorRegistry {
        &self.monitors
    }

    pub fn keys(&self) -> &KeyGrabTable {
        &self.keys
    }

    pub fn selected(&self) -> Option<Handle> {
        self.focus.selected()
    }

    /// Take over the root window: report monitors, install key grabs and
    /// manage the windows that are already mapped.
    ///
    /// Register key bindings before calling this.
    pub fn start(&mut self) -> Result<()> {
        info!("Starting session on root 0x{:x} ({}x{})", self.root, self.screen.0, self.screen.1);
        self.monitors.rescan(&self.conn, self.screen, &self.bridge)?;

        if let Err(err) = self.conn.select_root_events() {
            error!("{:#}", err);
        }
        self.keys.rebuild(&self.conn)?;
        self.scan_windows()?;

        self.bridge.emit(Notification::Rearrange);
        self.conn.sync()
    }

    /// Manage existing windows, transients after everything else
    fn scan_windows(&mut self) -> Result<()> {
        let windows = self.conn.top_level_windows()?;
        debug!("Scanning {} top-level windows", windows.len());

        let mut transients = Vec::new();
        for window in windows {
            let Some(attrs) = self.conn.window_attributes(window)? else {
                continue;
            };
            if attrs.override_redirect || !attrs.viewable {
                continue;
            }
            if self.conn.transient_for(window)?.is_some() {
                transients.push((window, attrs));
            } else {
                self.clients.add(&self.conn, window, &attrs, &self.bridge)?;
            }
        }
        for (window, attrs) in transients {
            self.clients.add(&self.conn, window, &attrs, &self.bridge)?;
        }

        info!("Initial scan managed {} windows", self.clients.len());
        Ok(())
    }

    /// Handle every queued event, then return.
    ///
    /// A handler failure is logged and the next event is handled. Only a
    /// failure to read the queue ends the drain early. Returns the number
    /// of events read.
    pub fn drain(&mut self) -> Result<usize> {
        let mut count = 0;
        while let Some(event) = self.conn.poll_event()? {
            count += 1;
            let name = event.name();
            if let Err(err) = self.dispatch(event) {
                error!("Failed to handle {}: {:#}", name, err);
            }
        }
        self.conn.flush()?;
        Ok(count)
    }

    fn dispatch(&mut self, event: XEvent) -> Result<()> {
        debug!("Event {:?}", event);
        match event {
            XEvent::ButtonPress {
                window,
                root_x,
                root_y,
                button,
            } => self.on_button_press(window, root_x, root_y, button),
            XEvent::ButtonRelease { .. } => {
                if self.drag.release() {
                    debug!("Drag finished");
                    self.conn.ungrab_pointer()?;
                }
                Ok(())
            }
            XEvent::Motion { root_x, root_y } => {
                if let Some(notification) = self.drag.motion(root_x, root_y) {
                    self.bridge.emit(notification);
                }
                Ok(())
            }
            XEvent::ClientMessage {
                window,
                message_type,
                format,
                data,
            } => self.on_client_message(window, message_type, format, data),
            XEvent::ConfigureRequest(request) => {
                // Answered by the controller through configure/notify commands
                self.bridge.emit(Notification::ConfigureRequest(request));
                Ok(())
            }
            XEvent::ConfigureNotify { window, geometry } => self.on_configure_notify(window, geometry),
            XEvent::DestroyNotify { window } => self.remove_window(window, true),
            XEvent::EnterNotify {
                window,
                root_x,
                root_y,
            } => {
                self.bridge.emit(Notification::Enter {
                    id: window,
                    x: root_x,
                    y: root_y,
                });
                Ok(())
            }
            XEvent::FocusIn { window, incidental } => {
                if incidental {
                    debug!("Ignoring incidental focus change on window {}", window);
                    return Ok(());
                }
                let clients = &self.clients;
                self.focus.on_focus_in(&self.conn, window, |w| clients.contains(w))?;
                Ok(())
            }
            XEvent::KeyPress { keycode, state, x, y } => {
                let (keysym, modifier) = self.keys.resolve_press(keycode, state);
                self.bridge.emit(Notification::KeyPress {
                    x,
                    y,
                    keycode,
                    keysym,
                    modifier,
                });
                Ok(())
            }
            XEvent::MapRequest { window } => self.on_map_request(window),
            XEvent::PropertyNotify { window, atom, deleted } => self.on_property_notify(window, atom, deleted),
            XEvent::UnmapNotify { window } => self.remove_window(window, false),
            XEvent::MappingNotify => {
                info!("Keyboard mapping changed");
                self.keys.rebuild(&self.conn)
            }
            XEvent::Error {
                error_code,
                major_opcode,
                bad_value,
            } => {
                warn!(
                    "X11 error: code {} from request {} (resource 0x{:x})",
                    error_code, major_opcode, bad_value
                );
                Ok(())
            }
            XEvent::Other(response_type) => {
                debug!("Did nothing with event type {}", response_type);
                Ok(())
            }
        }
    }

    fn on_button_press(&mut self, window: Handle, x: i32, y: i32, button: u8) -> Result<()> {
        self.bridge.emit(Notification::MouseDown {
            id: window,
            x,
            y,
            button,
        });

        if !self.options.pointer_drag || self.drag.is_dragging() || !self.clients.contains(window) {
            return Ok(());
        }
        if self.conn.grab_pointer()? {
            debug!("Drag started on window {} at ({}, {})", window, x, y);
            self.drag.begin(window, x, y);
        }
        Ok(())
    }

    fn on_client_message(&mut self, window: Handle, message_type: Atom, format: u8, data: [u32; 5]) -> Result<()> {
        let atoms = self.conn.atoms();
        if message_type != atoms.net_wm_state || format != 32 {
            debug!("Ignoring client message type {} for window {}", message_type, window);
            return Ok(());
        }
        let fullscreen = atoms._net_wm_state_fullscreen;
        if data[1] != fullscreen && data[2] != fullscreen {
            return Ok(());
        }

        let current = self.clients.get(window).is_some_and(|c| c.is_fullscreen());
        let status = match data[0] {
            NET_WM_STATE_REMOVE => false,
            NET_WM_STATE_ADD => true,
            NET_WM_STATE_TOGGLE => !current,
            action => {
                warn!("Unknown _NET_WM_STATE action {} for window {}", action, window);
                return Ok(());
            }
        };
        self.set_fullscreen(window, status)
    }

    fn set_fullscreen(&mut self, window: Handle, status: bool) -> Result<()> {
        let net_wm_state = self.conn.atoms().net_wm_state;
        let fullscreen = self.conn.atoms()._net_wm_state_fullscreen;
        info!("Window {} fullscreen: {}", window, status);

        if status {
            self.conn.set_atom_property(window, net_wm_state, &[fullscreen])?;
            self.conn.configure_window(window, &WindowChanges::new().raise())?;
        } else {
            self.conn.set_atom_property(window, net_wm_state, &[])?;
        }
        if let Some(client) = self.clients.get_mut(window) {
            client.flags.set(ClientFlags::FULLSCREEN, status);
        }

        self.bridge.emit(Notification::Fullscreen { id: window, status });
        self.conn.flush()
    }

    fn on_configure_notify(&mut self, window: Handle, geometry: Geometry) -> Result<()> {
        if window != self.root {
            return Ok(());
        }
        info!("Root geometry changed to {}x{}", geometry.width, geometry.height);
        self.screen = (geometry.width, geometry.height);
        self.monitors.rescan(&self.conn, self.screen, &self.bridge)?;
        self.bridge.emit(Notification::Rearrange);
        Ok(())
    }

    fn on_map_request(&mut self, window: Handle) -> Result<()> {
        let Some(attrs) = self.conn.window_attributes(window)? else {
            debug!("MapRequest for vanished window {}", window);
            return Ok(());
        };
        if attrs.override_redirect {
            return Ok(());
        }
        if self.clients.contains(window) {
            debug!("Window {} is known", window);
            return Ok(());
        }

        self.clients.add(&self.conn, window, &attrs, &self.bridge)?;
        self.bridge.emit(Notification::Rearrange);
        Ok(())
    }

    fn on_property_notify(&mut self, window: Handle, atom: Atom, deleted: bool) -> Result<()> {
        if window == self.root || deleted {
            return Ok(());
        }
        if self.conn.atoms().is_name_property(atom) {
            self.clients.update_metadata(&self.conn, window, &self.bridge)?;
        }
        Ok(())
    }

    /// Unmanage `window`, then give focus to the root and ask for a new
    /// layout. Repeated notifications for the same window do nothing.
    fn remove_window(&mut self, window: Handle, destroyed: bool) -> Result<()> {
        if !self.clients.remove(&self.conn, window, destroyed, &self.bridge)? {
            return Ok(());
        }
        if self.drag.forget(window) {
            self.conn.ungrab_pointer()?;
        }

        self.focus.focus(&self.conn, self.root)?;
        self.bridge.emit(Notification::Rearrange);
        Ok(())
    }

    // Command surface

    pub fn move_window(&mut self, window: Handle, x: i32, y: i32) -> Result<()> {
        debug!("Move window {} to ({}, {})", window, x, y);
        self.configure_client(window, WindowChanges::new().position(x, y))
    }

    pub fn resize_window(&mut self, window: Handle, width: u32, height: u32) -> Result<()> {
        debug!("Resize window {} to {}x{}", window, width, height);
        self.configure_client(window, WindowChanges::new().size(width, height))
    }

    /// Apply the fields of a ConfigureWindow request selected by `value_mask`
    #[allow(clippy::too_many_arguments)]
    pub fn configure_window(
        &mut self,
        window: Handle,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        border_width: u32,
        above: Handle,
        detail: u8,
        value_mask: u16,
    ) -> Result<()> {
        let changes = WindowChanges::from_mask(value_mask, x, y, width, height, border_width, above, detail);
        debug!("Configure window {}: {:?}", window, changes);
        self.configure_client(window, changes)
    }

    fn configure_client(&mut self, window: Handle, changes: WindowChanges) -> Result<()> {
        self.conn.configure_window(window, &changes)?;
        if let Some(client) = self.clients.get_mut(window) {
            client.apply_changes(&changes);
        }
        self.conn.flush()
    }

    /// Tell a client its geometry without changing it
    pub fn notify_configured(
        &mut self,
        window: Handle,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        border_width: u32,
    ) -> Result<()> {
        self.conn
            .send_configure_notify(window, Geometry::new(x, y, width, height), border_width)?;
        self.conn.flush()
    }

    /// Focus the root or a managed window. Other handles are ignored.
    pub fn focus_window(&mut self, window: Handle) -> Result<()> {
        if window != self.root && !self.clients.contains(window) {
            debug!("Not focusing unmanaged window {}", window);
            return Ok(());
        }
        self.focus.focus(&self.conn, window)
    }

    pub fn terminate_window(&mut self, window: Handle) -> Result<()> {
        terminate::terminate(&self.conn, window)
    }

    /// Takes effect on the next [`Session::rebuild_key_grabs`]
    pub fn register_key_binding(&mut self, keysym: u32, modifier: u16) {
        self.keys.register(keysym, modifier);
    }

    pub fn rebuild_key_grabs(&mut self) -> Result<()> {
        self.keys.rebuild(&self.conn)
    }

    /// Run a controller command
    pub fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Move { id, x, y } => self.move_window(id, x, y),
            Command::Resize { id, width, height } => self.resize_window(id, width, height),
            Command::Configure {
                id,
                x,
                y,
                width,
                height,
                border_width,
                above,
                detail,
                value_mask,
            } => self.configure_window(id, x, y, width, height, border_width, above, detail, value_mask),
            Command::NotifyConfigured {
                id,
                x,
                y,
                width,
                height,
                border_width,
            } => self.notify_configured(id, x, y, width, height, border_width),
            Command::Focus { id } => self.focus_window(id),
            Command::Kill { id } => self.terminate_window(id),
            Command::AddKey { keysym, modifier } => {
                self.register_key_binding(keysym, modifier);
                Ok(())
            }
            Command::GrabKeys => self.rebuild_key_grabs(),
        }
    }
}
