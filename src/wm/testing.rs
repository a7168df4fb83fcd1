//! In-memory display server for unit tests.
//!
//! `FakeConn` answers queries from a small window table and records every
//! request in order so tests can assert on the exact protocol traffic.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, bail};

use crate::shared::Geometry;
use crate::wm::display::{Atom, ClassHint, ErrorMode, Handle, WindowAttributes, WindowChanges, XConn};
use crate::wm::events::XEvent;
use crate::wm::ewmh::Atoms;
use crate::wm::hints;
use crate::wm::keyboard::Keymap;

pub const ROOT: Handle = 0x1;
pub const SCREEN: (u32, u32) = (1920, 1080);

pub fn fake_atoms() -> Atoms {
    Atoms {
        wm_name: 39,
        net_wm_name: 300,
        net_wm_state: 301,
        _net_wm_state_fullscreen: 302,
        _wm_protocols: 303,
        _wm_delete_window: 304,
        _wm_take_focus: 305,
        utf8_string: 306,
    }
}

fn atom_by_name(name: &str) -> Atom {
    let atoms = fake_atoms();
    match name {
        "WM_DELETE_WINDOW" => atoms._wm_delete_window,
        "WM_TAKE_FOCUS" => atoms._wm_take_focus,
        other => panic!("no fake atom for {other}"),
    }
}

/// US layout fragment: Return, a/A, Num_Lock, Caps_Lock, Super_L.
/// Num_Lock is bound to Mod2, Caps_Lock to Lock.
pub fn us_keymap() -> Keymap {
    let min_keycode = 8u8;
    let per = 2usize;
    let mut keysyms = vec![0u32; (255 - min_keycode as usize + 1) * per];
    let mut set = |keycode: usize, syms: [u32; 2]| {
        let at = (keycode - min_keycode as usize) * per;
        keysyms[at..at + per].copy_from_slice(&syms);
    };
    set(36, [0xff0d, 0]);
    set(38, [0x0061, 0x0041]);
    set(66, [0xffe5, 0]);
    set(77, [0xff7f, 0]);
    set(133, [0xffeb, 0]);

    Keymap {
        min_keycode,
        keysyms_per_keycode: per as u8,
        keysyms,
        keycodes_per_modifier: 2,
        modifier_keycodes: vec![
            50, 62, // Shift
            66, 0, // Lock
            37, 105, // Control
            64, 108, // Mod1
            77, 0, // Mod2
            0, 0, // Mod3
            133, 134, // Mod4
            0, 0, // Mod5
        ],
    }
}

/// A window known to the fake server
#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub attrs: WindowAttributes,
    pub wm_name: Option<String>,
    pub net_wm_name: Option<String>,
    pub class: Option<ClassHint>,
    pub transient_for: Option<Handle>,
    pub protocols: Vec<Atom>,
}

impl FakeWindow {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            attrs: WindowAttributes {
                geometry: Geometry::new(x, y, width, height),
                border_width: 1,
                override_redirect: false,
                viewable: true,
            },
            wm_name: None,
            net_wm_name: None,
            class: None,
            transient_for: None,
            protocols: Vec::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.wm_name = Some(name.to_string());
        self
    }

    pub fn net_named(mut self, name: &str) -> Self {
        self.net_wm_name = Some(name.to_string());
        self
    }

    pub fn class(mut self, instance: &str, class: &str) -> Self {
        self.class = Some(ClassHint {
            instance: Some(instance.to_string()),
            class: Some(class.to_string()),
        });
        self
    }

    pub fn transient_for(mut self, parent: Handle) -> Self {
        self.transient_for = Some(parent);
        self
    }

    pub fn protocols(mut self, names: &[&str]) -> Self {
        self.protocols = names.iter().map(|name| atom_by_name(name)).collect();
        self
    }

    pub fn override_redirect(mut self) -> Self {
        self.attrs.override_redirect = true;
        self
    }

    pub fn unviewable(mut self) -> Self {
        self.attrs.viewable = false;
        self
    }
}

/// A request as seen by the fake server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Flush,
    Sync,
    SetErrorMode(ErrorMode),
    SelectRootEvents,
    SelectClientEvents(Handle),
    UngrabAllKeys,
    GrabKey(u8, u16),
    GrabButtons(Handle, bool),
    UngrabButtons(Handle),
    GrabPointer,
    UngrabPointer,
    GrabServer,
    UngrabServer,
    Configure(Handle, WindowChanges),
    ConfigureNotify(Handle, Geometry, u32),
    Map(Handle),
    SetInputFocus(Handle),
    SendProtocol(Handle, Atom),
    SetAtomProperty(Handle, Atom, Vec<Atom>),
    KillClient(Handle),
}

#[derive(Debug)]
pub struct FakeState {
    /// Children of the root in stacking order
    pub windows: Vec<(Handle, FakeWindow)>,
    pub topology: Option<Vec<Geometry>>,
    pub pointer: Option<(i32, i32)>,
    pub keymap: Keymap,
    pub events: VecDeque<XEvent>,
    pub calls: Vec<Call>,
    pub pointer_grab_ok: bool,
    pub select_root_fails: bool,
    pub queue_broken: bool,
}

pub struct FakeConn {
    atoms: Atoms,
    pub state: RefCell<FakeState>,
}

impl FakeConn {
    pub fn new() -> Self {
        Self {
            atoms: fake_atoms(),
            state: RefCell::new(FakeState {
                windows: Vec::new(),
                topology: None,
                pointer: Some((0, 0)),
                keymap: us_keymap(),
                events: VecDeque::new(),
                calls: Vec::new(),
                pointer_grab_ok: true,
                select_root_fails: false,
                queue_broken: false,
            }),
        }
    }

    pub fn add_window(&self, window: Handle, fake: FakeWindow) {
        let mut state = self.state.borrow_mut();
        state.windows.retain(|(w, _)| *w != window);
        state.windows.push((window, fake));
    }

    pub fn destroy_window(&self, window: Handle) {
        self.state.borrow_mut().windows.retain(|(w, _)| *w != window);
    }

    pub fn set_topology(&self, topology: Option<Vec<Geometry>>) {
        self.state.borrow_mut().topology = topology;
    }

    pub fn push_event(&self, event: XEvent) {
        self.state.borrow_mut().events.push_back(event);
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.state.borrow_mut().calls)
    }

    fn record(&self, call: Call) -> Result<()> {
        self.state.borrow_mut().calls.push(call);
        Ok(())
    }

    fn with_window<T>(&self, window: Handle, f: impl FnOnce(&FakeWindow) -> T) -> Option<T> {
        let state = self.state.borrow();
        state.windows.iter().find(|(w, _)| *w == window).map(|(_, fake)| f(fake))
    }
}

impl XConn for FakeConn {
    fn root(&self) -> Handle {
        ROOT
    }

    fn screen_size(&self) -> (u32, u32) {
        SCREEN
    }

    fn atoms(&self) -> &Atoms {
        &self.atoms
    }

    fn poll_event(&self) -> Result<Option<XEvent>> {
        let mut state = self.state.borrow_mut();
        if state.queue_broken {
            bail!("connection closed");
        }
        Ok(state.events.pop_front())
    }

    fn flush(&self) -> Result<()> {
        self.record(Call::Flush)
    }

    fn sync(&self) -> Result<()> {
        self.record(Call::Sync)
    }

    fn set_error_mode(&self, mode: ErrorMode) {
        self.state.borrow_mut().calls.push(Call::SetErrorMode(mode));
    }

    fn top_level_windows(&self) -> Result<Vec<Handle>> {
        Ok(self.state.borrow().windows.iter().map(|(w, _)| *w).collect())
    }

    fn window_attributes(&self, window: Handle) -> Result<Option<WindowAttributes>> {
        Ok(self.with_window(window, |fake| fake.attrs))
    }

    fn transient_for(&self, window: Handle) -> Result<Option<Handle>> {
        Ok(hints::transient_parent(self.with_window(window, |fake| fake.transient_for).flatten()))
    }

    fn text_property(&self, window: Handle, property: Atom) -> Result<Option<String>> {
        let value = self.with_window(window, |fake| {
            if property == self.atoms.net_wm_name {
                fake.net_wm_name.clone()
            } else if property == self.atoms.wm_name {
                fake.wm_name.clone()
            } else {
                None
            }
        });
        Ok(value.flatten())
    }

    fn class_hint(&self, window: Handle) -> Result<Option<ClassHint>> {
        Ok(self.with_window(window, |fake| fake.class.clone()).flatten())
    }

    fn supports_protocol(&self, window: Handle, protocol: Atom) -> Result<bool> {
        Ok(self
            .with_window(window, |fake| fake.protocols.contains(&protocol))
            .unwrap_or(false))
    }

    fn topology(&self) -> Result<Option<Vec<Geometry>>> {
        Ok(self.state.borrow().topology.clone())
    }

    fn pointer_position(&self) -> Result<Option<(i32, i32)>> {
        Ok(self.state.borrow().pointer)
    }

    fn keyboard_map(&self) -> Result<Keymap> {
        Ok(self.state.borrow().keymap.clone())
    }

    fn select_root_events(&self) -> Result<()> {
        if self.state.borrow().select_root_fails {
            bail!("another window manager is running");
        }
        self.record(Call::SelectRootEvents)
    }

    fn select_client_events(&self, window: Handle) -> Result<()> {
        self.record(Call::SelectClientEvents(window))
    }

    fn ungrab_all_keys(&self) -> Result<()> {
        self.record(Call::UngrabAllKeys)
    }

    fn grab_key(&self, keycode: u8, modifiers: u16) -> Result<()> {
        self.record(Call::GrabKey(keycode, modifiers))
    }

    fn grab_buttons(&self, window: Handle, focused: bool) -> Result<()> {
        self.record(Call::GrabButtons(window, focused))
    }

    fn ungrab_buttons(&self, window: Handle) -> Result<()> {
        self.record(Call::UngrabButtons(window))
    }

    fn grab_pointer(&self) -> Result<bool> {
        self.record(Call::GrabPointer)?;
        Ok(self.state.borrow().pointer_grab_ok)
    }

    fn ungrab_pointer(&self) -> Result<()> {
        self.record(Call::UngrabPointer)
    }

    fn grab_server(&self) -> Result<()> {
        self.record(Call::GrabServer)
    }

    fn ungrab_server(&self) -> Result<()> {
        self.record(Call::UngrabServer)
    }

    fn configure_window(&self, window: Handle, changes: &WindowChanges) -> Result<()> {
        self.record(Call::Configure(window, *changes))
    }

    fn send_configure_notify(&self, window: Handle, geometry: Geometry, border_width: u32) -> Result<()> {
        self.record(Call::ConfigureNotify(window, geometry, border_width))
    }

    fn map_window(&self, window: Handle) -> Result<()> {
        self.record(Call::Map(window))
    }

    fn set_input_focus(&self, window: Handle) -> Result<()> {
        self.record(Call::SetInputFocus(window))
    }

    fn send_protocol_message(&self, window: Handle, protocol: Atom) -> Result<()> {
        self.record(Call::SendProtocol(window, protocol))
    }

    fn set_atom_property(&self, window: Handle, property: Atom, values: &[Atom]) -> Result<()> {
        self.record(Call::SetAtomProperty(window, property, values.to_vec()))
    }

    fn kill_client(&self, window: Handle) -> Result<()> {
        self.record(Call::KillClient(window))
    }
}
