//! EWMH / ICCCM atoms used by the session core

use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ConnectionExt as _};

use crate::wm::display::Atom;

/// Holds all interned atoms
#[derive(Debug, Clone)]
pub struct Atoms {
    pub wm_name: Atom,
    pub net_wm_name: Atom,
    pub net_wm_state: Atom,
    pub _net_wm_state_fullscreen: Atom,
    pub _wm_protocols: Atom,
    pub _wm_delete_window: Atom,
    pub _wm_take_focus: Atom,
    pub utf8_string: Atom,
}

/// `_NET_WM_STATE` client message actions
pub const NET_WM_STATE_REMOVE: u32 = 0;
pub const NET_WM_STATE_ADD: u32 = 1;
pub const NET_WM_STATE_TOGGLE: u32 = 2;

impl Atoms {
    /// Intern all required atoms
    pub fn new<C: Connection>(conn: &C) -> Result<Self> {
        // Send every request before waiting on the first reply
        let names: [&[u8]; 7] = [
            b"_NET_WM_NAME",
            b"_NET_WM_STATE",
            b"_NET_WM_STATE_FULLSCREEN",
            b"WM_PROTOCOLS",
            b"WM_DELETE_WINDOW",
            b"WM_TAKE_FOCUS",
            b"UTF8_STRING",
        ];
        let cookies = names
            .iter()
            .map(|name| conn.intern_atom(false, name))
            .collect::<Result<Vec<_>, _>>()?;
        let mut atoms = Vec::with_capacity(cookies.len());
        for (cookie, name) in cookies.into_iter().zip(names) {
            let atom = cookie
                .reply()
                .with_context(|| format!("Failed to intern {}", String::from_utf8_lossy(name)))?
                .atom;
            atoms.push(atom);
        }

        Ok(Self {
            wm_name: AtomEnum::WM_NAME.into(),
            net_wm_name: atoms[0],
            net_wm_state: atoms[1],
            _net_wm_state_fullscreen: atoms[2],
            _wm_protocols: atoms[3],
            _wm_delete_window: atoms[4],
            _wm_take_focus: atoms[5],
            utf8_string: atoms[6],
        })
    }

    /// Whether a property change affects the window title
    pub fn is_name_property(&self, atom: Atom) -> bool {
        atom == self.wm_name || atom == self.net_wm_name
    }
}
