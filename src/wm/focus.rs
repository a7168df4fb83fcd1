//! Focus Module
//!
//! Tracks the selected window and prevents focus stealing.

use anyhow::Result;
use tracing::debug;

use crate::wm::display::{Handle, XConn};

/// Focus controller
#[derive(Debug)]
pub struct FocusController {
    /// Window last focused through [`FocusController::focus`]; the root or
    /// a managed window
    selected: Option<Handle>,
    /// Revert focus changes the controller did not ask for
    revert: bool,
}

impl FocusController {
    pub fn new(revert: bool) -> Self {
        Self {
            selected: None,
            revert,
        }
    }

    pub fn selected(&self) -> Option<Handle> {
        self.selected
    }

    /// Give input focus to `window` and record it as selected.
    pub fn focus<C: XConn>(&mut self, conn: &C, window: Handle) -> Result<()> {
        debug!("Focus window {}", window);
        let root = conn.root();
        if window != root {
            conn.grab_buttons(window, true)?;
        }
        conn.set_input_focus(window)?;

        let take_focus = conn.atoms()._wm_take_focus;
        if window != root && conn.supports_protocol(window, take_focus)? {
            conn.send_protocol_message(window, take_focus)?;
        }
        conn.flush()?;

        self.selected = Some(window);
        Ok(())
    }

    /// React to a FocusIn on `window`.
    ///
    /// Focus moved to a managed window other than the selection means a
    /// client took focus on its own; focus goes back to the selection, or
    /// to the root if the selection is no longer managed. Returns whether
    /// focus was reverted.
    pub fn on_focus_in<C: XConn>(
        &mut self,
        conn: &C,
        window: Handle,
        is_managed: impl Fn(Handle) -> bool,
    ) -> Result<bool> {
        let Some(selected) = self.selected else {
            return Ok(false);
        };
        if !self.revert || window == selected || !is_managed(window) {
            return Ok(false);
        }

        let root = conn.root();
        let target = if selected == root || is_managed(selected) {
            selected
        } else {
            debug!("Selected window {} is gone, falling back to the root", selected);
            root
        };
        debug!("Reverting focus change by window {} to {}", window, target);
        self.focus(conn, target)?;
        Ok(true)
    }
}
