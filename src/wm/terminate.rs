//! Terminate Module
//!
//! Closing clients: WM_DELETE_WINDOW when the client supports it,
//! otherwise killing its connection.

use anyhow::Result;
use tracing::{debug, info};

use crate::wm::display::{ErrorMode, Handle, XConn};

/// Ask `window` to close, or kill its client if it cannot be asked.
pub fn terminate<C: XConn>(conn: &C, window: Handle) -> Result<()> {
    let delete = conn.atoms()._wm_delete_window;
    if conn.supports_protocol(window, delete)? {
        close_window(conn, window)
    } else {
        force_kill(conn, window)
    }
}

/// Send WM_DELETE_WINDOW
pub fn close_window<C: XConn>(conn: &C, window: Handle) -> Result<()> {
    info!("Closing window {}", window);
    conn.send_protocol_message(window, conn.atoms()._wm_delete_window)?;
    conn.flush()?;
    Ok(())
}

/// Kill the client owning `window`.
///
/// Runs with the server grabbed and protocol errors ignored: the client
/// may disappear between the request and the sync.
pub fn force_kill<C: XConn>(conn: &C, window: Handle) -> Result<()> {
    debug!("Force killing window {}", window);
    conn.grab_server()?;
    conn.set_error_mode(ErrorMode::Ignore);
    let killed = conn.kill_client(window).and_then(|()| conn.sync());
    conn.set_error_mode(ErrorMode::Log);
    conn.ungrab_server()?;
    conn.flush()?;
    killed
}
