//! nwm
//!
//! Session core of an X11 window manager. Tracks windows, monitors, key
//! grabs and focus, reports changes to an external controller as typed
//! notifications and applies the controller's commands. Layout policy
//! lives entirely in the controller.

pub mod config;
pub mod shared;
pub mod wm;
pub mod x11_async;
