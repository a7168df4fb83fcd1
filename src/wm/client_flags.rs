//! Client Flags Module
//!
//! Per-window state bits.

use bitflags::bitflags;

bitflags! {
    /// Client flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClientFlags: u32 {
        /// Declared WM_TRANSIENT_FOR
        const FLOATING = 1 << 0;
        /// `_NET_WM_STATE_FULLSCREEN` is set
        const FULLSCREEN = 1 << 1;
    }
}
