//! Events Module
//!
//! The subset of X11 events the session core reacts to. Incoming x11rb
//! events are translated once at the connection boundary; everything past
//! that point matches on [`XEvent`].

use x11rb::protocol::Event;
use x11rb::protocol::xproto::{Mapping, NotifyDetail, NotifyMode, Property};

use nwm_ipc::ConfigureRequest;

use crate::shared::Geometry;
use crate::wm::display::{Atom, Handle};

/// Event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XEvent {
    ButtonPress {
        window: Handle,
        root_x: i32,
        root_y: i32,
        button: u8,
    },
    ButtonRelease {
        button: u8,
    },
    Motion {
        root_x: i32,
        root_y: i32,
    },
    ClientMessage {
        window: Handle,
        message_type: Atom,
        format: u8,
        data: [u32; 5],
    },
    ConfigureRequest(ConfigureRequest),
    ConfigureNotify {
        window: Handle,
        geometry: Geometry,
    },
    DestroyNotify {
        window: Handle,
    },
    EnterNotify {
        window: Handle,
        root_x: i32,
        root_y: i32,
    },
    FocusIn {
        window: Handle,
        /// Pointer or inferior focus, or a keyboard grab starting or ending
        incidental: bool,
    },
    KeyPress {
        keycode: u8,
        state: u16,
        /// Position relative to the grab window (the root)
        x: i32,
        y: i32,
    },
    MapRequest {
        window: Handle,
    },
    PropertyNotify {
        window: Handle,
        atom: Atom,
        deleted: bool,
    },
    UnmapNotify {
        window: Handle,
    },
    /// Keyboard or modifier mapping changed
    MappingNotify,
    /// Protocol error reported by the server
    Error {
        error_code: u8,
        major_opcode: u8,
        bad_value: u32,
    },
    /// Anything without a handler, by response type
    Other(u8),
}

impl XEvent {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::ButtonPress { .. } => "ButtonPress",
            Self::ButtonRelease { .. } => "ButtonRelease",
            Self::Motion { .. } => "MotionNotify",
            Self::ClientMessage { .. } => "ClientMessage",
            Self::ConfigureRequest(_) => "ConfigureRequest",
            Self::ConfigureNotify { .. } => "ConfigureNotify",
            Self::DestroyNotify { .. } => "DestroyNotify",
            Self::EnterNotify { .. } => "EnterNotify",
            Self::FocusIn { .. } => "FocusIn",
            Self::KeyPress { .. } => "KeyPress",
            Self::MapRequest { .. } => "MapRequest",
            Self::PropertyNotify { .. } => "PropertyNotify",
            Self::UnmapNotify { .. } => "UnmapNotify",
            Self::MappingNotify => "MappingNotify",
            Self::Error { .. } => "Error",
            Self::Other(_) => "Other",
        }
    }
}

impl From<Event> for XEvent {
    fn from(event: Event) -> Self {
        match event {
            Event::ButtonPress(e) => Self::ButtonPress {
                window: e.event,
                root_x: e.root_x.into(),
                root_y: e.root_y.into(),
                button: e.detail,
            },
            Event::ButtonRelease(e) => Self::ButtonRelease { button: e.detail },
            Event::MotionNotify(e) => Self::Motion {
                root_x: e.root_x.into(),
                root_y: e.root_y.into(),
            },
            Event::ClientMessage(e) => Self::ClientMessage {
                window: e.window,
                message_type: e.type_,
                format: e.format,
                data: e.data.as_data32(),
            },
            Event::ConfigureRequest(e) => Self::ConfigureRequest(ConfigureRequest {
                id: e.window,
                x: e.x.into(),
                y: e.y.into(),
                width: e.width.into(),
                height: e.height.into(),
                border_width: e.border_width.into(),
                above: e.sibling,
                // StackMode values are 0..=4
                detail: u32::from(e.stack_mode) as u8,
                value_mask: e.value_mask.into(),
            }),
            Event::ConfigureNotify(e) => Self::ConfigureNotify {
                window: e.window,
                geometry: Geometry::new(e.x.into(), e.y.into(), e.width.into(), e.height.into()),
            },
            Event::DestroyNotify(e) => Self::DestroyNotify { window: e.window },
            Event::EnterNotify(e) => Self::EnterNotify {
                window: e.event,
                root_x: e.root_x.into(),
                root_y: e.root_y.into(),
            },
            Event::FocusIn(e) => Self::FocusIn {
                window: e.event,
                incidental: e.detail == NotifyDetail::POINTER
                    || e.detail == NotifyDetail::INFERIOR
                    || e.mode == NotifyMode::GRAB
                    || e.mode == NotifyMode::UNGRAB,
            },
            Event::KeyPress(e) => Self::KeyPress {
                keycode: e.detail,
                state: e.state.into(),
                x: e.event_x.into(),
                y: e.event_y.into(),
            },
            Event::MapRequest(e) => Self::MapRequest { window: e.window },
            Event::PropertyNotify(e) => Self::PropertyNotify {
                window: e.window,
                atom: e.atom,
                deleted: e.state == Property::DELETE,
            },
            Event::UnmapNotify(e) => Self::UnmapNotify { window: e.window },
            Event::MappingNotify(e) if e.request != Mapping::POINTER => Self::MappingNotify,
            Event::Error(e) => Self::Error {
                error_code: e.error_code,
                major_opcode: e.major_opcode,
                bad_value: e.bad_value,
            },
            other => Self::Other(other.raw_response_type() & 0x7f),
        }
    }
}
