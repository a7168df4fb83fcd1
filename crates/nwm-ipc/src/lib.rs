//! nwm IPC Protocol
//!
//! Message types exchanged between the session core (`nwm`) and the
//! external controller that owns layout policy.

use serde::{Deserialize, Serialize};

/// Opaque server-side window handle.
pub type Handle = u32;

// ============================================================================
// Core → Controller Notifications
// ============================================================================

/// Geometry of one physical display region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorInfo {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A newly managed top-level window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: Handle,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub is_floating: bool,
}

/// Raw fields of a ConfigureRequest. The controller answers it with
/// `Command::Configure` and/or `Command::NotifyConfigured`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigureRequest {
    pub id: Handle,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub border_width: u32,
    pub above: Handle,
    pub detail: u8,
    pub value_mask: u16,
}

/// Notifications sent from the session core to the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notification {
    MonitorAdded(MonitorInfo),
    MonitorUpdated(MonitorInfo),
    MonitorRemoved { id: u32 },

    /// Pointer entered a window (or the root, when reporting the initial
    /// pointer position after a monitor rescan)
    Enter { id: Handle, x: i32, y: i32 },

    WindowAdded(WindowInfo),
    WindowUpdated {
        id: Handle,
        title: String,
        class: String,
        instance: String,
    },
    WindowRemoved { id: Handle },

    /// Layout must be recomputed
    Rearrange,

    KeyPress {
        x: i32,
        y: i32,
        keycode: u8,
        keysym: u32,
        modifier: u16,
    },

    MouseDown {
        id: Handle,
        x: i32,
        y: i32,
        button: u8,
    },
    MouseDrag {
        id: Handle,
        x: i32,
        y: i32,
        move_x: i32,
        move_y: i32,
    },

    ConfigureRequest(ConfigureRequest),

    Fullscreen { id: Handle, status: bool },
}

// ============================================================================
// Controller → Core Commands
// ============================================================================

/// Commands sent from the controller back into the session core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    Move { id: Handle, x: i32, y: i32 },
    Resize { id: Handle, width: u32, height: u32 },
    Configure {
        id: Handle,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        border_width: u32,
        above: Handle,
        detail: u8,
        value_mask: u16,
    },
    NotifyConfigured {
        id: Handle,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        border_width: u32,
    },
    Focus { id: Handle },
    Kill { id: Handle },
    AddKey { keysym: u32, modifier: u16 },
    GrabKeys,
}

// ============================================================================
// Message Framing
// ============================================================================

/// A framed message with length prefix for reliable stream reads
#[derive(Debug)]
pub struct FramedMessage {
    pub data: Vec<u8>,
}

impl FramedMessage {
    /// Create a new framed message from serializable data
    pub fn new<T: Serialize>(msg: &T) -> anyhow::Result<Self> {
        let data = serde_json::to_vec(msg)?;
        Ok(Self { data })
    }

    /// Encode message with length prefix (4 bytes, big-endian)
    pub fn encode(&self) -> Vec<u8> {
        let len = self.data.len() as u32;
        let mut buf = Vec::with_capacity(4 + self.data.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Split one frame off the front of `buf`.
    ///
    /// Returns the payload and the number of bytes consumed, or `None` if
    /// `buf` does not yet hold a complete frame.
    pub fn split_frame(buf: &[u8]) -> Option<(&[u8], usize)> {
        let header: [u8; 4] = buf.get(..4)?.try_into().ok()?;
        let len = u32::from_be_bytes(header) as usize;
        let payload = buf.get(4..4 + len)?;
        Some((payload, 4 + len))
    }

    pub fn decode_notification(data: &[u8]) -> anyhow::Result<Notification> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn decode_command(data: &[u8]) -> anyhow::Result<Command> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_added_is_tagged() {
        let event = Notification::WindowAdded(WindowInfo {
            id: 0x40_0001,
            x: 10,
            y: 10,
            width: 100,
            height: 50,
            is_floating: false,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "WindowAdded");
        assert_eq!(json["id"], 0x40_0001);
        assert_eq!(json["is_floating"], false);
    }

    #[test]
    fn test_unit_notification_shape() {
        let json = serde_json::to_string(&Notification::Rearrange).unwrap();
        assert_eq!(json, r#"{"type":"Rearrange"}"#);
    }

    #[test]
    fn test_command_from_controller_json() {
        let cmd = FramedMessage::decode_command(br#"{"type":"Move","id":7,"x":-20,"y":30}"#)
            .unwrap();
        assert_eq!(cmd, Command::Move { id: 7, x: -20, y: 30 });
    }

    #[test]
    fn test_split_frame_waits_for_full_payload() {
        let msg = FramedMessage::new(&Command::GrabKeys).unwrap();
        let wire = msg.encode();

        assert!(FramedMessage::split_frame(&wire[..3]).is_none());
        assert!(FramedMessage::split_frame(&wire[..wire.len() - 1]).is_none());

        let (payload, used) = FramedMessage::split_frame(&wire).unwrap();
        assert_eq!(used, wire.len());
        assert_eq!(FramedMessage::decode_command(payload).unwrap(), Command::GrabKeys);
    }

    #[test]
    fn test_split_frame_leaves_trailing_bytes() {
        let first = FramedMessage::new(&Notification::MonitorRemoved { id: 2 }).unwrap().encode();
        let second = FramedMessage::new(&Notification::Rearrange).unwrap().encode();
        let mut wire = first.clone();
        wire.extend_from_slice(&second);

        let (payload, used) = FramedMessage::split_frame(&wire).unwrap();
        assert_eq!(used, first.len());
        assert_eq!(
            FramedMessage::decode_notification(payload).unwrap(),
            Notification::MonitorRemoved { id: 2 }
        );
        let (rest, _) = FramedMessage::split_frame(&wire[used..]).unwrap();
        assert_eq!(
            FramedMessage::decode_notification(rest).unwrap(),
            Notification::Rearrange
        );
    }
}
