//! Move/Resize Module
//!
//! Pointer drag tracking. A drag starts on a button press over a managed
//! window, reports every pointer motion to the controller and ends on
//! button release.

use nwm_ipc::Notification;

use crate::wm::display::Handle;

/// Drag state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        window: Handle,
        origin_x: i32,
        origin_y: i32,
    },
}

impl DragState {
    pub fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging { .. })
    }

    pub fn begin(&mut self, window: Handle, origin_x: i32, origin_y: i32) {
        *self = Self::Dragging {
            window,
            origin_x,
            origin_y,
        };
    }

    /// Drag notification for a pointer motion, `None` while idle
    pub fn motion(&self, x: i32, y: i32) -> Option<Notification> {
        match *self {
            Self::Idle => None,
            Self::Dragging {
                window,
                origin_x,
                origin_y,
            } => Some(Notification::MouseDrag {
                id: window,
                x: origin_x,
                y: origin_y,
                move_x: x,
                move_y: y,
            }),
        }
    }

    /// Leave the drag; returns whether one was in progress
    pub fn release(&mut self) -> bool {
        std::mem::take(self).is_dragging()
    }

    /// Abort a drag whose window went away; returns whether one was aborted
    pub fn forget(&mut self, window: Handle) -> bool {
        if matches!(*self, Self::Dragging { window: w, .. } if w == window) {
            *self = Self::Idle;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_only_while_dragging() {
        let mut drag = DragState::default();
        assert_eq!(drag.motion(5, 5), None);

        drag.begin(0x42, 100, 200);
        assert_eq!(
            drag.motion(110, 190),
            Some(Notification::MouseDrag { id: 0x42, x: 100, y: 200, move_x: 110, move_y: 190 })
        );

        assert!(drag.release());
        assert!(!drag.release());
        assert_eq!(drag.motion(1, 1), None);
    }

    #[test]
    fn test_forget_only_matching_window() {
        let mut drag = DragState::default();
        drag.begin(1, 0, 0);
        assert!(!drag.forget(2));
        assert!(drag.is_dragging());
        assert!(drag.forget(1));
        assert_eq!(drag, DragState::Idle);
    }
}
