//! Screen Module
//!
//! Tracks the physical monitors and reconciles them with the topology the
//! server reports.

use anyhow::Result;
use tracing::{debug, info};

use nwm_ipc::{MonitorInfo, Notification};

use crate::shared::Geometry;
use crate::wm::bridge::Bridge;
use crate::wm::display::XConn;

/// Drop regions whose geometry was already seen, keeping first-seen order
pub fn unique_geometries(regions: &[Geometry]) -> Vec<Geometry> {
    let mut unique: Vec<Geometry> = Vec::with_capacity(regions.len());
    for region in regions {
        if !unique.contains(region) {
            unique.push(*region);
        }
    }
    unique
}

fn monitor_info(id: usize, geometry: &Geometry) -> MonitorInfo {
    MonitorInfo {
        id: id as u32,
        x: geometry.x,
        y: geometry.y,
        width: geometry.width,
        height: geometry.height,
    }
}

/// Monitor registry
///
/// Monitor `i` is the `i`-th unique region of the last topology. Indices
/// are matched by position only, so when the count changes an index may
/// end up describing a different physical output.
#[derive(Debug, Default)]
pub struct MonitorRegistry {
    monitors: Vec<Geometry>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    pub fn monitors(&self) -> &[Geometry] {
        &self.monitors
    }

    /// Index of the monitor containing the point
    pub fn monitor_at(&self, x: i32, y: i32) -> Option<usize> {
        self.monitors.iter().position(|m| m.contains(x, y))
    }

    /// Reconcile with the current topology and report the pointer position.
    pub fn rescan<C: XConn>(&mut self, conn: &C, screen: (u32, u32), bridge: &Bridge) -> Result<()> {
        match conn.topology()? {
            None if self.monitors.is_empty() => {
                let whole = Geometry::new(0, 0, screen.0, screen.1);
                info!("No Xinerama, single monitor {}x{}", screen.0, screen.1);
                self.monitors.push(whole);
                bridge.emit(Notification::MonitorAdded(monitor_info(0, &whole)));
            }
            None => {
                let whole = Geometry::new(0, 0, screen.0, screen.1);
                if self.monitors.len() == 1 && self.monitors[0] != whole {
                    info!("No Xinerama, screen resized to {}x{}", screen.0, screen.1);
                    self.monitors[0] = whole;
                    bridge.emit(Notification::MonitorUpdated(monitor_info(0, &whole)));
                } else {
                    debug!("No Xinerama, keeping {} known monitor(s)", self.monitors.len());
                }
            }
            Some(regions) => {
                let unique = unique_geometries(&regions);
                info!(
                    "Monitors known {}, found {} ({} unique)",
                    self.monitors.len(),
                    regions.len(),
                    unique.len()
                );
                self.reconcile(&unique, bridge);
            }
        }

        self.report_pointer(conn, bridge)
    }

    fn reconcile(&mut self, unique: &[Geometry], bridge: &Bridge) {
        let known = self.monitors.len();
        if known <= unique.len() {
            for (id, geometry) in unique.iter().enumerate() {
                let info = monitor_info(id, geometry);
                if id >= known {
                    debug!("Monitor {} added: {:?}", id, geometry);
                    self.monitors.push(*geometry);
                    bridge.emit(Notification::MonitorAdded(info));
                } else {
                    self.monitors[id] = *geometry;
                    bridge.emit(Notification::MonitorUpdated(info));
                }
            }
        } else {
            info!("Fewer monitors available: {} -> {}", known, unique.len());
            for id in (unique.len()..known).rev() {
                self.monitors.pop();
                bridge.emit(Notification::MonitorRemoved { id: id as u32 });
            }
        }
    }

    /// Emit the pointer position so the controller can pick the initially
    /// focused monitor.
    pub fn report_pointer<C: XConn>(&self, conn: &C, bridge: &Bridge) -> Result<()> {
        if let Some((x, y)) = conn.pointer_position()? {
            debug!("Pointer at ({}, {}) on monitor {:?}", x, y, self.monitor_at(x, y));
            bridge.emit(Notification::Enter {
                id: conn.root(),
                x,
                y,
            });
        }
        Ok(())
    }
}
