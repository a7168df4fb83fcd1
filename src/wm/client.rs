//! Client Module
//!
//! The registry of managed top-level windows and their add/update/remove
//! lifecycle.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, info};

use nwm_ipc::{Notification, WindowInfo};

use crate::shared::Geometry;
use crate::wm::bridge::Bridge;
use crate::wm::client_flags::ClientFlags;
use crate::wm::display::{Handle, WindowAttributes, WindowChanges, XConn};
use crate::wm::hints::Metadata;

/// A managed window
#[derive(Debug, Clone)]
pub struct Client {
    /// X11 window ID
    pub window: Handle,
    pub geometry: Geometry,
    pub border_width: u32,
    pub flags: ClientFlags,
    pub metadata: Metadata,
}

impl Client {
    pub fn new(window: Handle, geometry: Geometry, border_width: u32) -> Self {
        Self {
            window,
            geometry,
            border_width,
            flags: ClientFlags::empty(),
            metadata: Metadata::default(),
        }
    }

    pub fn is_floating(&self) -> bool {
        self.flags.contains(ClientFlags::FLOATING)
    }

    pub fn is_fullscreen(&self) -> bool {
        self.flags.contains(ClientFlags::FULLSCREEN)
    }

    /// Fold a configure request we issued into the stored geometry
    pub fn apply_changes(&mut self, changes: &WindowChanges) {
        if let Some(x) = changes.x {
            self.geometry.x = x;
        }
        if let Some(y) = changes.y {
            self.geometry.y = y;
        }
        if let Some(width) = changes.width {
            self.geometry.width = width;
        }
        if let Some(height) = changes.height {
            self.geometry.height = height;
        }
        if let Some(border_width) = changes.border_width {
            self.border_width = border_width;
        }
    }
}

/// Window registry
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<Handle, Client>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, window: Handle) -> bool {
        self.clients.contains_key(&window)
    }

    pub fn get(&self, window: Handle) -> Option<&Client> {
        self.clients.get(&window)
    }

    pub fn get_mut(&mut self, window: Handle) -> Option<&mut Client> {
        self.clients.get_mut(&window)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Start managing `window`.
    ///
    /// The caller has already filtered out override-redirect windows and
    /// windows that are managed already.
    pub fn add<C: XConn>(
        &mut self,
        conn: &C,
        window: Handle,
        attrs: &WindowAttributes,
        bridge: &Bridge,
    ) -> Result<()> {
        let is_floating = conn.transient_for(window)?.is_some();
        let geometry = attrs.geometry;
        info!(
            "Manage window {} ({}x{} at {},{}, floating={})",
            window, geometry.width, geometry.height, geometry.x, geometry.y, is_floating
        );

        let mut client = Client::new(window, geometry, attrs.border_width);
        client.flags.set(ClientFlags::FLOATING, is_floating);
        self.clients.insert(window, client);

        bridge.emit(Notification::WindowAdded(WindowInfo {
            id: window,
            x: geometry.x,
            y: geometry.y,
            width: geometry.width,
            height: geometry.height,
            is_floating,
        }));

        self.update_metadata(conn, window, bridge)?;

        conn.send_configure_notify(window, geometry, attrs.border_width)?;
        conn.select_client_events(window)?;
        conn.grab_buttons(window, false)?;
        if is_floating {
            conn.configure_window(window, &WindowChanges::new().raise())?;
        }

        conn.configure_window(
            window,
            &WindowChanges::new()
                .position(geometry.x, geometry.y)
                .size(geometry.width, geometry.height),
        )?;
        conn.map_window(window)?;
        Ok(())
    }

    /// Re-read title/class/instance and report them.
    pub fn update_metadata<C: XConn>(&mut self, conn: &C, window: Handle, bridge: &Bridge) -> Result<()> {
        let Some(client) = self.clients.get_mut(&window) else {
            debug!("Metadata update for unmanaged window {} ignored", window);
            return Ok(());
        };

        let atoms = conn.atoms();
        let net_wm_name = conn.text_property(window, atoms.net_wm_name)?;
        let wm_name = match &net_wm_name {
            Some(_) => None,
            None => conn.text_property(window, atoms.wm_name)?,
        };
        let metadata = Metadata::resolve(net_wm_name, wm_name, conn.class_hint(window)?);
        debug!("Window {} metadata: {:?}", window, metadata);

        bridge.emit(Notification::WindowUpdated {
            id: window,
            title: metadata.title.clone(),
            class: metadata.class.clone(),
            instance: metadata.instance.clone(),
        });
        client.metadata = metadata;
        Ok(())
    }

    /// Stop managing `window`. Returns `false` if it was not managed.
    ///
    /// Unmapped windows still exist, so their button grabs are released;
    /// the server has already reclaimed those of destroyed windows.
    pub fn remove<C: XConn>(
        &mut self,
        conn: &C,
        window: Handle,
        destroyed: bool,
        bridge: &Bridge,
    ) -> Result<bool> {
        if self.clients.remove(&window).is_none() {
            debug!("Remove for unmanaged window {} ignored", window);
            return Ok(false);
        }
        info!("Unmanage window {} (destroyed={})", window, destroyed);
        bridge.emit(Notification::WindowRemoved { id: window });

        if !destroyed {
            conn.grab_server()?;
            conn.ungrab_buttons(window)?;
            conn.sync()?;
            conn.ungrab_server()?;
        }
        Ok(true)
    }
}
