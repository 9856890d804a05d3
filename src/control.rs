/*
 *  control.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Configuration hand-off between request handlers and the render thread
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */
//! Updates travel to a renderer over a small bounded queue that the render
//! thread drains once per frame; the renderer answers by publishing its
//! configuration snapshot on a watch channel. Nothing outside the render
//! thread ever touches renderer state.

use std::collections::HashMap;

use log::debug;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::watch;

use crate::display::configuration::{ConfigUpdate, DisplayConfiguration, DisplayType};
use crate::error::{Result, SpectrumError};

/// small bounded queue, newest dropped when full
pub const CONFIG_QUEUE_DEPTH: usize = 16;

/// Request side of a renderer's control channel
#[derive(Debug, Clone)]
pub struct ConfigPort {
    display_type: DisplayType,
    tx: mpsc::Sender<ConfigUpdate>,
    snapshot: watch::Receiver<DisplayConfiguration>,
}

/// Render-thread side of a renderer's control channel
#[derive(Debug)]
pub struct ConfigInbox {
    rx: mpsc::Receiver<ConfigUpdate>,
    snapshot: watch::Sender<DisplayConfiguration>,
}

/// Build both ends, seeded with the renderer's current configuration.
pub fn config_channel(initial: &DisplayConfiguration) -> (ConfigPort, ConfigInbox) {
    let (tx, rx) = mpsc::channel(CONFIG_QUEUE_DEPTH);
    let (snap_tx, snap_rx) = watch::channel(initial.clone());
    (
        ConfigPort { display_type: initial.display_type, tx, snapshot: snap_rx },
        ConfigInbox { rx, snapshot: snap_tx },
    )
}

impl ConfigPort {
    pub fn display_type(&self) -> DisplayType {
        self.display_type
    }

    /// Last configuration the renderer published
    pub fn configuration(&self) -> DisplayConfiguration {
        self.snapshot.borrow().clone()
    }

    /// Queue an update for the next frame. Never blocks.
    pub fn submit(&self, mut update: ConfigUpdate) -> Result<()> {
        if update.display_type.is_none() {
            update.display_type = Some(self.display_type);
        }
        self.tx.try_send(update).map_err(|e| match e {
            TrySendError::Full(_) => SpectrumError::rejected(
                "update",
                format!("{} display has {CONFIG_QUEUE_DEPTH} updates pending", self.display_type),
            ),
            TrySendError::Closed(_) => SpectrumError::rejected(
                "update",
                format!("{} display is no longer running", self.display_type),
            ),
        })
    }
}

impl ConfigInbox {
    /// Everything queued since the last frame, oldest first
    pub fn drain(&mut self) -> Vec<ConfigUpdate> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(u) => out.push(u),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    pub fn publish(&self, config: &DisplayConfiguration) {
        self.snapshot.send_replace(config.clone());
    }
}

/// Registry of control ports, one per running display
#[derive(Debug, Clone, Default)]
pub struct ControlPlane {
    ports: HashMap<DisplayType, ConfigPort>,
}

impl ControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, port: ConfigPort) {
        debug!("control plane: {} display registered", port.display_type());
        self.ports.insert(port.display_type(), port);
    }

    pub fn display_types(&self) -> Vec<DisplayType> {
        let mut types: Vec<DisplayType> = self.ports.keys().copied().collect();
        types.sort_by_key(|t| t.to_string());
        types
    }

    fn port(&self, display_type: DisplayType) -> Result<&ConfigPort> {
        self.ports.get(&display_type).ok_or_else(|| {
            SpectrumError::rejected("displayType", format!("no {display_type} display is running"))
        })
    }

    pub fn configuration(&self, display_type: DisplayType) -> Result<DisplayConfiguration> {
        Ok(self.port(display_type)?.configuration())
    }

    pub fn configurations(&self) -> Vec<DisplayConfiguration> {
        self.display_types()
            .into_iter()
            .filter_map(|t| self.ports.get(&t).map(|p| p.configuration()))
            .collect()
    }

    pub fn submit(&self, display_type: DisplayType, update: ConfigUpdate) -> Result<()> {
        self.port(display_type)?.submit(update)
    }

    /// Parse a JSON update body and queue it.
    pub fn submit_json(&self, display_type: DisplayType, body: &str) -> Result<()> {
        let update: ConfigUpdate = serde_json::from_str(body)?;
        self.submit(display_type, update)
    }
}
