/*
 *  display/drivers/web.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Browser sink: JSON event envelopes over a broadcast transport
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
//! The browser draws bars and peaks itself; this sink only ships the target
//! levels and lifecycle events. Whatever serves the page (WebSocket, SSE)
//! subscribes to the transport.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::display::configuration::DisplayConfiguration;
use crate::display::traits::{DisplaySink, Frame};
use crate::error::Result;

/// clients that fall further behind than this lose frames
pub const WEB_CHANNEL_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebEvent {
    Display,
    Clear,
    ConfigChanged,
}

#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub event: WebEvent,
    pub data: &'a T,
}

/// Fan-out to every open client connection
pub trait Transport: Send {
    fn broadcast(&self, payload: &str) -> Result<()>;
}

/// In-process fan-out; each connection handler holds a receiver
#[derive(Debug, Clone)]
pub struct BroadcastTransport {
    tx: broadcast::Sender<String>,
}

impl BroadcastTransport {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastTransport {
    fn default() -> Self {
        Self::new(WEB_CHANNEL_DEPTH)
    }
}

impl Transport for BroadcastTransport {
    fn broadcast(&self, payload: &str) -> Result<()> {
        // no one listening is not an error
        let _ = self.tx.send(payload.to_owned());
        Ok(())
    }
}

pub struct WebSink<T: Transport> {
    transport: T,
}

impl<T: Transport> WebSink<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    fn send<D: Serialize>(&self, event: WebEvent, data: &D) -> Result<()> {
        let payload = serde_json::to_string(&Envelope { event, data })?;
        self.transport.broadcast(&payload)
    }
}

impl<T: Transport> DisplaySink for WebSink<T> {
    fn present(&mut self, frame: &Frame, _config: &DisplayConfiguration) -> Result<()> {
        self.send(WebEvent::Display, &frame.levels)
    }

    fn clear(&mut self) -> Result<()> {
        self.send(WebEvent::Clear, &())
    }

    fn configuration_changed(&mut self, config: &DisplayConfiguration) -> Result<()> {
        self.send(WebEvent::ConfigChanged, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::Level;

    fn frame() -> Frame {
        Frame {
            levels: vec![Level { band: 100, level: 3 }, Level { band: 500, level: 0 }],
            current: vec![3.0, 0.0],
            cells: vec![Vec::new(), Vec::new()],
            peaks: vec![None, None],
        }
    }

    #[test]
    fn test_display_envelope() {
        let transport = BroadcastTransport::default();
        let mut rx = transport.subscribe();
        let mut sink = WebSink::new(transport);

        sink.present(&frame(), &DisplayConfiguration::web(15, 2)).unwrap();
        let msg: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(msg["event"], "DISPLAY");
        assert_eq!(msg["data"][0]["band"], 100);
        assert_eq!(msg["data"][0]["level"], 3);
    }

    #[test]
    fn test_clear_and_config_events() {
        let transport = BroadcastTransport::default();
        let mut rx = transport.subscribe();
        let mut sink = WebSink::new(transport);

        sink.clear().unwrap();
        sink.configuration_changed(&DisplayConfiguration::web(15, 2)).unwrap();

        let clear: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(clear["event"], "CLEAR");
        assert!(clear["data"].is_null());

        let changed: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(changed["event"], "CONFIG_CHANGED");
        assert_eq!(changed["data"]["displayType"], "WEB");
    }

    #[test]
    fn test_broadcast_without_clients() {
        let mut sink = WebSink::new(BroadcastTransport::default());
        assert!(sink.present(&frame(), &DisplayConfiguration::web(15, 2)).is_ok());
    }
}
