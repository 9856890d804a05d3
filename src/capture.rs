/*
 *  capture.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Audio sources and the analyze -> render pipeline
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
//! One blocking loop: read a buffer, analyze it, hand the bands to every
//! renderer, repeat. Nothing is queued between buffers; a slow renderer
//! simply means the capture side overruns and drops audio.

use std::io::{ErrorKind, Read};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{oneshot, watch};

use crate::control::ControlPlane;
use crate::display::configuration::{ConfigUpdate, DisplayConfiguration};
use crate::display::drivers::led::{LedMatrixSink, LedStrip, LedWiring};
use crate::display::renderer::SpectrumDisplay;
use crate::display::traits::{DisplayRenderer, DisplaySink};
use crate::error::{Result, SpectrumError};
use crate::spectrum::SpectrumAnalyzer;

/// What a source produced for one read
#[derive(Debug)]
pub enum CaptureEvent {
    Buffer(Vec<u8>),
    /// reported out of band, the stream may continue
    Error(SpectrumError),
    End,
}

/// A blocking supplier of raw s16le mono buffers
pub trait AudioSource: Send {
    fn next_event(&mut self) -> CaptureEvent;
}

/// Back-to-back read failures after which the input is treated as gone
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 8;

/// Reads fixed-size frames from any byte stream (stdin, a file, a pipe from arecord)
pub struct PcmReaderSource<R: Read + Send> {
    reader: R,
    frame_bytes: usize,
    errors: u32,
    done: bool,
}

impl<R: Read + Send> PcmReaderSource<R> {
    pub fn new(reader: R, frame_bytes: usize) -> Self {
        Self { reader, frame_bytes, errors: 0, done: false }
    }
}

impl<R: Read + Send> AudioSource for PcmReaderSource<R> {
    fn next_event(&mut self) -> CaptureEvent {
        if self.done {
            return CaptureEvent::End;
        }
        let mut buf = vec![0u8; self.frame_bytes];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => {
                    filled += n;
                    self.errors = 0;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // a partial frame is dropped along with the failed read
                    self.errors += 1;
                    if self.errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        self.done = true;
                    }
                    return CaptureEvent::Error(SpectrumError::unavailable("audio input", e));
                }
            }
        }
        if filled == 0 {
            return CaptureEvent::End;
        }
        buf.truncate(filled);
        CaptureEvent::Buffer(buf)
    }
}

/// Counters reported when the pipeline stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames: u64,
    pub short: u64,
    pub dropped: u64,
    pub capture_errors: u64,
}

pub struct Pipeline {
    analyzer: SpectrumAnalyzer,
    renderers: Vec<Box<dyn DisplayRenderer>>,
    min_frame_bytes: usize,
    speed_filter: Option<f64>,
}

impl Pipeline {
    pub fn new(analyzer: SpectrumAnalyzer, min_frame_bytes: usize) -> Self {
        Self { analyzer, renderers: Vec::new(), min_frame_bytes, speed_filter: None }
    }

    /// Smooth band magnitudes in the analyzer before fan-out
    pub fn with_speed_filter(mut self, speed: f64) -> Self {
        self.speed_filter = Some(speed);
        self
    }

    pub fn add_renderer(&mut self, renderer: Box<dyn DisplayRenderer>) {
        info!("{} display added", renderer.display_type());
        self.renderers.push(renderer);
    }

    pub fn renderers(&self) -> &[Box<dyn DisplayRenderer>] {
        &self.renderers
    }

    /// One display column per band
    pub fn cols(&self) -> usize {
        self.analyzer.band_table().len()
    }

    /// Add a display built around `sink`, register its control port and
    /// queue any startup tuning.
    pub fn attach<S: DisplaySink + 'static>(
        &mut self,
        control: &mut ControlPlane,
        config: DisplayConfiguration,
        sink: S,
        tuning: Option<&ConfigUpdate>,
    ) {
        let display_type = config.display_type;
        let mut display = SpectrumDisplay::new(config, sink);
        control.register(display.control_port());
        self.add_renderer(Box::new(display));

        if let Some(update) = tuning {
            if let Err(e) = control.submit(display_type, update.clone()) {
                warn!("{display_type} display: startup tuning not queued: {e}");
            }
        }
    }

    /// Open a strip long enough for a `rows x cols` matrix and attach it.
    ///
    /// A strip that cannot be opened is logged and skipped so the other
    /// displays keep running. Returns whether the LED display was added.
    pub fn attach_led<L, F>(
        &mut self,
        control: &mut ControlPlane,
        rows: usize,
        wiring: LedWiring,
        tuning: Option<&ConfigUpdate>,
        open_strip: F,
    ) -> bool
    where
        L: LedStrip + 'static,
        F: FnOnce(usize) -> Result<L>,
    {
        let cols = self.cols();
        match open_strip(rows * cols).and_then(|strip| LedMatrixSink::new(strip, rows, cols, wiring)) {
            Ok(sink) => {
                self.attach(control, DisplayConfiguration::led(rows, cols), sink, tuning);
                true
            }
            Err(e) => {
                error!("LED display disabled: {e}");
                false
            }
        }
    }

    /// Analyze one buffer and render it everywhere.
    pub fn process(&mut self, buffer: &[u8]) -> Result<()> {
        if buffer.len() < self.min_frame_bytes {
            return Err(SpectrumError::InvalidInput(format!(
                "{} byte buffer is shorter than the {} byte frame",
                buffer.len(),
                self.min_frame_bytes
            )));
        }
        let bands = match self.speed_filter {
            Some(speed) => self.analyzer.bands_smoothed(buffer, speed)?,
            None => self.analyzer.bands(buffer)?,
        };
        for r in self.renderers.iter_mut() {
            r.display_as_levels(&bands);
        }
        Ok(())
    }

    /// Pull buffers until the source ends or `cancel` turns true, then clear
    /// every renderer once.
    pub fn run<S: AudioSource + ?Sized>(&mut self, source: &mut S, cancel: &watch::Receiver<bool>) -> PipelineStats {
        let mut stats = PipelineStats::default();
        info!(
            "pipeline running at {} Hz with {} display(s)",
            self.analyzer.sample_rate(),
            self.renderers.len()
        );

        while !*cancel.borrow() {
            match source.next_event() {
                CaptureEvent::Buffer(buf) if buf.len() < self.min_frame_bytes => {
                    debug!("skipping {} byte buffer", buf.len());
                    stats.short += 1;
                }
                CaptureEvent::Buffer(buf) => match self.process(&buf) {
                    Ok(()) => stats.frames += 1,
                    Err(e) => {
                        debug!("frame dropped: {e}");
                        stats.dropped += 1;
                    }
                },
                CaptureEvent::Error(e) => {
                    warn!("capture: {e}");
                    stats.capture_errors += 1;
                }
                CaptureEvent::End => {
                    info!("audio input ended");
                    break;
                }
            }
        }

        for r in self.renderers.iter_mut() {
            r.clear();
        }
        info!(
            "pipeline stopped: {} frames, {} short, {} dropped",
            stats.frames, stats.short, stats.dropped
        );
        stats
    }
}

/// A pipeline running on its own OS thread, outside tokio's blocking pool,
/// so runtime shutdown never waits on a read stuck on idle input.
pub struct PipelineWorker {
    cancel: watch::Sender<bool>,
    done: oneshot::Receiver<PipelineStats>,
}

impl PipelineWorker {
    pub fn spawn<S: AudioSource + 'static>(mut pipeline: Pipeline, mut source: S) -> std::io::Result<Self> {
        let (cancel, cancel_rx) = watch::channel(false);
        let (done_tx, done) = oneshot::channel();
        thread::Builder::new().name("pipeline".into()).spawn(move || {
            let stats = pipeline.run(&mut source, &cancel_rx);
            let _ = done_tx.send(stats);
        })?;
        Ok(Self { cancel, done })
    }

    /// Resolves when the source ends; `None` if the worker died.
    pub async fn finished(&mut self) -> Option<PipelineStats> {
        (&mut self.done).await.ok()
    }

    /// Cancel and wait up to `grace` for the final clear. A worker stuck in
    /// a read is left behind and yields `None`.
    pub async fn shutdown(mut self, grace: Duration) -> Option<PipelineStats> {
        let _ = self.cancel.send(true);
        match tokio::time::timeout(grace, &mut self.done).await {
            Ok(res) => res.ok(),
            Err(_) => {
                warn!("pipeline still blocked on input after {grace:?}, leaving it behind");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reader_frames_and_tail() {
        let data = vec![1u8; 10];
        let mut src = PcmReaderSource::new(Cursor::new(data), 4);
        assert!(matches!(src.next_event(), CaptureEvent::Buffer(b) if b.len() == 4));
        assert!(matches!(src.next_event(), CaptureEvent::Buffer(b) if b.len() == 4));
        assert!(matches!(src.next_event(), CaptureEvent::Buffer(b) if b.len() == 2));
        assert!(matches!(src.next_event(), CaptureEvent::End));
        assert!(matches!(src.next_event(), CaptureEvent::End));
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::BrokenPipe, "arecord went away"))
        }
    }

    /// fails a set number of times, then serves its data
    struct Flaky {
        failures: u32,
        data: Cursor<Vec<u8>>,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(std::io::Error::new(ErrorKind::TimedOut, "xrun"));
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn test_reader_recovers_after_transient_error() {
        let mut src = PcmReaderSource::new(Flaky { failures: 1, data: Cursor::new(vec![7u8; 8]) }, 4);
        assert!(matches!(src.next_event(), CaptureEvent::Error(SpectrumError::DeviceUnavailable { .. })));
        assert!(matches!(src.next_event(), CaptureEvent::Buffer(b) if b == vec![7u8; 4]));
        assert!(matches!(src.next_event(), CaptureEvent::Buffer(b) if b.len() == 4));
        assert!(matches!(src.next_event(), CaptureEvent::End));
    }

    #[test]
    fn test_reader_gives_up_after_repeated_errors() {
        let mut src = PcmReaderSource::new(Broken, 4);
        for _ in 0..MAX_CONSECUTIVE_READ_ERRORS {
            assert!(matches!(src.next_event(), CaptureEvent::Error(_)));
        }
        assert!(matches!(src.next_event(), CaptureEvent::End));
    }

    #[test]
    fn test_pipeline_continues_past_capture_error() {
        let mut p = Pipeline::new(SpectrumAnalyzer::new(44100, &[1000]), 8);
        let mut src = PcmReaderSource::new(Flaky { failures: 2, data: Cursor::new(vec![0u8; 16]) }, 8);
        let (_tx, rx) = watch::channel(false);
        let stats = p.run(&mut src, &rx);
        assert_eq!(stats.capture_errors, 2);
        assert_eq!(stats.frames, 2);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let mut p = Pipeline::new(SpectrumAnalyzer::new(44100, &[1000]), 8);
        assert!(matches!(p.process(&[0; 4]), Err(SpectrumError::InvalidInput(_))));
        assert!(p.process(&[0; 8]).is_ok());
    }
}
