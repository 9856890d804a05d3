/*
 *  main.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
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

use std::{fs::File, io::{self, Read}, time::Duration};

use anyhow::Context;
use env_logger::Env;
use log::{error, info};
use tokio::signal::unix::{signal, SignalKind};

use spectrum_lights::capture::{PcmReaderSource, Pipeline, PipelineWorker};
use spectrum_lights::config::{self, Config};
use spectrum_lights::control::ControlPlane;
use spectrum_lights::display::configuration::DisplayConfiguration;
use spectrum_lights::display::drivers::{BroadcastTransport, SpiStrip, TerminalSink, WebSink};
use spectrum_lights::spectrum::SpectrumAnalyzer;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// how long a blocked read may hold up shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Asynchronously waits for a SIGINT, SIGTERM, or SIGHUP signal.
async fn signal_handler() -> io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

fn open_input(path: &str) -> anyhow::Result<Box<dyn Read + Send>> {
    if path == "-" {
        info!("reading s16le PCM from stdin");
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("opening audio input {path}"))?;
    info!("reading s16le PCM from {path}");
    Ok(Box::new(file))
}

fn build_pipeline(cfg: &Config, control: &mut ControlPlane, web: &BroadcastTransport) -> anyhow::Result<Pipeline> {
    let analyzer = SpectrumAnalyzer::new(cfg.sample_rate(), &cfg.band_table());
    let mut pipeline = Pipeline::new(analyzer, cfg.frame_bytes());
    if let Some(speed) = cfg.analyzer_speed_filter {
        pipeline = pipeline.with_speed_filter(speed);
    }
    let cols = pipeline.cols();

    if cfg.led_enabled() {
        let device = cfg.led_device();
        let led_tuning = cfg.led.as_ref().and_then(|s| s.tuning.as_ref());
        pipeline.attach_led(control, cfg.led_rows(), cfg.led_wiring(), led_tuning, |len| SpiStrip::open(device, len));
    }

    if cfg.console_enabled() {
        pipeline.attach(
            control,
            DisplayConfiguration::console(cfg.console_rows(), cols),
            TerminalSink::stdout(),
            cfg.console.as_ref().and_then(|s| s.tuning.as_ref()),
        );
    }

    if cfg.web_enabled() {
        pipeline.attach(
            control,
            DisplayConfiguration::web(cfg.web_rows(), cols),
            WebSink::new(web.clone()),
            cfg.web.as_ref().and_then(|s| s.tuning.as_ref()),
        );
    }

    if pipeline.renderers().is_empty() {
        anyhow::bail!("no display available, nothing to do");
    }
    Ok(pipeline)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level()))
        .format_timestamp_secs()
        .init();

    info!("spectrum-lights v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);
    info!("{} bands at {} Hz", cfg.band_table().len(), cfg.sample_rate());

    let web = BroadcastTransport::default();
    let mut control = ControlPlane::new();
    let pipeline = build_pipeline(&cfg, &mut control, &web)?;

    for c in control.configurations() {
        info!("{} display: {} rows x {} cols", c.display_type, c.rows, c.cols);
    }

    let source = PcmReaderSource::new(open_input(cfg.input())?, cfg.frame_bytes());
    let mut worker = PipelineWorker::spawn(pipeline, source).context("starting pipeline thread")?;

    tokio::select! {
        res = signal_handler() => {
            if let Err(e) = res {
                error!("signal handling failed: {e}");
            }
            if let Some(stats) = worker.shutdown(SHUTDOWN_GRACE).await {
                info!("{} frames rendered, {} dropped", stats.frames, stats.dropped);
            }
        }
        res = worker.finished() => match res {
            Some(stats) => info!(
                "{} frames rendered, {} short, {} dropped, {} capture errors",
                stats.frames, stats.short, stats.dropped, stats.capture_errors
            ),
            None => error!("pipeline worker failed"),
        },
    }

    info!("{} web client(s) at exit", web.client_count());
    Ok(())
}
