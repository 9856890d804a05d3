/*
 *  config.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Application configuration: defaults, YAML file, CLI overrides
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

use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::display::configuration::ConfigUpdate;
use crate::display::drivers::led::{LedWiring, DEFAULT_SPI_DEVICE};
use crate::spectrum::{DEFAULT_BANDS_HZ, DEFAULT_SAMPLE_RATE_HZ, MIN_FRAME_BYTES};

pub const DEFAULT_CONSOLE_ROWS: usize = 16;
pub const DEFAULT_LED_ROWS: usize = 10;
pub const DEFAULT_WEB_ROWS: usize = 15;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    pub sample_rate_hz: Option<u32>,
    /// upper edge of each band, Hz
    pub bands: Option<Vec<u32>>,
    /// raw s16le mono PCM; "-" reads stdin
    pub input: Option<String>,
    pub frame_bytes: Option<usize>,
    /// when set, the analyzer smooths band releases itself
    pub analyzer_speed_filter: Option<f64>,
    pub console: Option<DisplaySection>,
    pub led: Option<LedSection>,
    pub web: Option<DisplaySection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DisplaySection {
    pub enabled: Option<bool>,
    pub rows: Option<usize>,
    /// startup tuning, applied through the display's control port
    pub tuning: Option<ConfigUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LedSection {
    pub enabled: Option<bool>,
    pub rows: Option<usize>,
    pub device: Option<String>,     // e.g. "/dev/spidev0.0"
    pub wiring: Option<LedWiring>,
    pub tuning: Option<ConfigUpdate>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "spectrum-lights", about = "Audio spectrum on LED, terminal and web displays")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub sample_rate_hz: Option<u32>,
    /// Comma separated band edges, e.g. "100, 500, 1000"
    #[arg(long)]
    pub bands: Option<String>,
    /// PCM input file, "-" for stdin
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub input: Option<String>,
    #[arg(long)]
    pub console_display_levels: Option<usize>,
    #[arg(long)]
    pub led_display_levels: Option<usize>,
    #[arg(long)]
    pub web_display_levels: Option<usize>,
    #[arg(long, action = ArgAction::SetTrue)]
    pub disable_console_display: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    pub disable_led_display: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    pub disable_web_display: bool,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub led_device: Option<String>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

impl Config {
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate_hz.unwrap_or(DEFAULT_SAMPLE_RATE_HZ)
    }

    pub fn band_table(&self) -> Vec<u32> {
        self.bands.clone().unwrap_or_else(|| DEFAULT_BANDS_HZ.to_vec())
    }

    pub fn input(&self) -> &str {
        self.input.as_deref().unwrap_or("-")
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes.unwrap_or(MIN_FRAME_BYTES)
    }

    pub fn console_enabled(&self) -> bool {
        self.console.as_ref().and_then(|s| s.enabled).unwrap_or(true)
    }

    pub fn console_rows(&self) -> usize {
        self.console.as_ref().and_then(|s| s.rows).unwrap_or(DEFAULT_CONSOLE_ROWS)
    }

    pub fn led_enabled(&self) -> bool {
        self.led.as_ref().and_then(|s| s.enabled).unwrap_or(true)
    }

    pub fn led_rows(&self) -> usize {
        self.led.as_ref().and_then(|s| s.rows).unwrap_or(DEFAULT_LED_ROWS)
    }

    pub fn led_device(&self) -> &str {
        self.led.as_ref().and_then(|s| s.device.as_deref()).unwrap_or(DEFAULT_SPI_DEVICE)
    }

    pub fn led_wiring(&self) -> LedWiring {
        self.led.as_ref().and_then(|s| s.wiring).unwrap_or_default()
    }

    pub fn web_enabled(&self) -> bool {
        self.web.as_ref().and_then(|s| s.enabled).unwrap_or(true)
    }

    pub fn web_rows(&self) -> usize {
        self.web.as_ref().and_then(|s| s.rows).unwrap_or(DEFAULT_WEB_ROWS)
    }
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    let cfg = load_with(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Layer defaults, YAML and the given CLI, then validate.
pub fn load_with(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli)?;

    // 4) Validate
    validate(&cfg)?;
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/spectrum-lights/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/spectrum-lights/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/spectrum-lights.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["spectrum-lights.yaml", "config.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()             { dst.log_level = src.log_level; }
    if src.sample_rate_hz.is_some()        { dst.sample_rate_hz = src.sample_rate_hz; }
    if src.bands.is_some()                 { dst.bands = src.bands; }
    if src.input.is_some()                 { dst.input = src.input; }
    if src.frame_bytes.is_some()           { dst.frame_bytes = src.frame_bytes; }
    if src.analyzer_speed_filter.is_some() { dst.analyzer_speed_filter = src.analyzer_speed_filter; }

    merge_section(&mut dst.console, src.console);
    merge_section(&mut dst.web, src.web);
    match (&mut dst.led, src.led) {
        (None, Some(c)) => dst.led = Some(c),
        (Some(d), Some(s)) => merge_led(d, s),
        _ => {}
    }
}

fn merge_section(dst: &mut Option<DisplaySection>, src: Option<DisplaySection>) {
    match (dst.as_mut(), src) {
        (None, Some(s)) => *dst = Some(s),
        (Some(d), Some(s)) => {
            if s.enabled.is_some() { d.enabled = s.enabled; }
            if s.rows.is_some()    { d.rows = s.rows; }
            if s.tuning.is_some()  { d.tuning = s.tuning; }
        }
        _ => {}
    }
}

fn merge_led(dst: &mut LedSection, src: LedSection) {
    if src.enabled.is_some() { dst.enabled = src.enabled; }
    if src.rows.is_some()    { dst.rows = src.rows; }
    if src.device.is_some()  { dst.device = src.device; }
    if src.wiring.is_some()  { dst.wiring = src.wiring; }
    if src.tuning.is_some()  { dst.tuning = src.tuning; }
}

/// "100, 500,1000" -> [100, 500, 1000]
pub fn parse_bands(s: &str) -> Result<Vec<u32>, ConfigError> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<u32>()
                .map_err(|_| ConfigError::Validation(format!("band '{t}' is not a whole number of Hz")))
        })
        .collect()
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) -> Result<(), ConfigError> {
    if cli.log_level.is_some()      { cfg.log_level = cli.log_level.clone(); }
    if cli.sample_rate_hz.is_some() { cfg.sample_rate_hz = cli.sample_rate_hz; }
    if cli.input.is_some()          { cfg.input = cli.input.clone(); }
    if let Some(b) = cli.bands.as_deref() {
        cfg.bands = Some(parse_bands(b)?);
    }

    if cli.console_display_levels.is_some() || cli.disable_console_display {
        let console = cfg.console.get_or_insert_with(DisplaySection::default);
        if cli.console_display_levels.is_some() { console.rows = cli.console_display_levels; }
        if cli.disable_console_display          { console.enabled = Some(false); }
    }
    if cli.web_display_levels.is_some() || cli.disable_web_display {
        let web = cfg.web.get_or_insert_with(DisplaySection::default);
        if cli.web_display_levels.is_some() { web.rows = cli.web_display_levels; }
        if cli.disable_web_display          { web.enabled = Some(false); }
    }
    if cli.led_display_levels.is_some() || cli.disable_led_display || cli.led_device.is_some() {
        let led = cfg.led.get_or_insert_with(LedSection::default);
        if cli.led_display_levels.is_some() { led.rows = cli.led_display_levels; }
        if cli.disable_led_display          { led.enabled = Some(false); }
        if cli.led_device.is_some()         { led.device = cli.led_device.clone(); }
    }
    Ok(())
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let bands = cfg.band_table();
    if bands.is_empty() {
        return Err(ConfigError::Validation("at least one band is required".into()));
    }
    if bands.contains(&0) {
        return Err(ConfigError::Validation("band edges must be > 0 Hz".into()));
    }
    if cfg.sample_rate() == 0 {
        return Err(ConfigError::Validation("sample_rate_hz must be > 0".into()));
    }
    let fb = cfg.frame_bytes();
    if fb < 4 || fb % 2 != 0 {
        return Err(ConfigError::Validation("frame_bytes must be even and >= 4".into()));
    }
    if cfg.analyzer_speed_filter.is_some_and(|s| s <= 0.0) {
        return Err(ConfigError::Validation("analyzer_speed_filter must be > 0".into()));
    }
    let displays = [
        ("console", cfg.console_enabled(), cfg.console_rows()),
        ("led", cfg.led_enabled(), cfg.led_rows()),
        ("web", cfg.web_enabled(), cfg.web_rows()),
    ];
    for (name, enabled, rows) in displays {
        if enabled && rows == 0 {
            return Err(ConfigError::Validation(format!("{name} display rows must be > 0")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["spectrum-lights"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.band_table(), DEFAULT_BANDS_HZ.to_vec());
        assert_eq!(cfg.sample_rate(), 44_100);
        assert_eq!(cfg.console_rows(), 16);
        assert_eq!(cfg.led_rows(), 10);
        assert_eq!(cfg.web_rows(), 15);
        assert_eq!(cfg.input(), "-");
        assert!(cfg.led_enabled());
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_parse_bands() {
        assert_eq!(parse_bands("100, 500,1000 ").unwrap(), vec![100, 500, 1000]);
        assert!(parse_bands("100, five").is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut cfg = Config::default();
        let c = cli(&[
            "--bands", "60, 250, 2000",
            "--console-display-levels", "20",
            "--disable-led-display",
            "--led-device", "/dev/spidev1.0",
        ]);
        apply_cli_overrides(&mut cfg, &c).unwrap();
        assert_eq!(cfg.band_table(), vec![60, 250, 2000]);
        assert_eq!(cfg.console_rows(), 20);
        assert!(!cfg.led_enabled());
        assert_eq!(cfg.led_device(), "/dev/spidev1.0");
        assert!(cfg.web_enabled());
    }

    #[test]
    fn test_yaml_merge_keeps_unset_fields() {
        let mut base: Config = serde_yaml::from_str("led:\n  rows: 8\n  wiring: serpentine\n").unwrap();
        let over: Config = serde_yaml::from_str(
            "led:\n  device: /dev/spidev0.1\nweb:\n  enabled: false\n  tuning:\n    displayType: WEB\n    peakWait: 900\n",
        )
        .unwrap();
        merge(&mut base, over);
        assert_eq!(base.led_rows(), 8);
        assert_eq!(base.led_wiring(), LedWiring::Serpentine);
        assert_eq!(base.led_device(), "/dev/spidev0.1");
        assert!(!base.web_enabled());
        assert_eq!(base.web.unwrap().tuning.unwrap().peak_wait, Some(900));
    }

    #[test]
    fn test_validation() {
        let cfg = Config { bands: Some(vec![]), ..Default::default() };
        assert!(matches!(validate(&cfg), Err(ConfigError::Validation(_))));

        let cfg = Config { frame_bytes: Some(4095), ..Default::default() };
        assert!(validate(&cfg).is_err());

        let cfg = Config {
            console: Some(DisplaySection { rows: Some(0), enabled: Some(false), tuning: None }),
            ..Default::default()
        };
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_missing_explicit_file() {
        let c = cli(&["--config", "/nonexistent/spectrum-lights.yaml"]);
        assert!(matches!(load_with(&c), Err(ConfigError::Validation(_))));
    }
}
