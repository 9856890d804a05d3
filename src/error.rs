/*
 *  error.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  Crate-wide error taxonomy
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

use thiserror::Error;

/// Unified error type for analysis, rendering and configuration
#[derive(Debug, Error)]
pub enum SpectrumError {
    /// Malformed or too-short audio buffer, malformed configuration payload
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Capture device or LED hardware could not be opened
    #[error("Device unavailable ({device}): {reason}")]
    DeviceUnavailable { device: String, reason: String },

    /// A configuration value outside its bounds, or aimed at the wrong display
    #[error("Configuration rejected ({field}): {reason}")]
    ConfigurationRejected { field: String, reason: String },

    /// Write to a pixel sink failed; never fatal to the pipeline
    #[error("Sink error: {0}")]
    Sink(String),
}

impl SpectrumError {
    pub fn rejected(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SpectrumError::ConfigurationRejected { field: field.into(), reason: reason.into() }
    }

    pub fn unavailable(device: impl Into<String>, reason: impl ToString) -> Self {
        SpectrumError::DeviceUnavailable { device: device.into(), reason: reason.to_string() }
    }
}

impl From<std::io::Error> for SpectrumError {
    fn from(err: std::io::Error) -> Self {
        SpectrumError::Sink(err.to_string())
    }
}

impl From<serde_json::Error> for SpectrumError {
    fn from(err: serde_json::Error) -> Self {
        SpectrumError::InvalidInput(format!("malformed configuration payload: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, SpectrumError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_is_invalid_input() {
        let err: SpectrumError = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert!(matches!(err, SpectrumError::InvalidInput(_)));
    }

    #[test]
    fn test_display_names_device() {
        let err = SpectrumError::unavailable("/dev/spidev0.0", "No such file");
        assert_eq!(err.to_string(), "Device unavailable (/dev/spidev0.0): No such file");
    }
}
