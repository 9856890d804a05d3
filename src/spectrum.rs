/*
 *  spectrum.rs
 *
 *  spectrum-lights - every band, every frame
 *  (c) 2020-26 Stuart Hunter
 *
 *  PCM buffer to per-band magnitudes, with optional release smoothing
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

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::{Result, SpectrumError};
use crate::levels::Band;

/// full scale of a signed 16-bit sample
const PCM_FULL_SCALE: f64 = 32768.0;

/// Smallest capture buffer worth analysing; shorter reads are dropped by the caller.
pub const MIN_FRAME_BYTES: usize = 4096;

pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 44_100;

pub const DEFAULT_BANDS_HZ: [u32; 10] = [100, 500, 1000, 2000, 4000, 6000, 8000, 10000, 12000, 14000];

pub struct SpectrumAnalyzer {
    sample_rate: u32,
    bands: Vec<u32>,
    nfft: usize,
    fft: Option<Arc<dyn Fft<f64>>>,
    window: Vec<f64>,
    buf: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    previous: Vec<f64>,     // smoothing memory, one per band
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: u32, bands: &[u32]) -> Self {
        Self {
            sample_rate,
            bands: bands.to_vec(),
            nfft: 0,
            fft: None,
            window: Vec::new(),
            buf: Vec::new(),
            scratch: Vec::new(),
            previous: vec![0.0; bands.len()],
        }
    }

    pub fn sample_rate(&self) -> u32 { self.sample_rate }
    pub fn band_table(&self) -> &[u32] { &self.bands }

    /// Symmetric Hann taper scaled so the coefficients sum to one
    fn hann(n: usize) -> Vec<f64> {
        if n == 1 {
            return vec![1.0];
        }
        let denom = (n - 1) as f64;
        let mut w = (0..n)
            .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / denom).cos())
            .collect::<Vec<_>>();
        let sum: f64 = w.iter().sum();
        w.iter_mut().for_each(|v| *v /= sum);
        w
    }

    /// Re-plan only when the buffer length changes
    fn ensure(&mut self, n: usize) {
        if self.nfft == n && self.fft.is_some() {
            return;
        }
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n);
        self.scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        self.buf = vec![Complex::new(0.0, 0.0); n];
        self.window = Self::hann(n);
        self.fft = Some(fft);
        self.nfft = n;
    }

    /// One-sided magnitude spectrum and the frequency of every bin.
    fn magnitudes(&mut self, buffer: &[u8]) -> Result<(Vec<f64>, Vec<f64>)> {
        if buffer.is_empty() {
            return Err(SpectrumError::InvalidInput("empty audio buffer".into()));
        }
        if buffer.len() % 2 != 0 {
            return Err(SpectrumError::InvalidInput(format!(
                "audio buffer length {} is not a whole number of 16-bit samples",
                buffer.len()
            )));
        }

        let n = buffer.len() / 2;
        self.ensure(n);

        for (i, pair) in buffer.chunks_exact(2).enumerate() {
            let s = i16::from_le_bytes([pair[0], pair[1]]) as f64 / PCM_FULL_SCALE;
            self.buf[i] = Complex::new(s * self.window[i], 0.0);
        }

        if let Some(fft) = self.fft.as_ref() {
            fft.process_with_scratch(&mut self.buf, &mut self.scratch);
        }

        let half = n / 2;
        let nf = n as f64;
        let mut mags = Vec::with_capacity(half + 1);
        let mut freqs = Vec::with_capacity(half + 1);
        for k in 0..=half {
            let m = self.buf[k].norm() / nf;
            mags.push(if k == 0 { m } else { 2.0 * m });
            freqs.push(k as f64 * self.sample_rate as f64 / nf);
        }
        Ok((mags, freqs))
    }

    /// Energy-summed magnitude per configured band.
    ///
    /// Band `i` collects every bin in `(table[i-1], table[i]]`, with the
    /// lower edge of the first band at 0 Hz. The table is not required to
    /// be sorted: a bin is added to every band whose interval holds it.
    pub fn bands(&mut self, buffer: &[u8]) -> Result<Vec<Band>> {
        let (mags, freqs) = self.magnitudes(buffer)?;

        let mut out: Vec<Band> = self.bands.iter().map(|&hz| Band::new(hz, 0.0)).collect();
        for (mag, freq) in mags.iter().zip(freqs.iter()) {
            for (b, band) in out.iter_mut().enumerate() {
                let lower = if b == 0 { 0.0 } else { self.bands[b - 1] as f64 };
                let upper = self.bands[b] as f64;
                if *freq > lower && *freq <= upper {
                    band.magnitude += mag;
                }
            }
        }
        Ok(out)
    }

    /// `bands` followed by instant-attack, rate-limited release.
    pub fn bands_smoothed(&mut self, buffer: &[u8], speed_filter: f64) -> Result<Vec<Band>> {
        let mut out = self.bands(buffer)?;
        for (band, old) in out.iter_mut().zip(self.previous.iter_mut()) {
            band.magnitude = smooth(*old, band.magnitude, speed_filter);
            *old = band.magnitude;
        }
        Ok(out)
    }
}

/// Falls by at most `speed` towards a lower target, jumps to a higher one.
#[inline]
pub fn smooth(old: f64, new: f64, speed: f64) -> f64 {
    if new < old {
        (old - speed).max(new)
    } else if new > old {
        new
    } else {
        old
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_bytes(freq: f64, sr: f64, n: usize, amp: f64) -> Vec<u8> {
        (0..n)
            .flat_map(|i| {
                let s = (amp * (2.0 * std::f64::consts::PI * freq * i as f64 / sr).sin() * 32767.0) as i16;
                s.to_le_bytes()
            })
            .collect()
    }

    #[test]
    fn test_sine_lands_in_one_band() {
        // bin 128 of a 2048-point frame
        let f = 128.0 * 44100.0 / 2048.0;
        let buf = sine_bytes(f, 44100.0, 2048, 0.8);
        let mut a = SpectrumAnalyzer::new(44100, &DEFAULT_BANDS_HZ);
        let bands = a.bands(&buf).unwrap();

        assert_eq!(bands.len(), DEFAULT_BANDS_HZ.len());
        let hit = bands.iter().position(|b| b.center_or_upper_hz == 4000).unwrap();
        let peak = bands[hit].magnitude;
        assert!(peak > 0.0);
        for (i, b) in bands.iter().enumerate() {
            if i != hit {
                assert!(b.magnitude < peak * 0.01, "band {} leaked {}", b.center_or_upper_hz, b.magnitude);
            }
        }
    }

    #[test]
    fn test_band_labels_follow_table() {
        let table = [300, 200, 900];
        let mut a = SpectrumAnalyzer::new(8000, &table);
        let bands = a.bands(&vec![0u8; 512]).unwrap();
        let labels: Vec<u32> = bands.iter().map(|b| b.center_or_upper_hz).collect();
        assert_eq!(labels, vec![300, 200, 900]);
        assert!(bands.iter().all(|b| b.magnitude == 0.0));
    }

    #[test]
    fn test_overlapping_bands_both_accumulate() {
        // (4000, 1000] is empty, (500, 4000] overlaps the first band
        let table = [4000, 1000, 500, 4000];
        let f = 128.0 * 8000.0 / 1024.0;
        let buf = sine_bytes(f, 8000.0, 1024, 0.5);
        let mut a = SpectrumAnalyzer::new(8000, &table);
        let bands = a.bands(&buf).unwrap();
        assert!(bands[0].magnitude > 0.0);
        assert_eq!(bands[1].magnitude, 0.0);
        assert!((bands[3].magnitude - bands[0].magnitude).abs() < bands[0].magnitude * 0.01);
    }

    #[test]
    fn test_rejects_odd_and_empty() {
        let mut a = SpectrumAnalyzer::new(44100, &DEFAULT_BANDS_HZ);
        assert!(matches!(a.bands(&[]), Err(SpectrumError::InvalidInput(_))));
        assert!(matches!(a.bands(&[0, 1, 2]), Err(SpectrumError::InvalidInput(_))));
        assert!(matches!(a.bands_smoothed(&[7], 0.1), Err(SpectrumError::InvalidInput(_))));
    }

    #[test]
    fn test_smooth_step_function() {
        // rise is instant
        assert_eq!(smooth(0.0, 5.0, 1.0), 5.0);
        // fall is bounded by speed
        assert_eq!(smooth(5.0, 0.0, 1.0), 4.0);
        // but never below the new value
        assert_eq!(smooth(5.0, 4.5, 1.0), 4.5);
        assert_eq!(smooth(2.0, 2.0, 1.0), 2.0);
    }

    #[test]
    fn test_smoothed_release_is_rate_limited() {
        let f = 128.0 * 44100.0 / 2048.0;
        let loud = sine_bytes(f, 44100.0, 2048, 0.9);
        let silent = vec![0u8; 4096];
        let mut a = SpectrumAnalyzer::new(44100, &DEFAULT_BANDS_HZ);

        let raw = a.bands(&loud).unwrap()[4].magnitude;
        let up = a.bands_smoothed(&loud, 0.0001).unwrap()[4].magnitude;
        assert_eq!(up, raw);

        let mut prev = up;
        for _ in 0..5 {
            let down = a.bands_smoothed(&silent, 0.0001).unwrap()[4].magnitude;
            assert!(down >= (prev - 0.0001).max(0.0) - 1e-12);
            assert!(down <= prev);
            prev = down;
        }
        assert!(prev < up);
    }
}
