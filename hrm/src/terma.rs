//! Peak detection with two moving averages (TERMA).
//!
//! The squared signal is smoothed once over the duration of a systolic peak and once over a
//! whole heart cycle. Wherever the short average rises above the long one plus an offset, a
//! block of interest starts. Blocks at least one event wide contain one beat each.

use drivers_shared::Error;
use heapless::Vec;

use crate::{BPM, MAX_BPM, MIN_BPM};

pub const W_EVT: usize = 7;
pub const W_CYCLE: usize = 51;
pub const BETA: f32 = 0.8;

pub const MAX_PEAKS: usize = 32;

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Sample indices of the detected beats in ascending order.
    pub peaks: Vec<usize, MAX_PEAKS>,
    /// `None` if fewer than two beats were found or the rate is implausible.
    pub bpm: Option<BPM>,
}

#[derive(Copy, Clone, Debug)]
pub struct PeakDetector {
    w_evt: usize,
    w_cycle: usize,
    beta: f32,
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self {
            w_evt: W_EVT,
            w_cycle: W_CYCLE,
            beta: BETA,
        }
    }
}

/// Centered moving average of width `w` (odd). The first and last `(w - 1) / 2` outputs have no
/// complete neighbourhood and are left at zero.
fn moving_average(input: &[f32], w: usize, out: &mut [f32]) {
    let h = (w - 1) / 2;
    out.fill(0.0);
    if input.len() < w {
        return;
    }

    let mut sum: f32 = input[..w].iter().sum();
    out[h] = sum / w as f32;
    for i in h + 1..input.len() - h {
        sum += input[i + h] - input[i - h - 1];
        out[i] = sum / w as f32;
    }
}

impl PeakDetector {
    pub fn new(w_evt: usize, w_cycle: usize, beta: f32) -> Result<Self, Error> {
        let odd = |w: usize| w % 2 == 1;
        if !odd(w_evt) || !odd(w_cycle) || w_cycle <= w_evt || !(beta > 0.0 && beta <= 1.0) {
            return Err(Error::InvalidInput);
        }
        Ok(Self {
            w_evt,
            w_cycle,
            beta,
        })
    }

    pub fn detect<const N: usize>(&self, window: &[f32; N], fs: f32) -> Result<Detection, Error> {
        if N <= self.w_cycle || !fs.is_finite() || fs <= 0.0 {
            return Err(Error::InvalidInput);
        }

        // Only the positive half wave around the window mean carries the systolic peak. Squaring
        // the raw signal would count both half waves and let a DC offset dominate.
        let mean = window.iter().sum::<f32>() / N as f32;
        let energy: [f32; N] = core::array::from_fn(|i| {
            let v = (window[i] - mean).max(0.0);
            v * v
        });

        let mut detection = Detection {
            peaks: Vec::new(),
            bpm: None,
        };

        let mean_of_signal = energy.iter().sum::<f32>() / N as f32;
        if mean_of_signal <= 0.0 {
            return Ok(detection);
        }

        let mut ma_evt = [0.0; N];
        let mut ma_cycle = [0.0; N];
        moving_average(&energy, self.w_evt, &mut ma_evt);
        moving_average(&energy, self.w_cycle, &mut ma_cycle);

        let offset = self.beta * mean_of_signal;
        let above = |i: usize| ma_evt[i] > ma_cycle[i] + offset;

        // Blocks touching the zone without a valid cycle average may be cut off.
        let valid_begin = (self.w_cycle - 1) / 2;
        let valid_end = N - valid_begin;

        let mut i = valid_begin;
        while i < valid_end {
            if !above(i) {
                i += 1;
                continue;
            }
            let begin = i;
            while i < valid_end && above(i) {
                i += 1;
            }
            let end = i;

            if end - begin < self.w_evt || begin == valid_begin || end == valid_end {
                continue;
            }

            let peak = (begin..end)
                .max_by(|l, r| energy[*l].total_cmp(&energy[*r]))
                .unwrap_or(begin);
            if detection.peaks.push(peak).is_err() {
                log::warn!("More than {} peaks in one window", MAX_PEAKS);
                break;
            }
        }

        detection.bpm = bpm_from_peaks(&detection.peaks, fs);
        Ok(detection)
    }
}

/// Rate from the mean distance between the first and last of at least two peaks.
fn bpm_from_peaks(peaks: &[usize], fs: f32) -> Option<BPM> {
    let (first, last) = match peaks {
        [first, .., last] => (*first, *last),
        _ => return None,
    };
    let mean_interval_s = (last - first) as f32 / (peaks.len() - 1) as f32 / fs;
    if mean_interval_s <= 0.0 {
        return None;
    }

    let bpm = libm::roundf(60.0 / mean_interval_s) as u16;
    if MIN_BPM <= bpm && bpm < MAX_BPM {
        Some(BPM(bpm))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f32 = 100.0;
    const N: usize = 400;

    fn sine(freq: f32) -> [f32; N] {
        core::array::from_fn(|i| (core::f32::consts::TAU * freq * i as f32 / FS).sin())
    }

    /// Systolic peak followed by a smaller dicrotic wave.
    fn pulse_wave(bpm: f32) -> [f32; N] {
        core::array::from_fn(|i| {
            let t = (i as f32 / FS * bpm / 60.0).fract();
            let g = |c: f32, w: f32| (-((t - c) / w).powi(2)).exp();
            2000.0 + 300.0 * (g(0.2, 0.08) + 0.4 * g(0.5, 0.1))
        })
    }

    #[track_caller]
    fn assert_bpm(window: &[f32; N], expected: u16) {
        let d = PeakDetector::default().detect(window, FS).unwrap();
        let bpm = d.bpm.map(|b| b.0);
        assert!(
            bpm.map_or(false, |b| b.abs_diff(expected) <= 2),
            "expected {} got {:?} (peaks {:?})",
            expected,
            bpm,
            d.peaks
        );
    }

    #[test]
    fn sine_72_bpm() {
        let d = PeakDetector::default().detect(&sine(1.2), FS).unwrap();
        assert_eq!(d.bpm, Some(BPM(72)));

        // Maxima of the sine are at 20.8 + 83.3 k.
        assert!(d.peaks.len() >= 3);
        for p in &d.peaks {
            let phase = (*p as f32 - 20.8) % (FS / 1.2);
            assert!(phase.min(FS / 1.2 - phase) < 3.0, "{:?}", d.peaks);
        }
    }

    #[test]
    fn sine_rates() {
        for bpm in [40, 60, 100, 140, 180, 220] {
            assert_bpm(&sine(bpm as f32 / 60.0), bpm);
        }
    }

    #[test]
    fn pulse_wave_rates() {
        for bpm in [40, 60, 72, 100, 140, 180] {
            assert_bpm(&pulse_wave(bpm as f32), bpm);
        }
    }

    #[test]
    fn flat_line_has_no_peaks() {
        let d = PeakDetector::default().detect(&[1234.0; N], FS).unwrap();
        assert!(d.peaks.is_empty());
        assert_eq!(d.bpm, None);

        let d = PeakDetector::default().detect(&[0.0; N], FS).unwrap();
        assert!(d.peaks.is_empty());
    }

    #[test]
    fn single_beat_gives_no_rate() {
        let mut w = [0.0; N];
        for (i, v) in w.iter_mut().enumerate().skip(190).take(20) {
            *v = (core::f32::consts::PI * (i - 190) as f32 / 20.0).sin();
        }
        let d = PeakDetector::default().detect(&w, FS).unwrap();
        assert_eq!(d.peaks.len(), 1);
        assert_eq!(d.bpm, None);
    }

    #[test]
    fn invalid_parameters() {
        assert!(PeakDetector::new(8, 51, 0.8).is_err());
        assert!(PeakDetector::new(7, 50, 0.8).is_err());
        assert!(PeakDetector::new(51, 7, 0.8).is_err());
        assert!(PeakDetector::new(7, 51, 0.0).is_err());
        assert!(PeakDetector::new(7, 51, 1.5).is_err());
        assert!(PeakDetector::new(7, 51, 0.8).is_ok());

        let d = PeakDetector::default();
        assert_eq!(d.detect(&[0.0; 40], FS), Err(Error::InvalidInput));
        assert_eq!(d.detect(&sine(1.2), 0.0), Err(Error::InvalidInput));
    }

    #[test]
    fn moving_average_edges() {
        let input = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut out = [9.0; 5];
        moving_average(&input, 3, &mut out);
        assert_eq!(out, [0.0, 2.0, 3.0, 4.0, 0.0]);
    }
}
