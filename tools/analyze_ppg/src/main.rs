//! Runs the firmware filter and peak detector over a recorded PPG trace.
//!
//! Usage: `analyze_ppg <samples.csv> [sampling rate in Hz]`. The CSV needs a `val` column with
//! raw sensor values. The signals and the heart rate are written to `out.svg`.

use hrm::{DigitalFilter, PeakDetector};
use oximeter::pipeline::{WINDOW_HOP, WINDOW_SIZE};
use plotpy::{Curve, Plot};
use std::error::Error;

#[derive(serde::Deserialize)]
struct Row {
    val: f64,
}

fn curve(vals: &[(f32, f32)], label: &str) -> Curve {
    let mut curve = Curve::new();
    curve.set_line_width(2.0);

    curve.points_begin();
    for (x, y) in vals {
        curve.points_add(x, y);
    }
    curve.points_end();
    curve.set_label(label);
    curve
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = std::env::args().collect::<Vec<_>>();
    let Some(path) = args.get(1) else {
        return Err("usage: analyze_ppg <samples.csv> [sampling rate]".into());
    };
    let fs: f32 = match args.get(2) {
        Some(fs) => fs.parse()?,
        None => 100.0,
    };

    let mut rdr = csv::Reader::from_reader(std::fs::File::open(path)?);
    let mut raw = Vec::new();
    for result in rdr.records() {
        let row: Row = result?.deserialize(None)?;
        raw.push(row.val);
    }
    if raw.len() < WINDOW_SIZE {
        return Err(format!("need at least {} samples, got {}", WINDOW_SIZE, raw.len()).into());
    }

    let mut filter = DigitalFilter::init(
        &hrm::filter::PROTOTYPE_A,
        &hrm::filter::PROTOTYPE_B,
        fs as f64,
    )?;
    filter.prime(raw[0]);
    let mut filtered = vec![0.0; raw.len()];
    filter.process_batch(&raw, &mut filtered)?;
    println!("Coefficients: {:?}", filter.coefficients());

    let detector = PeakDetector::default();
    let seconds = |i: usize| i as f32 / fs;
    let mut peaks = Vec::new();
    let mut bpm_vals = Vec::new();
    for end in (WINDOW_SIZE..=raw.len()).step_by(WINDOW_HOP) {
        let begin = end - WINDOW_SIZE;
        let window: [f32; WINDOW_SIZE] = core::array::from_fn(|i| filtered[begin + i] as f32);
        let detection = detector.detect(&window, fs)?;

        // Only the newest hop, earlier peaks were reported by previous windows.
        for p in detection.peaks.iter().map(|p| begin + p) {
            if p + WINDOW_HOP >= end {
                peaks.push((seconds(p), filtered[p] as f32));
            }
        }
        if let Some(bpm) = detection.bpm {
            println!("{:8.2} s: {:3} bpm", seconds(end), bpm.0);
            bpm_vals.push((seconds(end), bpm.0 as f32));
        } else {
            println!("{:8.2} s: ---", seconds(end));
        }
    }

    let mean = raw.iter().sum::<f64>() / raw.len() as f64;
    let raw_vals = raw
        .iter()
        .enumerate()
        .map(|(i, v)| (seconds(i), (v - mean) as f32))
        .collect::<Vec<_>>();
    let filtered_vals = filtered
        .iter()
        .enumerate()
        .map(|(i, v)| (seconds(i), (*v - mean) as f32))
        .collect::<Vec<_>>();

    let centered = peaks
        .iter()
        .map(|(t, v)| (*t, *v - mean as f32))
        .collect::<Vec<_>>();
    let mut peak_curve = curve(&centered, "peaks");
    peak_curve.set_line_style("None").set_marker_style("o");

    let mut signals = Plot::new();
    signals
        .add(&curve(&raw_vals, "raw"))
        .add(&curve(&filtered_vals, "filtered"))
        .add(&peak_curve)
        .legend()
        .grid_and_labels("t [s]", "value");
    if let Err(e) = signals.save_and_show("out.svg") {
        println!("{}", e);
    }

    let mut rate = Plot::new();
    rate.add(&curve(&bpm_vals, "bpm"))
        .legend()
        .grid_and_labels("t [s]", "bpm");
    if let Err(e) = rate.save_and_show("bpm.svg") {
        println!("{}", e);
    }

    Ok(())
}
