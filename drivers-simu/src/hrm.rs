use std::{cell::Cell, f32::consts::TAU, rc::Rc, time::Duration};

pub use drivers_shared::hrm::*;
use drivers_shared::Error;

const DC_LEVEL: f32 = 2000.0;
const PULSE_AMPLITUDE: f32 = 300.0;
const DICROTIC_RATIO: f32 = 0.4;
const INTERFERENCE_HZ: f32 = 25.0;
const INTERFERENCE_AMPLITUDE: f32 = 20.0;

struct PpgState {
    running: Cell<bool>,
    heart_rate: Cell<f32>,
    /// Position within the current beat, `0..1`.
    phase: Cell<f32>,
    elapsed_s: Cell<f32>,
}

/// Simulated optical front end producing a synthetic pulse wave.
///
/// A heart rate of zero models a detached sensor: only the DC level and interference remain.
#[derive(Clone)]
pub struct Ppg {
    state: Rc<PpgState>,
}

impl Default for Ppg {
    fn default() -> Self {
        Self {
            state: Rc::new(PpgState {
                running: Cell::new(false),
                heart_rate: Cell::new(72.0),
                phase: Cell::new(0.0),
                elapsed_s: Cell::new(0.0),
            }),
        }
    }
}

fn bump(phase: f32, center: f32, width: f32) -> f32 {
    let d = (phase - center) / width;
    (-0.5 * d * d).exp()
}

impl Ppg {
    pub fn set_heart_rate(&self, bpm: f32) {
        println!("Simulated heart rate: {} bpm", bpm);
        self.state.heart_rate.set(bpm.max(0.0));
    }

    pub fn heart_rate(&self) -> f32 {
        self.state.heart_rate.get()
    }

    /// One conversion, `dt` after the previous one. `None` while the sensor is stopped.
    pub(crate) fn convert(&self, dt: Duration) -> Option<RawSample> {
        let s = &self.state;
        if !s.running.get() {
            return None;
        }
        let dt = dt.as_secs_f32();
        let phase = (s.phase.get() + s.heart_rate.get() / 60.0 * dt).fract();
        let t = s.elapsed_s.get() + dt;
        s.phase.set(phase);
        s.elapsed_s.set(t);

        let pulse = if s.heart_rate.get() > 0.0 {
            bump(phase, 0.2, 0.06) + DICROTIC_RATIO * bump(phase, 0.5, 0.08)
        } else {
            0.0
        };
        let v = DC_LEVEL
            + PULSE_AMPLITUDE * pulse
            + INTERFERENCE_AMPLITUDE * (TAU * INTERFERENCE_HZ * t).sin();
        Some(v.clamp(0.0, RAW_SAMPLE_MAX as f32) as RawSample)
    }
}

impl Sensor for Ppg {
    fn start(&mut self) -> Result<(), Error> {
        log::info!("Hrm enable");
        self.state.running.set(true);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        log::info!("Hrm disable");
        self.state.running.set(false);
        Ok(())
    }
}
