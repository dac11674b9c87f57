use drivers_shared::Error;

pub const ORDER: usize = 4;
const LEN: usize = ORDER + 1;

/// Analog 4th order Butterworth low pass with its corner at 11 rad/s (about 1.75 Hz),
/// coefficients of s^0..s^4 in descending power order.
pub const PROTOTYPE_A: [f64; LEN] = [1.0, 28.74438523, 413.1198405, 3478.070613, 14641.0];
pub const PROTOTYPE_B: [f64; LEN] = [0.0, 0.0, 0.0, 0.0, 14641.0];

/// Discrete transfer function `B(z) / A(z)` with `a[0] == 1`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FilterCoefficients {
    pub a: [f64; LEN],
    pub b: [f64; LEN],
}

impl FilterCoefficients {
    /// Maps an all-pole 4th order analog low pass to the z domain with the bilinear transform
    /// `s = 2 fs (1 - z^-1) / (1 + z^-1)`.
    ///
    /// Only `b_s[4]` of the numerator is used; the lower numerator terms of a Butterworth low pass
    /// are zero.
    pub fn bilinear(a_s: &[f64], b_s: &[f64], fs: f64) -> Result<Self, Error> {
        let (Ok(a_s), Ok(b_s)) = (
            <&[f64; LEN]>::try_from(a_s),
            <&[f64; LEN]>::try_from(b_s),
        ) else {
            return Err(Error::InvalidInput);
        };
        if !fs.is_finite() || fs <= 0.0 || a_s[0] == 0.0 {
            return Err(Error::InvalidInput);
        }

        let t = 2.0 * fs;
        let n = a_s[0];
        let a1 = a_s[1] / n / t;
        let a2 = a_s[2] / n / (t * t);
        let a3 = a_s[3] / n / (t * t * t);
        let a4 = a_s[4] / n / (t * t * t * t);
        let d = 1.0 + a1 + a2 + a3 + a4;

        let g = b_s[4] / n / (t * t * t * t) / d;

        Ok(Self {
            a: [
                1.0,
                (-4.0 - 2.0 * a1 + 2.0 * a3 + 4.0 * a4) / d,
                (6.0 - 2.0 * a2 + 6.0 * a4) / d,
                (-4.0 + 2.0 * a1 - 2.0 * a3 + 4.0 * a4) / d,
                (1.0 - a1 + a2 - a3 + a4) / d,
            ],
            b: [g, 4.0 * g, 6.0 * g, 4.0 * g, g],
        })
    }

    pub fn butterworth(fs: f64) -> Result<Self, Error> {
        Self::bilinear(&PROTOTYPE_A, &PROTOTYPE_B, fs)
    }
}

/// Input and output history, most recent first.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FilterState {
    recent_input: [f64; LEN],
    recent_output: [f64; LEN],
}

/// Direct form I IIR filter.
pub struct DigitalFilter {
    coefficients: FilterCoefficients,
    state: FilterState,
}

impl DigitalFilter {
    pub fn new(coefficients: FilterCoefficients) -> Self {
        Self {
            coefficients,
            state: FilterState::default(),
        }
    }

    pub fn init(a_s: &[f64], b_s: &[f64], fs: f64) -> Result<Self, Error> {
        Ok(Self::new(FilterCoefficients::bilinear(a_s, b_s, fs)?))
    }

    pub fn coefficients(&self) -> &FilterCoefficients {
        &self.coefficients
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn process_one(&mut self, input: f64) -> f64 {
        let c = &self.coefficients;
        let s = &mut self.state;

        s.recent_input.copy_within(0..ORDER, 1);
        s.recent_input[0] = input;
        s.recent_output.copy_within(0..ORDER, 1);

        let mut y = 0.0;
        for j in 0..LEN {
            y += c.b[j] * s.recent_input[j];
        }
        for j in 1..LEN {
            y -= c.a[j] * s.recent_output[j];
        }

        s.recent_output[0] = y;
        y
    }

    /// Filters `inputs` into `outputs`, continuing from the current history.
    pub fn process_batch(&mut self, inputs: &[f64], outputs: &mut [f64]) -> Result<(), Error> {
        if inputs.len() != outputs.len() {
            return Err(Error::InvalidInput);
        }
        for (i, o) in inputs.iter().zip(outputs.iter_mut()) {
            *o = self.process_one(*i);
        }
        Ok(())
    }

    /// Sets the history to the steady state of a constant input `level`.
    ///
    /// Only valid for filters with unity gain at DC, which holds for every low pass built by
    /// [`FilterCoefficients::bilinear`].
    pub fn prime(&mut self, level: f64) {
        self.state.recent_input = [level; LEN];
        self.state.recent_output = [level; LEN];
    }

    pub fn reset(&mut self) {
        self.state = FilterState::default();
    }
}
