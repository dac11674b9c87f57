use drivers_shared::{
    hrm::{RawSample, Sensor},
    time::Timer,
    Error,
};
use hrm::{filter, DigitalFilter, PeakDetector, BPM};
use util::{Handoff, RingBuffer, RAW_CAPACITY};

/// 4 s at 100 Hz.
pub const WINDOW_SIZE: usize = 400;
/// A detection pass runs every second once the window is full.
pub const WINDOW_HOP: usize = 100;

pub type Window = RingBuffer<WINDOW_SIZE, f32>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SamplingConfig {
    pub timer_clock_hz: u32,
    pub prescaler: u32,
    pub period: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            timer_clock_hz: 84_000_000,
            prescaler: 8400,
            period: 100,
        }
    }
}

impl SamplingConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.timer_clock_hz == 0 || self.prescaler == 0 || self.period == 0 {
            return Err(Error::InvalidInput);
        }
        Ok(())
    }

    pub fn sampling_frequency(&self) -> f32 {
        self.timer_clock_hz as f32 / (self.prescaler as f32 * self.period as f32)
    }
}

/// What one call to [`MeasurementPipeline::ingest_available`] did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Ingest {
    pub samples: usize,
    pub passes: usize,
    /// Latest plausible estimate produced by one of the passes.
    pub estimate: Option<BPM>,
}

/// Filters raw sensor samples into a sliding window and estimates the heart rate from it.
pub struct MeasurementPipeline<'a, S, T> {
    sensor: S,
    timer: T,
    raw: &'a Handoff<RawSample, RAW_CAPACITY>,
    filter: DigitalFilter,
    detector: PeakDetector,
    window: Window,
    since_pass: usize,
    fs: f32,
    heart_rate: BPM,
    active: bool,
    primed: bool,
}

impl<'a, S: Sensor, T: Timer> MeasurementPipeline<'a, S, T> {
    /// Programs the sampling timer, starts the conversions and designs the filter for the
    /// resulting sampling rate.
    pub fn init(
        mut sensor: S,
        mut timer: T,
        raw: &'a Handoff<RawSample, RAW_CAPACITY>,
        config: SamplingConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        let fs = config.sampling_frequency();
        let filter = DigitalFilter::init(&filter::PROTOTYPE_A, &filter::PROTOTYPE_B, fs as f64)?;

        timer.set_prescaler(config.prescaler)?;
        timer.set_period(config.period)?;
        timer.start()?;
        sensor.start()?;
        log::info!("Sampling at {} Hz", fs);

        Ok(Self {
            sensor,
            timer,
            raw,
            filter,
            detector: PeakDetector::default(),
            window: Window::default(),
            since_pass: 0,
            fs,
            heart_rate: BPM::UNKNOWN,
            active: true,
            primed: false,
        })
    }

    /// Drains all queued samples.
    ///
    /// Samples dropped by the producer are reported as [`Error::Overflow`] after everything that
    /// did arrive has been processed.
    pub fn ingest_available(&mut self) -> Result<Ingest, Error> {
        let dropped = self.raw.take_dropped();
        let mut ingest = Ingest::default();

        while let Some(raw) = self.raw.pop() {
            ingest.samples += 1;
            if !self.primed {
                self.filter.prime(raw as f64);
                self.primed = true;
            }
            let filtered = self.filter.process_one(raw as f64) as f32;
            self.window.add(filtered);
            self.since_pass += 1;

            if self.window.is_full() && self.since_pass >= WINDOW_HOP {
                self.since_pass = 0;
                ingest.passes += 1;

                let detection = self.detector.detect(&self.window.to_array(), self.fs)?;
                log::debug!(
                    "{} peaks, estimate {:?}",
                    detection.peaks.len(),
                    detection.bpm.map(|b| b.0)
                );
                if let Some(bpm) = detection.bpm {
                    self.heart_rate = bpm;
                    ingest.estimate = Some(bpm);
                }
            }
        }

        if dropped > 0 {
            log::warn!("Dropped {} samples", dropped);
            return Err(Error::Overflow);
        }
        Ok(ingest)
    }

    /// Stops sampling. Filter history and the last estimate are kept.
    pub fn suspend(&mut self) -> Result<(), Error> {
        if !self.active {
            return Ok(());
        }
        self.sensor.stop()?;
        self.timer.stop()?;
        self.active = false;
        Ok(())
    }

    /// Restarts sampling. The window refills from scratch so no pass mixes samples from before
    /// and after the pause.
    pub fn resume(&mut self) -> Result<(), Error> {
        if self.active {
            return Ok(());
        }
        self.raw.clear();
        let _ = self.raw.take_dropped();
        self.window.clear();
        self.since_pass = 0;

        self.timer.start()?;
        self.sensor.start()?;
        self.active = true;
        Ok(())
    }

    pub fn heart_rate(&self) -> BPM {
        self.heart_rate
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn sampling_frequency(&self) -> f32 {
        self.fs
    }

    /// Filtered samples of the current window, oldest first.
    pub fn window(&self) -> &Window {
        &self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{pulse, MockSensor, MockTimer};

    fn pipeline(
        raw: &Handoff<RawSample, RAW_CAPACITY>,
    ) -> MeasurementPipeline<'_, MockSensor, MockTimer> {
        MeasurementPipeline::init(
            MockSensor::default(),
            MockTimer::default(),
            raw,
            SamplingConfig::default(),
        )
        .unwrap()
    }

    fn feed<S: Sensor, T: Timer>(
        p: &mut MeasurementPipeline<'_, S, T>,
        raw: &Handoff<RawSample, RAW_CAPACITY>,
        samples: impl Iterator<Item = RawSample>,
    ) -> Vec<Ingest> {
        let mut out = Vec::new();
        for s in samples {
            raw.push(s).unwrap();
            if raw.len() == raw.capacity() {
                out.push(p.ingest_available().unwrap());
            }
        }
        out.push(p.ingest_available().unwrap());
        out
    }

    #[test]
    fn default_rate() {
        let c = SamplingConfig::default();
        assert_eq!(c.sampling_frequency(), 100.0);
        assert!(SamplingConfig { prescaler: 0, ..c }.validate().is_err());
        assert!(SamplingConfig { period: 0, ..c }.validate().is_err());
        assert!(SamplingConfig {
            timer_clock_hz: 0,
            ..c
        }
        .validate()
        .is_err());
    }

    #[test]
    fn init_programs_timer() {
        let raw = Handoff::new();
        let sensor = MockSensor::default();
        let timer = MockTimer::default();
        let p = MeasurementPipeline::init(
            sensor.clone(),
            timer.clone(),
            &raw,
            SamplingConfig::default(),
        )
        .unwrap();
        assert!(p.is_active());
        assert!(sensor.running());
        let t = timer.state();
        assert_eq!((t.prescaler, t.period, t.running), (8400, 100, true));
    }

    #[test]
    fn init_reports_hardware_failure() {
        let raw = Handoff::new();
        let sensor = MockSensor::default();
        sensor.fail(true);
        let r = MeasurementPipeline::init(
            sensor,
            MockTimer::default(),
            &raw,
            SamplingConfig::default(),
        );
        assert!(matches!(r, Err(Error::HardwareFailure)));

        let r = MeasurementPipeline::init(
            MockSensor::default(),
            MockTimer::default(),
            &raw,
            SamplingConfig {
                prescaler: 0,
                ..Default::default()
            },
        );
        assert!(matches!(r, Err(Error::InvalidInput)));
    }

    #[test]
    fn estimates_rate_of_pulse_signal() {
        let raw = Handoff::new();
        let mut p = pipeline(&raw);

        let ingests = feed(&mut p, &raw, (0..399).map(|i| pulse(72.0, i)));
        assert!(ingests.iter().all(|i| i.passes == 0));
        assert_eq!(p.heart_rate(), BPM::UNKNOWN);

        let ingests = feed(&mut p, &raw, (399..1000).map(|i| pulse(72.0, i)));
        let passes: usize = ingests.iter().map(|i| i.passes).sum();
        assert_eq!(passes, 7);
        assert!(p.heart_rate().0.abs_diff(72) <= 2, "{:?}", p.heart_rate());
    }

    #[test]
    fn overflow_still_processes_queued_samples() {
        let raw = Handoff::new();
        let mut p = pipeline(&raw);
        for i in 0..RAW_CAPACITY + 5 {
            let _ = raw.push(i as RawSample);
        }
        assert_eq!(p.ingest_available(), Err(Error::Overflow));
        assert_eq!(p.window().num_valid(), RAW_CAPACITY);
        assert_eq!(p.ingest_available(), Ok(Ingest::default()));
    }

    #[test]
    fn sleep_keeps_estimate() {
        let raw = Handoff::new();
        let sensor = MockSensor::default();
        let mut p = MeasurementPipeline::init(
            sensor.clone(),
            MockTimer::default(),
            &raw,
            SamplingConfig::default(),
        )
        .unwrap();
        feed(&mut p, &raw, (0..600).map(|i| pulse(60.0, i)));
        let hr = p.heart_rate();
        assert!(hr.is_known());

        p.suspend().unwrap();
        p.suspend().unwrap();
        assert!(!sensor.running());
        assert!(!p.is_active());
        assert_eq!(p.heart_rate(), hr);

        raw.push(1).unwrap();
        p.resume().unwrap();
        assert!(sensor.running());
        assert_eq!(p.heart_rate(), hr);
        assert!(raw.is_empty());
        assert_eq!(p.window().num_valid(), 0);
    }
}
