use std::{cell::Cell, rc::Rc};

pub use std::time::{Duration, Instant};

use drivers_shared::Error;
use smol::LocalExecutor;

pub use smol::Timer;

/// Largest value of the 16 bit prescaler register plus one.
const MAX_PRESCALER: u32 = 1 << 16;

/// How often a stopped or reconfigured timer looks at its configuration again.
const POLL: Duration = Duration::from_millis(20);

pub struct Ticker {
    duration: Duration,
    next: Instant,
}

impl Ticker {
    pub fn every(d: Duration) -> Ticker {
        Self {
            duration: d,
            next: Instant::now() + d,
        }
    }

    pub async fn next(&mut self) {
        Timer::at(self.next).await;
        self.next += self.duration;
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct TimerConfig {
    prescaler: u32,
    period: u32,
    running: bool,
}

impl TimerConfig {
    fn interval(&self, clock_hz: u32) -> Option<Duration> {
        if !self.running || self.prescaler == 0 || self.period == 0 || clock_hz == 0 {
            return None;
        }
        let ticks = self.prescaler as u64 * self.period as u64;
        Some(Duration::from_nanos(ticks * 1_000_000_000 / clock_hz as u64))
    }
}

/// Simulated timer peripheral. The update "interrupt" calls `on_elapsed` with the configured
/// interval. Missed updates are caught up, so the long term rate matches the configuration even
/// if the executor is late.
pub struct HwTimer {
    config: Rc<Cell<TimerConfig>>,
    _update_thread: smol::Task<()>,
}

impl HwTimer {
    pub fn new(
        executor: &LocalExecutor,
        clock_hz: u32,
        mut on_elapsed: impl FnMut(Duration) + 'static,
    ) -> Self {
        let config = Rc::new(Cell::new(TimerConfig::default()));
        let c = config.clone();
        Self {
            config,
            _update_thread: executor.spawn(async move {
                let mut active: Option<(TimerConfig, Instant)> = None;
                loop {
                    let cfg = c.get();
                    let Some(interval) = cfg.interval(clock_hz) else {
                        active = None;
                        Timer::after(POLL).await;
                        continue;
                    };
                    let next = match active {
                        Some((prev, next)) if prev == cfg => next,
                        _ => Instant::now() + interval,
                    };
                    if Instant::now() >= next {
                        on_elapsed(interval);
                        active = Some((cfg, next + interval));
                    } else {
                        active = Some((cfg, next));
                        Timer::at(next.min(Instant::now() + POLL)).await;
                    }
                }
            }),
        }
    }

    fn update(&self, f: impl FnOnce(&mut TimerConfig)) {
        let mut cfg = self.config.get();
        f(&mut cfg);
        self.config.set(cfg);
    }
}

impl drivers_shared::time::Timer for HwTimer {
    fn set_prescaler(&mut self, prescaler: u32) -> Result<(), Error> {
        if !(1..=MAX_PRESCALER).contains(&prescaler) {
            return Err(Error::InvalidInput);
        }
        self.update(|c| c.prescaler = prescaler);
        Ok(())
    }

    fn set_period(&mut self, period: u32) -> Result<(), Error> {
        if period == 0 {
            return Err(Error::InvalidInput);
        }
        self.update(|c| c.period = period);
        Ok(())
    }

    fn start(&mut self) -> Result<(), Error> {
        self.update(|c| c.running = true);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.update(|c| c.running = false);
        Ok(())
    }
}

/// Wall clock backed by the host clock plus an offset set by the host protocol.
#[derive(Default)]
pub struct Rtc {
    offset_s: i64,
}

impl drivers_shared::time::Rtc for Rtc {
    fn now(&mut self) -> Result<u32, Error> {
        let t = chrono::Utc::now().timestamp() + self.offset_s;
        u32::try_from(t).map_err(|_| Error::HardwareFailure)
    }

    fn set(&mut self, epoch: u32) -> Result<(), Error> {
        self.offset_s = epoch as i64 - chrono::Utc::now().timestamp();
        log::info!("Clock set to {}", epoch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_from_config() {
        let cfg = TimerConfig {
            prescaler: 8400,
            period: 100,
            running: true,
        };
        assert_eq!(cfg.interval(84_000_000), Some(Duration::from_millis(10)));
        assert_eq!(
            TimerConfig {
                prescaler: 60_000,
                period: 84_000,
                ..cfg
            }
            .interval(84_000_000),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            TimerConfig {
                running: false,
                ..cfg
            }
            .interval(84_000_000),
            None
        );
    }
}
