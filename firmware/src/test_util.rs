//! Host side stand-ins for the board peripherals.
//!
//! Every mock is `Clone` and shares its state between clones, so a test keeps one handle while
//! the code under test owns the other.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use drivers_shared::{
    buzz::{BuzzCmd, Buzzer, Pattern},
    display::Display,
    flash::{Flash, ERASED},
    hrm::{RawSample, Sensor},
    link::HostLink,
    protocol::{Deframer, Packet},
    time::{Rtc, Timer},
    Error,
};

use crate::orchestrator::{Board, Devices};

/// Synthetic PPG: a systolic peak followed by a smaller dicrotic wave on a DC level.
pub fn pulse(bpm: f32, i: usize) -> RawSample {
    let fs = 100.0;
    let phase = (i as f32 / fs * bpm / 60.0).fract();
    let bump = |center: f32, width: f32| {
        let d = (phase - center) / width;
        (-0.5 * d * d).exp()
    };
    let v = bump(0.2, 0.06) + 0.4 * bump(0.5, 0.08);
    (2000.0 + 300.0 * v) as RawSample
}

#[derive(Clone)]
pub struct MemFlash {
    data: Rc<RefCell<Vec<u8>>>,
    fail: Rc<Cell<bool>>,
}

impl Default for MemFlash {
    fn default() -> Self {
        Self {
            data: Rc::new(RefCell::new(vec![ERASED; Self::capacity()])),
            fail: Rc::default(),
        }
    }
}

impl MemFlash {
    /// Makes writes and erases fail, reads keep working.
    pub fn fail(&self, fail: bool) {
        self.fail.set(fail);
    }

    fn check(&self) -> Result<(), Error> {
        if self.fail.get() {
            Err(Error::HardwareFailure)
        } else {
            Ok(())
        }
    }

    fn range(addr: u32, len: usize) -> Result<std::ops::Range<usize>, Error> {
        let begin = addr as usize;
        let end = begin + len;
        if end > Self::capacity() {
            return Err(Error::InvalidInput);
        }
        Ok(begin..end)
    }
}

impl Flash for MemFlash {
    const SECTOR_SIZE: usize = 256;
    const SECTOR_COUNT: usize = 4;

    fn read(&mut self, addr: u32, out: &mut [u8]) -> Result<(), Error> {
        let r = Self::range(addr, out.len())?;
        out.copy_from_slice(&self.data.borrow()[r]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        self.check()?;
        let r = Self::range(addr, data.len())?;
        for (d, s) in self.data.borrow_mut()[r].iter_mut().zip(data) {
            *d &= *s;
        }
        Ok(())
    }

    fn erase_sector(&mut self, sector: u32) -> Result<(), Error> {
        self.check()?;
        let r = Self::range(sector * Self::SECTOR_SIZE as u32, Self::SECTOR_SIZE)?;
        self.data.borrow_mut()[r].fill(ERASED);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockSensor {
    running: Rc<Cell<bool>>,
    fail: Rc<Cell<bool>>,
}

impl MockSensor {
    pub fn running(&self) -> bool {
        self.running.get()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.set(fail);
    }
}

impl Sensor for MockSensor {
    fn start(&mut self) -> Result<(), Error> {
        if self.fail.get() {
            return Err(Error::HardwareFailure);
        }
        self.running.set(true);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.running.set(false);
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TimerState {
    pub prescaler: u32,
    pub period: u32,
    pub running: bool,
}

#[derive(Clone, Default)]
pub struct MockTimer {
    state: Rc<Cell<TimerState>>,
}

impl MockTimer {
    pub fn state(&self) -> TimerState {
        self.state.get()
    }

    fn update(&self, f: impl FnOnce(&mut TimerState)) {
        let mut s = self.state.get();
        f(&mut s);
        self.state.set(s);
    }
}

impl Timer for MockTimer {
    fn set_prescaler(&mut self, prescaler: u32) -> Result<(), Error> {
        self.update(|s| s.prescaler = prescaler);
        Ok(())
    }

    fn set_period(&mut self, period: u32) -> Result<(), Error> {
        self.update(|s| s.period = period);
        Ok(())
    }

    fn start(&mut self) -> Result<(), Error> {
        self.update(|s| s.running = true);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.update(|s| s.running = false);
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Screen {
    pub heart_rate: Option<u16>,
    pub thresholds: Option<(u8, u8)>,
    pub notifications: Vec<String>,
    pub waveforms: usize,
    pub clears: usize,
}

impl Screen {
    pub fn last_notification(&self) -> Option<&str> {
        self.notifications.last().map(|s| s.as_str())
    }
}

#[derive(Clone, Default)]
pub struct MockDisplay {
    screen: Rc<RefCell<Screen>>,
    fail: Rc<Cell<bool>>,
}

impl MockDisplay {
    pub fn screen(&self) -> Screen {
        self.screen.borrow().clone()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.set(fail);
    }

    fn check(&self) -> Result<(), Error> {
        if self.fail.get() {
            Err(Error::HardwareFailure)
        } else {
            Ok(())
        }
    }
}

impl Display for MockDisplay {
    fn show_heart_rate(&mut self, bpm: u16) -> Result<(), Error> {
        self.check()?;
        self.screen.borrow_mut().heart_rate = Some(bpm);
        Ok(())
    }

    fn show_waveform(&mut self, _samples: &[f32]) -> Result<(), Error> {
        self.check()?;
        self.screen.borrow_mut().waveforms += 1;
        Ok(())
    }

    fn show_thresholds(&mut self, lower: u8, upper: u8) -> Result<(), Error> {
        self.check()?;
        self.screen.borrow_mut().thresholds = Some((lower, upper));
        Ok(())
    }

    fn show_notification(&mut self, msg: &str) -> Result<(), Error> {
        self.check()?;
        self.screen.borrow_mut().notifications.push(msg.to_owned());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.check()?;
        let mut s = self.screen.borrow_mut();
        *s = Screen {
            notifications: std::mem::take(&mut s.notifications),
            waveforms: s.waveforms,
            clears: s.clears + 1,
            ..Default::default()
        };
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockBuzzer {
    cmds: Rc<RefCell<Vec<BuzzCmd>>>,
    fail: Rc<Cell<bool>>,
}

impl MockBuzzer {
    pub fn fail(&self, fail: bool) {
        self.fail.set(fail);
    }

    pub fn cmds(&self) -> Vec<BuzzCmd> {
        self.cmds.borrow().clone()
    }

    pub fn is_on(&self) -> bool {
        !matches!(self.cmds.borrow().last(), None | Some(BuzzCmd::Off))
    }
}

impl Buzzer for MockBuzzer {
    fn enable(&mut self, pattern: Pattern) -> Result<(), Error> {
        if self.fail.get() {
            return Err(Error::HardwareFailure);
        }
        self.cmds.borrow_mut().push(BuzzCmd::Pattern(pattern));
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Error> {
        if self.fail.get() {
            return Err(Error::HardwareFailure);
        }
        self.cmds.borrow_mut().push(BuzzCmd::Off);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockLink {
    sent: Rc<RefCell<Vec<u8>>>,
}

impl MockLink {
    /// Takes everything transmitted so far, split into packets.
    pub fn take_packets(&self) -> Vec<Packet> {
        let bytes = std::mem::take(&mut *self.sent.borrow_mut());
        let mut deframer = Deframer::default();
        bytes
            .into_iter()
            .filter_map(|b| deframer.push(b))
            .map(|p| p.unwrap())
            .collect()
    }
}

impl HostLink for MockLink {
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.sent.borrow_mut().extend_from_slice(bytes);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockRtc {
    now: Rc<Cell<u32>>,
}

impl MockRtc {
    pub fn get(&self) -> u32 {
        self.now.get()
    }
}

impl Rtc for MockRtc {
    fn now(&mut self) -> Result<u32, Error> {
        Ok(self.now.get())
    }

    fn set(&mut self, epoch: u32) -> Result<(), Error> {
        self.now.set(epoch);
        Ok(())
    }
}

pub struct TestBoard;

impl Board for TestBoard {
    type Sensor = MockSensor;
    type SampleTimer = MockTimer;
    type IntervalTimer = MockTimer;
    type Display = MockDisplay;
    type Flash = MemFlash;
    type Buzzer = MockBuzzer;
    type Link = MockLink;
    type Rtc = MockRtc;
}

/// One set of mocks, the test keeps these handles after handing clones to [`Devices`].
#[derive(Clone, Default)]
pub struct Bench {
    pub sensor: MockSensor,
    pub sample_timer: MockTimer,
    pub interval_timer: MockTimer,
    pub display: MockDisplay,
    pub flash: MemFlash,
    pub buzzer: MockBuzzer,
    pub link: MockLink,
    pub rtc: MockRtc,
}

impl Bench {
    pub fn devices(&self) -> Devices<TestBoard> {
        let b = self.clone();
        Devices {
            sensor: b.sensor,
            sample_timer: b.sample_timer,
            interval_timer: b.interval_timer,
            display: b.display,
            flash: b.flash,
            buzzer: b.buzzer,
            link: b.link,
            rtc: b.rtc,
        }
    }
}
