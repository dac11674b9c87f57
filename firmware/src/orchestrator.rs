use arrform::{arrform, ArrForm};
use drivers_shared::{
    button::ButtonEvent,
    buzz::{Buzzer, ALARM},
    display::Display,
    flash::Flash,
    hrm::Sensor,
    link::HostLink,
    protocol::{Command, Deframer, Marker, Packet, Request},
    record::HeartRateRecord,
    time::{Rtc, Timer},
    Error,
};
use hrm::BPM;
use util::Interrupts;

use crate::{
    pipeline::{MeasurementPipeline, SamplingConfig},
    settings::{Settings, ThresholdPair},
    storage::RecordLog,
};

/// With this period the interval timer elapses once per millisecond per prescaler step.
pub const INTERVAL_TIMER_CLOCK_HZ: u32 = 84_000_000;
pub const INTERVAL_TIMER_PERIOD: u32 = 84_000;

/// The peripherals a device is built from.
pub trait Board {
    type Sensor: Sensor;
    type SampleTimer: Timer;
    type IntervalTimer: Timer;
    type Display: Display;
    type Flash: Flash;
    type Buzzer: Buzzer;
    type Link: HostLink;
    type Rtc: Rtc;
}

pub struct Devices<B: Board> {
    pub sensor: B::Sensor,
    pub sample_timer: B::SampleTimer,
    pub interval_timer: B::IntervalTimer,
    pub display: B::Display,
    pub flash: B::Flash,
    pub buzzer: B::Buzzer,
    pub link: B::Link,
    pub rtc: B::Rtc,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Sleep,
    WaitWakeup,
    Idle,
    Normal,
    Warning,
    CheckLink,
    SetThreshold,
    SetInterval,
    SetClock,
    Record,
    SendRecords,
    ClearRecords,
}

impl State {
    fn serving(request: &Request) -> State {
        match request {
            Request::CheckLink => State::CheckLink,
            Request::GetRecords => State::SendRecords,
            Request::SetThreshold { .. } => State::SetThreshold,
            Request::SetInterval { .. } => State::SetInterval,
            Request::SetTime { .. } => State::SetClock,
            Request::ClearRecords => State::ClearRecords,
        }
    }

    fn is_asleep(&self) -> bool {
        matches!(self, State::Sleep | State::WaitWakeup)
    }
}

/// Top level state machine of the device.
///
/// [`Orchestrator::tick`] is called periodically from the main loop. Each tick takes at most one
/// button event and one host request, advances the measurement, refreshes the display, runs
/// the action of the current state and then makes at most one transition.
pub struct Orchestrator<'a, B: Board> {
    state: State,
    interrupts: &'a Interrupts,
    pipeline: MeasurementPipeline<'a, B::Sensor, B::SampleTimer>,
    interval_timer: B::IntervalTimer,
    display: B::Display,
    buzzer: B::Buzzer,
    link: B::Link,
    rtc: B::Rtc,
    records: RecordLog<B::Flash>,
    settings: Settings,
    deframer: Deframer,
    button: Option<ButtonEvent>,
    request: Option<Request>,
    record_pending: bool,
    recording_enabled: bool,
    sensor_fault: bool,
    shown_heart_rate: Option<BPM>,
}

impl<'a, B: Board> Orchestrator<'a, B> {
    pub fn new(devices: Devices<B>, interrupts: &'a Interrupts) -> Result<Self, Error> {
        let Devices {
            sensor,
            sample_timer,
            mut interval_timer,
            display,
            flash,
            buzzer,
            link,
            rtc,
        } = devices;

        let mut records = RecordLog::open(flash)?;
        let settings = Settings::load(records.flash())?;
        log::info!(
            "Thresholds {}-{}, record interval {} ms",
            settings.thresholds.lower(),
            settings.thresholds.upper(),
            settings.interval_prescaler
        );

        let pipeline = MeasurementPipeline::init(
            sensor,
            sample_timer,
            &interrupts.samples,
            SamplingConfig::default(),
        )?;

        interval_timer.set_prescaler(settings.interval_prescaler)?;
        interval_timer.set_period(INTERVAL_TIMER_PERIOD)?;
        interval_timer.start()?;

        let recording_enabled = !records.is_full();

        let mut o = Self {
            state: State::Idle,
            interrupts,
            pipeline,
            interval_timer,
            display,
            buzzer,
            link,
            rtc,
            records,
            settings,
            deframer: Deframer::default(),
            button: None,
            request: None,
            record_pending: false,
            recording_enabled,
            sensor_fault: false,
            shown_heart_rate: None,
        };
        if !recording_enabled {
            o.notify("Memory full");
        }
        Ok(o)
    }

    pub fn tick(&mut self) {
        self.poll_events();
        self.poll_host();
        let passes = self.advance_measurement();
        self.refresh_display(passes);
        self.run_action();
        self.transition();
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn heart_rate(&self) -> BPM {
        self.pipeline.heart_rate()
    }

    pub fn thresholds(&self) -> ThresholdPair {
        self.settings.thresholds
    }

    pub fn interval_prescaler(&self) -> u32 {
        self.settings.interval_prescaler
    }

    pub fn recording_enabled(&self) -> bool {
        self.recording_enabled
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    fn notify(&mut self, msg: &str) {
        if let Err(e) = self.display.show_notification(msg) {
            log::warn!("Failed to show notification: {}", e);
        }
    }

    fn report(&mut self, e: Error) {
        log::error!("{}", e);
        let msg = match e {
            Error::Overflow => "Overflow",
            Error::StorageExhausted => "Memory full",
            Error::ProtocolError => "Bad command",
            Error::InvalidInput | Error::HardwareFailure => "Error",
        };
        self.notify(msg);
    }

    fn reply(&mut self, command: u8, data: u32, marker: Marker) -> Result<(), Error> {
        self.link
            .transmit(&Packet::reply(command, data, marker).frame())
    }

    fn reject(&mut self, command: u8, e: Error) {
        log::warn!("Rejected packet for command {:#04x}: {}", command, e);
        if let Err(e) = self.reply(command, 0, Marker::Nak) {
            self.report(e);
        }
    }

    fn poll_events(&mut self) {
        self.button = self.interrupts.buttons.pop();

        let mut record = self.button == Some(ButtonEvent::Record);
        while self.interrupts.interval.pop().is_some() {
            record = true;
        }
        if record && !self.state.is_asleep() {
            if self.recording_enabled {
                self.record_pending = true;
            } else {
                self.notify("Memory full");
            }
        }
    }

    fn poll_host(&mut self) {
        match self.state {
            State::Sleep | State::WaitWakeup => {
                self.interrupts.rx.clear();
                self.deframer.reset();
            }
            State::Normal if self.request.is_none() => {
                while let Some(byte) = self.interrupts.rx.pop() {
                    match self.deframer.push(byte) {
                        None => {}
                        Some(Ok(packet)) => {
                            match Request::try_from(packet) {
                                Ok(request) => {
                                    log::info!("Host request {:?}", request);
                                    self.request = Some(request);
                                }
                                Err(e) => self.reject(packet.command, e),
                            }
                            break;
                        }
                        Some(Err(e)) => {
                            self.reject(0, e);
                            break;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn advance_measurement(&mut self) -> usize {
        if self.state.is_asleep() || self.sensor_fault {
            return 0;
        }
        match self.pipeline.ingest_available() {
            Ok(ingest) => ingest.passes,
            Err(e) => {
                self.report(e);
                0
            }
        }
    }

    fn refresh_display(&mut self, passes: usize) {
        if self.state.is_asleep() || self.sensor_fault {
            return;
        }

        let hr = self.pipeline.heart_rate();
        if self.shown_heart_rate != Some(hr) {
            self.shown_heart_rate = Some(hr);
            if let Err(e) = self.display.show_heart_rate(hr.0) {
                log::warn!("Failed to show heart rate: {}", e);
            }
        }
        if passes > 0 {
            let window = self.pipeline.window().to_array();
            if let Err(e) = self.display.show_waveform(&window) {
                log::warn!("Failed to show waveform: {}", e);
            }
        }
    }

    fn redraw(&mut self) -> Result<(), Error> {
        let t = self.settings.thresholds;
        let hr = self.pipeline.heart_rate();
        self.display.clear()?;
        self.display.show_thresholds(t.lower(), t.upper())?;
        self.display.show_heart_rate(hr.0)?;
        self.shown_heart_rate = Some(hr);
        Ok(())
    }

    fn run_action(&mut self) {
        let result = match self.state {
            State::Sleep => {
                self.power_down();
                Ok(())
            }
            State::Idle => {
                self.power_up();
                Ok(())
            }
            State::WaitWakeup | State::Normal | State::Warning => Ok(()),
            State::Record => self.record(),
            State::CheckLink
            | State::SetThreshold
            | State::SetInterval
            | State::SetClock
            | State::SendRecords
            | State::ClearRecords => self.serve_request(),
        };
        if let Err(e) = result {
            self.report(e);
        }
    }

    /// Every step runs even if an earlier one fails.
    fn power_down(&mut self) {
        log::info!("Going to sleep");
        self.request = None;
        self.record_pending = false;
        self.shown_heart_rate = None;
        let steps = [
            self.buzzer.disable(),
            self.interval_timer.stop(),
            self.pipeline.suspend(),
            self.display.clear(),
        ];
        for e in steps.into_iter().filter_map(Result::err) {
            self.report(e);
        }
    }

    fn power_up(&mut self) {
        self.sensor_fault = false;
        let sensor = self.pipeline.resume();
        let timer = self.interval_timer.start();
        if let Err(e) = self.redraw() {
            self.report(e);
        }
        if let Err(e) = sensor {
            // Keep showing the last heart rate until the next wake up retries the sensor.
            log::error!("Sensor failed to start: {}", e);
            self.sensor_fault = true;
            self.notify("Error");
        }
        if let Err(e) = timer {
            self.report(e);
        }
    }

    fn record(&mut self) -> Result<(), Error> {
        self.record_pending = false;
        if !self.recording_enabled {
            self.notify("Memory full");
            return Ok(());
        }

        let hr = self.pipeline.heart_rate();
        if !hr.is_known() || self.sensor_fault {
            self.notify("No heart rate");
            return Ok(());
        }

        let bpm = u8::try_from(hr.0).map_err(|_| Error::InvalidInput)?;
        let time = self.rtc.now()?;
        match self.records.append(HeartRateRecord::new(time, bpm)) {
            Ok(()) => {
                log::info!("Recorded {} bpm at {}", bpm, time);
                let msg: ArrForm<24> = arrform!(24, "Saved {} bpm", bpm);
                self.notify(msg.as_str());
                Ok(())
            }
            Err(Error::StorageExhausted) => {
                log::warn!("Record storage exhausted, recording disabled");
                self.recording_enabled = false;
                self.notify("Memory full");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn serve_request(&mut self) -> Result<(), Error> {
        let Some(request) = self.request.take() else {
            return Ok(());
        };
        let command = request.command().into();
        match self.execute(request) {
            Ok(data) => self.reply(command, data, Marker::Ack),
            Err(e) => {
                self.reply(command, 0, Marker::Nak)?;
                Err(e)
            }
        }
    }

    /// Carries out a host request and returns the data of the acknowledgement.
    fn execute(&mut self, request: Request) -> Result<u32, Error> {
        match request {
            Request::CheckLink => Ok(0),
            Request::GetRecords => self.send_records(),
            Request::SetThreshold { lower, upper } => {
                let settings = Settings {
                    thresholds: ThresholdPair::new(lower, upper)?,
                    ..self.settings
                };
                settings.save(self.records.flash())?;
                self.settings = settings;
                if let Err(e) = self.display.show_thresholds(lower, upper) {
                    log::warn!("Failed to show thresholds: {}", e);
                }
                Ok(0)
            }
            Request::SetInterval { prescaler } => {
                let settings = Settings {
                    interval_prescaler: prescaler,
                    ..self.settings
                };
                self.interval_timer.set_prescaler(prescaler)?;
                if let Err(e) = settings.save(self.records.flash()) {
                    let previous = self.settings.interval_prescaler;
                    if let Err(e) = self.interval_timer.set_prescaler(previous) {
                        log::error!("Failed to restore record interval: {}", e);
                    }
                    return Err(e);
                }
                self.settings = settings;
                Ok(0)
            }
            Request::SetTime { epoch } => {
                self.rtc.set(epoch)?;
                Ok(0)
            }
            Request::ClearRecords => {
                self.records.clear()?;
                self.recording_enabled = true;
                self.notify("Records cleared");
                Ok(0)
            }
        }
    }

    /// Streams every record as two packets, time first, and returns the number of records.
    fn send_records(&mut self) -> Result<u32, Error> {
        let command = Command::GetRecords.into();
        let n = self.records.len();
        for i in 0..n {
            let r = self.records.get(i)?;
            self.reply(command, r.time(), Marker::Record)?;
            self.reply(command, r.bpm as u32, Marker::Record)?;
        }
        log::info!("Sent {} records", n);
        Ok(n as u32)
    }

    /// Message for the alarm if the current estimate is outside the thresholds.
    fn alarm(&self) -> Option<&'static str> {
        let hr = self.pipeline.heart_rate();
        let t = self.settings.thresholds;
        if !hr.is_known() || self.sensor_fault {
            None
        } else if t.is_below(hr) {
            Some("Heart rate low")
        } else if t.is_above(hr) {
            Some("Heart rate high")
        } else {
            None
        }
    }

    fn transition(&mut self) {
        let button = self.button.take();
        let next = match self.state {
            State::WaitWakeup => match button {
                Some(ButtonEvent::Wake) => State::Idle,
                _ => State::WaitWakeup,
            },
            State::Sleep => State::WaitWakeup,
            _ if button == Some(ButtonEvent::Sleep) => State::Sleep,
            State::Idle => State::Normal,
            State::Normal => {
                if self.alarm().is_some() {
                    State::Warning
                } else if let Some(request) = &self.request {
                    State::serving(request)
                } else if self.record_pending {
                    State::Record
                } else {
                    State::Normal
                }
            }
            State::Warning => {
                if self.alarm().is_some() {
                    State::Warning
                } else {
                    State::Normal
                }
            }
            State::CheckLink
            | State::SetThreshold
            | State::SetInterval
            | State::SetClock
            | State::Record
            | State::SendRecords
            | State::ClearRecords => State::Normal,
        };

        if next != self.state {
            self.change_state(next);
        }
    }

    fn change_state(&mut self, next: State) {
        log::debug!("{:?} -> {:?}", self.state, next);
        if self.state == State::Warning {
            if let Err(e) = self.buzzer.disable() {
                self.report(e);
            }
            self.notify("");
        }
        if next == State::Warning {
            let msg = self.alarm().unwrap_or("");
            log::warn!("{} ({} bpm)", msg, self.pipeline.heart_rate().0);
            if let Err(e) = self.buzzer.enable(ALARM) {
                self.report(e);
            }
            self.notify(msg);
        }
        self.state = next;
    }
}
