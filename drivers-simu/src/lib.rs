pub mod buzz;
pub mod console;
pub mod display;
pub mod flash;
pub mod hrm;
pub mod link;
pub mod time;

use smol::LocalExecutor;
use util::Interrupts;

/// Shared memory between the simulated interrupt sources and the main loop.
pub static INTERRUPTS: Interrupts = Interrupts::new();

/// Clock feeding both simulated timers.
pub const TIMER_CLOCK_HZ: u32 = 84_000_000;

pub struct Context {
    pub interrupts: &'static Interrupts,
    pub sensor: hrm::Ppg,
    pub sample_timer: time::HwTimer,
    pub interval_timer: time::HwTimer,
    pub display: display::Display,
    pub flash: flash::Flash,
    pub buzzer: buzz::Buzzer,
    pub link: link::Uart,
    pub rtc: time::Rtc,
    pub console: console::Console,
    pub start_time: time::Instant,
}

pub enum Never {}

pub trait Main: 'static {
    fn build(self, context: Context) -> impl core::future::Future<Output = Never> + 'static;
}

impl<F: core::future::Future<Output = Never> + 'static, C: FnOnce(Context) -> F + 'static> Main
    for C
{
    fn build(self, context: Context) -> impl core::future::Future<Output = Never> + 'static {
        self(context)
    }
}

pub fn run(main: impl Main) -> ! {
    let executor = LocalExecutor::new();

    let sensor = hrm::Ppg::default();
    let samples = sensor.clone();
    let sample_timer = time::HwTimer::new(&executor, TIMER_CLOCK_HZ, move |dt| {
        if let Some(s) = samples.convert(dt) {
            // A full queue is counted by the handoff and reported by the consumer.
            let _ = INTERRUPTS.samples.push(s);
        }
    });
    let interval_timer = time::HwTimer::new(&executor, TIMER_CLOCK_HZ, |_| {
        log::debug!("Record interval elapsed");
        let _ = INTERRUPTS.interval.push(());
    });

    let flash = match flash::Flash::open() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Failed to open flash image: {}", e);
            std::process::exit(1);
        }
    };

    let context = Context {
        interrupts: &INTERRUPTS,
        console: console::Console::new(&executor, &INTERRUPTS, sensor.clone()),
        sensor,
        sample_timer,
        interval_timer,
        display: display::Display::default(),
        flash,
        buzzer: buzz::Buzzer::default(),
        link: link::Uart::default(),
        rtc: time::Rtc::default(),
        start_time: time::Instant::now(),
    };
    let _ = smol::block_on(executor.run(main.build(context)));
    panic!("Main should never return");
}
