use drivers_simu::{
    time::{Duration, Ticker},
    Context, Never,
};
use oximeter::{Board, Devices, Orchestrator};

/// Period of the main loop. At 100 Hz this hands two samples to the pipeline per tick.
const TICK: Duration = Duration::from_millis(20);

struct Simulator;

impl Board for Simulator {
    type Sensor = drivers_simu::hrm::Ppg;
    type SampleTimer = drivers_simu::time::HwTimer;
    type IntervalTimer = drivers_simu::time::HwTimer;
    type Display = drivers_simu::display::Display;
    type Flash = drivers_simu::flash::Flash;
    type Buzzer = drivers_simu::buzz::Buzzer;
    type Link = drivers_simu::link::Uart;
    type Rtc = drivers_simu::time::Rtc;
}

async fn device(ctx: Context) -> Never {
    let Context {
        interrupts,
        sensor,
        sample_timer,
        interval_timer,
        display,
        flash,
        buzzer,
        link,
        rtc,
        console: _console,
        start_time,
    } = ctx;

    let devices = Devices::<Simulator> {
        sensor,
        sample_timer,
        interval_timer,
        display,
        flash,
        buzzer,
        link,
        rtc,
    };

    let mut orchestrator = match Orchestrator::new(devices, interrupts) {
        Ok(o) => o,
        Err(e) => {
            log::error!("Failed to start device: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("Booted in {:?}", start_time.elapsed());

    let mut ticker = Ticker::every(TICK);
    let mut last_state = orchestrator.state();
    loop {
        orchestrator.tick();
        if orchestrator.state() != last_state {
            last_state = orchestrator.state();
            log::info!(
                "{:?}, {} bpm, {} records",
                last_state,
                orchestrator.heart_rate().0,
                orchestrator.record_count()
            );
        }
        ticker.next().await;
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    drivers_simu::run(device)
}
