use std::time::Duration;

use drivers_shared::{
    button::{ButtonEvent, PressClassifier},
    protocol::{Command, Packet},
};
use smol::{io::AsyncBufReadExt, stream::StreamExt, LocalExecutor};
use util::Interrupts;

use crate::{hrm::Ppg, link};

const HELP: &str = "\
w | s | r          wake, sleep or record button event
press <ms>         button press of the given duration
hr <bpm>           heart rate of the simulated pulse, 0 detaches the sensor
link | get | clear check link, get records, clear records
thr <lo> <hi>      set alarm thresholds
int <ms>           set record interval
time [epoch]       set clock, defaults to the host clock
<hex bytes>        raw bytes to the device UART";

#[derive(Debug, PartialEq)]
enum Input {
    Button(ButtonEvent),
    Press(Duration),
    HeartRate(f32),
    Bytes(Vec<u8>),
    Help,
}

fn arg<T: std::str::FromStr>(arg: Option<&str>) -> Result<T, &'static str> {
    arg.ok_or("missing argument")?
        .parse()
        .map_err(|_| "invalid argument")
}

fn packet(command: Command, data: u32) -> Input {
    Input::Bytes(Packet::new(command.into(), data, 0).frame().to_vec())
}

fn parse(line: &str) -> Result<Input, &'static str> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Err("empty line");
    };
    Ok(match cmd {
        "w" => Input::Button(ButtonEvent::Wake),
        "s" => Input::Button(ButtonEvent::Sleep),
        "r" => Input::Button(ButtonEvent::Record),
        "press" => Input::Press(Duration::from_millis(arg(words.next())?)),
        "hr" => Input::HeartRate(arg(words.next())?),
        "link" => packet(Command::CheckLink, 0),
        "get" => packet(Command::GetRecords, 0),
        "clear" => packet(Command::ClearRecords, 0),
        "thr" => {
            let lower: u8 = arg(words.next())?;
            let upper: u8 = arg(words.next())?;
            packet(Command::SetThreshold, u32::from_be_bytes([lower, upper, 0, 0]))
        }
        "int" => packet(Command::SetInterval, arg(words.next())?),
        "time" => {
            let epoch = match words.next() {
                Some(e) => arg(Some(e))?,
                None => u32::try_from(chrono::Utc::now().timestamp()).map_err(|_| "clock")?,
            };
            packet(Command::SetTime, epoch)
        }
        "help" | "?" => Input::Help,
        _ => Input::Bytes(link::parse_hex(line).ok_or("unknown command, try help")?),
    })
}

/// Reads stdin line by line and plays the role of the button and the host.
pub struct Console {
    _update_thread: smol::Task<()>,
}

impl Console {
    pub fn new(executor: &LocalExecutor, interrupts: &'static Interrupts, ppg: Ppg) -> Self {
        Self {
            _update_thread: executor.spawn(async move {
                let mut classifier = PressClassifier::default();
                let stdin = smol::io::BufReader::new(smol::Unblock::new(std::io::stdin()));
                let mut lines = stdin.lines();
                println!("{}", HELP);
                while let Some(line) = lines.next().await {
                    let Ok(line) = line else {
                        break;
                    };
                    let event = match parse(&line) {
                        Ok(Input::Button(e)) => Some(e),
                        Ok(Input::Press(d)) => classifier.classify(d),
                        Ok(Input::HeartRate(bpm)) => {
                            ppg.set_heart_rate(bpm);
                            None
                        }
                        Ok(Input::Bytes(bytes)) => {
                            println!("-> {}", link::to_hex(&bytes));
                            for b in bytes {
                                if interrupts.rx.push(b).is_err() {
                                    log::warn!("UART receive buffer full");
                                }
                            }
                            None
                        }
                        Ok(Input::Help) => {
                            println!("{}", HELP);
                            None
                        }
                        Err(e) => {
                            println!("{}", e);
                            None
                        }
                    };
                    if let Some(e) = event {
                        log::info!("Button: {:?}", e);
                        if interrupts.buttons.push(e).is_err() {
                            log::warn!("Button event dropped");
                        }
                    }
                }
                log::info!("Console closed");
            }),
        }
    }
}
