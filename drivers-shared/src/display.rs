use crate::Error;

pub trait Display {
    fn show_heart_rate(&mut self, bpm: u16) -> Result<(), Error>;
    /// `samples` are the filtered samples of the current window, oldest first.
    fn show_waveform(&mut self, samples: &[f32]) -> Result<(), Error>;
    fn show_thresholds(&mut self, lower: u8, upper: u8) -> Result<(), Error>;
    fn show_notification(&mut self, msg: &str) -> Result<(), Error>;
    fn clear(&mut self) -> Result<(), Error>;
}
