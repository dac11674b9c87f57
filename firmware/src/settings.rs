use bytemuck::Zeroable;
use drivers_shared::{
    flash::Flash,
    protocol::{MAX_INTERVAL_PRESCALER, MIN_INTERVAL_PRESCALER},
    Error,
};
use hrm::BPM;

pub const DEFAULT_LOWER: u8 = 50;
pub const DEFAULT_UPPER: u8 = 120;
const _: () = assert!(DEFAULT_LOWER < DEFAULT_UPPER);

/// One record per minute.
pub const DEFAULT_INTERVAL_PRESCALER: u32 = 60_000;

pub const SETTINGS_SECTOR: u32 = 0;

const MAGIC: u32 = 0x5050_4753;
const VERSION: u8 = 1;

/// Heart rate band considered normal, both bounds inclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ThresholdPair {
    lower: u8,
    upper: u8,
}

impl Default for ThresholdPair {
    fn default() -> Self {
        Self {
            lower: DEFAULT_LOWER,
            upper: DEFAULT_UPPER,
        }
    }
}

impl ThresholdPair {
    pub fn new(lower: u8, upper: u8) -> Result<Self, Error> {
        if lower < upper {
            Ok(Self { lower, upper })
        } else {
            Err(Error::InvalidInput)
        }
    }

    pub fn lower(&self) -> u8 {
        self.lower
    }

    pub fn upper(&self) -> u8 {
        self.upper
    }

    pub fn is_below(&self, bpm: BPM) -> bool {
        bpm.0 < self.lower as u16
    }

    pub fn is_above(&self, bpm: BPM) -> bool {
        bpm.0 > self.upper as u16
    }

    pub fn contains(&self, bpm: BPM) -> bool {
        !self.is_below(bpm) && !self.is_above(bpm)
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Stored {
    magic: u32,
    interval_prescaler: u32,
    lower: u8,
    upper: u8,
    version: u8,
    _reserved: u8,
}

/// User configuration that survives power cycles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub thresholds: ThresholdPair,
    pub interval_prescaler: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            thresholds: ThresholdPair::default(),
            interval_prescaler: DEFAULT_INTERVAL_PRESCALER,
        }
    }
}

impl Settings {
    /// Reads the settings sector. A blank, foreign or corrupt sector yields the defaults.
    pub fn load<F: Flash>(flash: &mut F) -> Result<Self, Error> {
        let mut stored = Stored::zeroed();
        flash.read(
            SETTINGS_SECTOR * F::SECTOR_SIZE as u32,
            bytemuck::bytes_of_mut(&mut stored),
        )?;

        if stored.magic != MAGIC || stored.version != VERSION {
            log::info!("No stored settings, using defaults");
            return Ok(Self::default());
        }

        let thresholds = ThresholdPair::new(stored.lower, stored.upper);
        let interval_valid = (MIN_INTERVAL_PRESCALER..=MAX_INTERVAL_PRESCALER)
            .contains(&stored.interval_prescaler);
        match thresholds {
            Ok(thresholds) if interval_valid => Ok(Self {
                thresholds,
                interval_prescaler: stored.interval_prescaler,
            }),
            _ => {
                log::warn!("Stored settings are invalid, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn save<F: Flash>(&self, flash: &mut F) -> Result<(), Error> {
        let stored = Stored {
            magic: MAGIC,
            interval_prescaler: self.interval_prescaler,
            lower: self.thresholds.lower,
            upper: self.thresholds.upper,
            version: VERSION,
            _reserved: 0,
        };
        flash.erase_sector(SETTINGS_SECTOR)?;
        flash.write(
            SETTINGS_SECTOR * F::SECTOR_SIZE as u32,
            bytemuck::bytes_of(&stored),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MemFlash;

    #[test]
    fn thresholds() {
        assert_eq!(ThresholdPair::new(120, 50), Err(Error::InvalidInput));
        assert_eq!(ThresholdPair::new(60, 60), Err(Error::InvalidInput));

        let t = ThresholdPair::new(40, 180).unwrap();
        assert!(t.is_below(BPM(39)));
        assert!(t.contains(BPM(40)));
        assert!(t.contains(BPM(180)));
        assert!(t.is_above(BPM(181)));
    }

    #[test]
    fn blank_flash_gives_defaults() {
        let mut flash = MemFlash::default();
        assert_eq!(Settings::load(&mut flash).unwrap(), Settings::default());
    }

    #[test]
    fn save_and_load() {
        let mut flash = MemFlash::default();
        let s = Settings {
            thresholds: ThresholdPair::new(40, 180).unwrap(),
            interval_prescaler: 1000,
        };
        s.save(&mut flash).unwrap();
        assert_eq!(Settings::load(&mut flash).unwrap(), s);

        // Saving again must not depend on the previous content.
        let s2 = Settings::default();
        s2.save(&mut flash).unwrap();
        assert_eq!(Settings::load(&mut flash).unwrap(), s2);
    }

    #[test]
    fn corrupt_sector_gives_defaults() {
        let mut flash = MemFlash::default();
        Settings {
            thresholds: ThresholdPair::new(40, 180).unwrap(),
            interval_prescaler: 1000,
        }
        .save(&mut flash)
        .unwrap();
        // Clear bits of the upper threshold so that lower >= upper.
        flash.write(9, &[0]).unwrap();
        assert_eq!(Settings::load(&mut flash).unwrap(), Settings::default());
    }
}
