//! Append-only heart rate log.
//!
//! Records are packed back to back into every sector after the settings sector. They never
//! straddle a sector boundary, so the tail of each sector may stay unused. Since records are
//! only ever appended, the written slots form a prefix and the end of the log is found again at
//! boot by a binary search for the first blank slot.

use drivers_shared::{
    flash::Flash,
    record::{HeartRateRecord, RECORD_SIZE},
    Error,
};

use crate::settings::SETTINGS_SECTOR;

pub const FIRST_RECORD_SECTOR: u32 = SETTINGS_SECTOR + 1;

pub struct RecordLog<F> {
    flash: F,
    len: usize,
}

impl<F: Flash> RecordLog<F> {
    const SLOTS_PER_SECTOR: usize = F::SECTOR_SIZE / RECORD_SIZE;

    pub fn capacity() -> usize {
        (F::SECTOR_COUNT - FIRST_RECORD_SECTOR as usize) * Self::SLOTS_PER_SECTOR
    }

    fn slot_addr(slot: usize) -> u32 {
        let sector = FIRST_RECORD_SECTOR as usize + slot / Self::SLOTS_PER_SECTOR;
        let offset = (slot % Self::SLOTS_PER_SECTOR) * RECORD_SIZE;
        (sector * F::SECTOR_SIZE + offset) as u32
    }

    fn read_slot(flash: &mut F, slot: usize) -> Result<HeartRateRecord, Error> {
        let mut record = HeartRateRecord::new(0, 0);
        flash.read(Self::slot_addr(slot), bytemuck::bytes_of_mut(&mut record))?;
        Ok(record)
    }

    /// Takes ownership of the flash and locates the end of the existing log.
    pub fn open(mut flash: F) -> Result<Self, Error> {
        if F::SECTOR_COUNT <= FIRST_RECORD_SECTOR as usize || Self::SLOTS_PER_SECTOR == 0 {
            return Err(Error::InvalidInput);
        }

        let mut lo = 0;
        let mut hi = Self::capacity();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if Self::read_slot(&mut flash, mid)?.is_blank() {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        log::info!("Record log holds {} of {} records", lo, Self::capacity());

        Ok(Self { flash, len: lo })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == Self::capacity()
    }

    pub fn append(&mut self, record: HeartRateRecord) -> Result<(), Error> {
        if record.is_blank() {
            return Err(Error::InvalidInput);
        }
        if self.is_full() {
            return Err(Error::StorageExhausted);
        }
        self.flash
            .write(Self::slot_addr(self.len), bytemuck::bytes_of(&record))?;
        self.len += 1;
        Ok(())
    }

    pub fn get(&mut self, index: usize) -> Result<HeartRateRecord, Error> {
        if index >= self.len {
            return Err(Error::InvalidInput);
        }
        Self::read_slot(&mut self.flash, index)
    }

    /// Erases every sector holding records.
    pub fn clear(&mut self) -> Result<(), Error> {
        let used_sectors = self.len.div_ceil(Self::SLOTS_PER_SECTOR);
        for s in 0..used_sectors {
            self.flash.erase_sector(FIRST_RECORD_SECTOR + s as u32)?;
        }
        self.len = 0;
        Ok(())
    }

    /// Access for the settings that share the chip.
    pub fn flash(&mut self) -> &mut F {
        &mut self.flash
    }
}
