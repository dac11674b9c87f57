use crate::Error;

/// NOR flash: erase sets a whole sector to `0xff`, writes can only clear bits.
pub trait Flash {
    const SECTOR_SIZE: usize;
    const SECTOR_COUNT: usize;

    fn read(&mut self, addr: u32 /*actually 24 bit*/, out: &mut [u8]) -> Result<(), Error>;
    fn write(&mut self, addr: u32 /*actually 24 bit*/, data: &[u8]) -> Result<(), Error>;
    fn erase_sector(&mut self, sector: u32) -> Result<(), Error>;

    fn capacity() -> usize {
        Self::SECTOR_SIZE * Self::SECTOR_COUNT
    }
}

pub const ERASED: u8 = 0xff;
