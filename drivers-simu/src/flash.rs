use std::{fs::OpenOptions, ops::Range, path::Path};

use drivers_shared::{
    flash::{Flash as _, ERASED},
    Error,
};

const SECTOR_SIZE: usize = 4096;
const SECTOR_COUNT: usize = 2048 * 4096 / SECTOR_SIZE;

/// External NOR flash backed by a memory mapped image file, so records survive restarts of the
/// simulator. The file is taken from `OXIMETER_FLASH` and defaults to `flash.bin`.
pub struct Flash {
    image: memmap::MmapMut,
}

impl Flash {
    pub fn open() -> std::io::Result<Self> {
        let path = std::env::var("OXIMETER_FLASH").unwrap_or_else(|_| "flash.bin".to_owned());
        Self::open_path(path)
    }

    pub fn open_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        let fresh = file.metadata()?.len() != Self::capacity() as u64;
        if fresh {
            log::info!("Creating blank flash image {}", path.as_ref().display());
            file.set_len(Self::capacity() as u64)?;
        }

        let mut image = unsafe { memmap::MmapMut::map_mut(&file)? };
        if fresh {
            image.fill(ERASED);
            image.flush()?;
        }
        Ok(Self { image })
    }

    fn range(addr: u32, len: usize) -> Result<Range<usize>, Error> {
        let begin = addr as usize;
        match begin.checked_add(len) {
            Some(end) if end <= Self::capacity() => Ok(begin..end),
            _ => Err(Error::InvalidInput),
        }
    }
}

impl drivers_shared::flash::Flash for Flash {
    const SECTOR_SIZE: usize = SECTOR_SIZE;
    const SECTOR_COUNT: usize = SECTOR_COUNT;

    fn read(&mut self, addr: u32, out: &mut [u8]) -> Result<(), Error> {
        let r = Self::range(addr, out.len())?;
        out.copy_from_slice(&self.image[r]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        let r = Self::range(addr, data.len())?;
        for (d, s) in self.image[r.clone()].iter_mut().zip(data) {
            *d &= *s;
        }
        self.image
            .flush_range(r.start, r.len())
            .map_err(|_| Error::HardwareFailure)
    }

    fn erase_sector(&mut self, sector: u32) -> Result<(), Error> {
        let r = Self::range(sector * SECTOR_SIZE as u32, SECTOR_SIZE)?;
        self.image[r.clone()].fill(ERASED);
        self.image
            .flush_range(r.start, r.len())
            .map_err(|_| Error::HardwareFailure)
    }
}
