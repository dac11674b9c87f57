/// One stored heart rate measurement as it is laid out in flash.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct HeartRateRecord {
    time: [u8; 4],
    pub bpm: u8,
}

pub const RECORD_SIZE: usize = core::mem::size_of::<HeartRateRecord>();

impl HeartRateRecord {
    pub fn new(time: u32, bpm: u8) -> Self {
        Self {
            time: time.to_le_bytes(),
            bpm,
        }
    }

    pub fn time(&self) -> u32 {
        u32::from_le_bytes(self.time)
    }

    /// True for a slot that has not been written since the last erase.
    pub fn is_blank(&self) -> bool {
        bytemuck::bytes_of(self)
            .iter()
            .all(|b| *b == crate::flash::ERASED)
    }
}
