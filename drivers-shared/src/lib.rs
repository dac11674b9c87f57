#![cfg_attr(target_arch = "arm", no_std)]

pub mod button;
pub mod buzz;
pub mod display;
pub mod flash;
pub mod hrm;
pub mod link;
pub mod protocol;
pub mod record;
pub mod ssd1306;
pub mod time;

mod error;
pub use error::Error;
pub use num_enum;
