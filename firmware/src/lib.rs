#![cfg_attr(not(test), no_std)]

pub mod orchestrator;
pub mod pipeline;
pub mod settings;
pub mod storage;

#[cfg(test)]
mod test_util;

pub use orchestrator::{Board, Devices, Orchestrator, State};
