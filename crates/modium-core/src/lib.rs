//! Modium Core — error taxonomy and the constants of the emulated IPC bridge.

pub mod error;
pub mod protocol;

pub use error::{Error, Result};
