//! A CHIP-8 virtual console: 4K of memory with the built-in hex font, a
//! 16-register processor clocked at 600 instructions per second, a 64x32
//! XOR-composited monochrome display, a 16-key pad, and 60 Hz delay and
//! sound timers.
//!
//! [`Emulator`] wires the pieces into a runnable terminal session; the
//! individual components are public for embedding in other frontends.

pub mod controller;
pub mod display;
pub mod emulator;
pub mod error;
pub mod instruction;
pub mod memory;
pub mod processor;

pub use controller::{Controller, Key};
pub use display::{DISPLAY_HEIGHT, DISPLAY_WIDTH, Display, Pixel};
pub use emulator::{Emulator, Settings};
pub use error::EmulatorError;
pub use memory::Memory;
pub use processor::Processor;
