use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::controller::Controller;
use crate::display::Display;
use crate::error::EmulatorError;
use crate::instruction::decode;
use crate::memory::{Memory, PROGRAM_ADDR};

pub const NUM_REGISTERS: usize = 16;

/// The 16 general-purpose registers. VF doubles as the carry, borrow, and
/// collision flag: flag-setting instructions overwrite it unconditionally,
/// yet programs may still address it like any other register.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Register {
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    VF,
}

impl Register {
    /// Maps the low nibble of `value` onto a register. Operand fields are
    /// 4-bit by construction, so this cannot fail.
    pub fn from_nibble(value: u8) -> Register {
        match value & 0x0F {
            0x0 => Register::V0,
            0x1 => Register::V1,
            0x2 => Register::V2,
            0x3 => Register::V3,
            0x4 => Register::V4,
            0x5 => Register::V5,
            0x6 => Register::V6,
            0x7 => Register::V7,
            0x8 => Register::V8,
            0x9 => Register::V9,
            0xA => Register::VA,
            0xB => Register::VB,
            0xC => Register::VC,
            0xD => Register::VD,
            0xE => Register::VE,
            _ => Register::VF,
        }
    }
}

pub struct RegisterBank {
    registers: [u8; NUM_REGISTERS],
}

impl RegisterBank {
    pub fn new() -> Self {
        RegisterBank {
            registers: [0; NUM_REGISTERS],
        }
    }

    pub fn read(&self, reg: Register) -> u8 {
        self.registers[reg as usize]
    }

    pub fn write(&mut self, reg: Register, value: u8) {
        self.registers[reg as usize] = value;
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

/// The instruction-set processor. It owns the address space and keeps shared
/// handles to the display and controller for its whole life; execution state
/// is the register bank, program counter, address register `I`, the
/// call-return stack, and the two countdown timers.
pub struct Processor {
    pub(crate) registers: RegisterBank,
    pub(crate) pc: u16,
    pub(crate) index: u16,
    pub(crate) stack: Vec<u16>,
    pub(crate) delay_timer: u8,
    pub(crate) sound_timer: u8,
    pub(crate) rng: StdRng,
    pub(crate) memory: Memory,
    pub(crate) display: Arc<Display>,
    pub(crate) controller: Arc<Controller>,
}

impl Processor {
    pub fn new(memory: Memory, display: Arc<Display>, controller: Arc<Controller>) -> Self {
        Processor {
            registers: RegisterBank::new(),
            pc: PROGRAM_ADDR,
            index: 0,
            stack: Vec::new(),
            delay_timer: 0,
            sound_timer: 0,
            // Seeded once per session; the random-byte instruction draws
            // from this generator instead of reseeding on every call.
            rng: StdRng::from_os_rng(),
            memory,
            display,
            controller,
        }
    }

    /// Runs one fetch-decode-execute cycle.
    pub fn tick(&mut self) -> Result<(), EmulatorError> {
        let opcode = self.fetch()?;
        let instruction = decode(opcode);
        instruction.execute(self)
    }

    /// Counts both timers down by one, saturating at zero. Ticked at the
    /// fixed 60 Hz frame rate regardless of the instruction rate.
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Whether the sound timer is running; the beeper stays on while it is.
    pub fn sound_active(&self) -> bool {
        self.sound_timer > 0
    }

    /// Reads the big-endian instruction at PC, then advances PC past it.
    /// Jumps and skips executed afterwards supersede the auto-advance.
    fn fetch(&mut self) -> Result<u16, EmulatorError> {
        let opcode = self.memory.read_instruction(self.pc)?;
        self.pc = self.pc.wrapping_add(2);
        Ok(opcode)
    }

    pub(crate) fn skip_next_instruction(&mut self) {
        self.pc = self.pc.wrapping_add(2);
    }
}
