use crate::error::EmulatorError;

pub const RAM_SIZE: usize = 4096;
pub const FONT_ADDR: u16 = 0x50;
pub const FONT_GLYPH_HEIGHT: u16 = 5;
pub const PROGRAM_ADDR: u16 = 0x200;

/// Built-in hex digit font, 16 glyphs of 5 rows each, seeded at [`FONT_ADDR`].
const FONT_DATA: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Flat 4K address space. The font table lives at `0x050` and loaded program
/// images start at `0x200`. Nothing stops a program from writing over either
/// region; the address space only enforces its own bounds.
pub struct Memory {
    data: [u8; RAM_SIZE],
}

impl Memory {
    pub fn new() -> Self {
        let data = {
            let mut data = [0; RAM_SIZE];
            let font_addr = FONT_ADDR as usize;
            data[font_addr..font_addr + FONT_DATA.len()].copy_from_slice(&FONT_DATA);
            data
        };

        Memory { data }
    }

    pub fn read(&self, addr: u16) -> Result<u8, EmulatorError> {
        self.data
            .get(addr as usize)
            .copied()
            .ok_or(EmulatorError::AddressOutOfBounds { address: addr })
    }

    pub fn write(&mut self, addr: u16, value: u8) -> Result<(), EmulatorError> {
        let slot = self
            .data
            .get_mut(addr as usize)
            .ok_or(EmulatorError::AddressOutOfBounds { address: addr })?;
        *slot = value;
        Ok(())
    }

    /// Composes the two bytes at `pc` into one big-endian encoded instruction.
    pub fn read_instruction(&self, pc: u16) -> Result<u16, EmulatorError> {
        let high_byte = self.read(pc)?;
        let low_byte = self.read(pc.wrapping_add(1))?;

        Ok((u16::from(high_byte) << 8) | u16::from(low_byte))
    }

    /// Copies a raw program image into memory starting at [`PROGRAM_ADDR`].
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), EmulatorError> {
        let max_size = RAM_SIZE - PROGRAM_ADDR as usize;
        if program.len() > max_size {
            return Err(EmulatorError::RomTooLarge {
                size: program.len(),
                max_size,
            });
        }

        let start = PROGRAM_ADDR as usize;
        self.data[start..start + program.len()].copy_from_slice(program);
        log::info!("loaded {} byte program image at {PROGRAM_ADDR:#05X}", program.len());
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
