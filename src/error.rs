/// Error taxonomy of the emulator core.
///
/// Malformed opcodes are deliberately absent: unrecognized instructions are
/// ignored at decode time instead of being surfaced as errors.
#[derive(Debug, thiserror::Error)]
pub enum EmulatorError {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("memory access out of bounds at address {address:#06X}")]
    AddressOutOfBounds { address: u16 },

    #[error("stack underflow: return executed with an empty call stack")]
    StackUnderflow,
}
