use crate::controller::Key;
use crate::error::EmulatorError;
use crate::memory::{FONT_ADDR, FONT_GLYPH_HEIGHT};
use crate::processor::{Processor, Register};
use rand::Rng;

/// One decoded operation of the instruction set. Execution happens against
/// the full processor because most operations reach into memory, the display,
/// or the controller as a side effect.
pub trait Instruction {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError>;
}

/// Decodes a raw 16-bit opcode into an executable instruction.
///
/// Decoding never fails: anything that matches no known pattern (including
/// gaps in the 0x8/0xE/0xF sub-dispatch) becomes a no-op, since crashing on
/// garbage opcodes would take down programs that run fine on real
/// interpreters.
pub fn decode(raw: u16) -> Box<dyn Instruction> {
    let decoded = DecodedInstruction::new(raw);
    let family = (raw >> 12) as u8;

    match family {
        0x0 => match decoded.nnn {
            0x0E0 => Box::new(ClearScreen),
            0x0EE => Box::new(SubroutineReturn),
            // 0NNN machine-code routines behave like ordinary calls.
            _ => Box::new(SubroutineCall(decoded)),
        },
        0x1 => Box::new(Jump(decoded)),
        0x2 => Box::new(SubroutineCall(decoded)),
        0x3 => Box::new(SkipEqImmediate(decoded)),
        0x4 => Box::new(SkipNeqImmediate(decoded)),
        0x5 => match decoded.n {
            0x0 => Box::new(SkipEqRegister(decoded)),
            _ => Box::new(Unknown(raw)),
        },
        0x6 => Box::new(SetImmediate(decoded)),
        0x7 => Box::new(AddImmediate(decoded)),
        0x8 => match decoded.n {
            0x0 => Box::new(SetFromRegister(decoded)),
            0x1 => Box::new(BinaryOr(decoded)),
            0x2 => Box::new(BinaryAnd(decoded)),
            0x3 => Box::new(BinaryXor(decoded)),
            0x4 => Box::new(AddWithCarry(decoded)),
            0x5 => Box::new(SubtractYFromX(decoded)),
            0x6 => Box::new(RightShift(decoded)),
            0x7 => Box::new(SubtractXFromY(decoded)),
            0xE => Box::new(LeftShift(decoded)),
            _ => Box::new(Unknown(raw)),
        },
        0x9 => match decoded.n {
            0x0 => Box::new(SkipNeqRegister(decoded)),
            _ => Box::new(Unknown(raw)),
        },
        0xA => Box::new(SetIndex(decoded)),
        0xB => Box::new(JumpWithOffset(decoded)),
        0xC => Box::new(Random(decoded)),
        0xD => Box::new(Draw(decoded)),
        0xE => match decoded.nn {
            0x9E => Box::new(SkipIfKeyPressed(decoded)),
            0xA1 => Box::new(SkipIfKeyNotPressed(decoded)),
            _ => Box::new(Unknown(raw)),
        },
        0xF => match decoded.nn {
            0x07 => Box::new(ReadDelayTimer(decoded)),
            0x0A => Box::new(WaitForKey(decoded)),
            0x15 => Box::new(SetDelayTimer(decoded)),
            0x18 => Box::new(SetSoundTimer(decoded)),
            0x1E => Box::new(AddToIndex(decoded)),
            0x29 => Box::new(FontCharacter(decoded)),
            0x33 => Box::new(BinaryCodedDecimal(decoded)),
            0x55 => Box::new(StoreRegisters(decoded)),
            0x65 => Box::new(LoadRegisters(decoded)),
            _ => Box::new(Unknown(raw)),
        },
        _ => Box::new(Unknown(raw)),
    }
}

/// Operand fields extracted from the opcode by fixed bit masks.
struct DecodedInstruction {
    /// Second nibble, addressing one of the 16 registers.
    x: Register,
    /// Third nibble, addressing one of the 16 registers.
    y: Register,
    /// Fourth nibble. A 4-bit count.
    n: u8,
    /// Low byte. An 8-bit immediate.
    nn: u8,
    /// Low 12 bits. An address.
    nnn: u16,
}

impl DecodedInstruction {
    fn new(raw: u16) -> Self {
        DecodedInstruction {
            x: Register::from_nibble((raw >> 8) as u8),
            y: Register::from_nibble((raw >> 4) as u8),
            n: (raw & 0x000F) as u8,
            nn: (raw & 0x00FF) as u8,
            nnn: raw & 0x0FFF,
        }
    }
}

/// 00E0
struct ClearScreen;
impl Instruction for ClearScreen {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        cpu.display.clear();
        Ok(())
    }
}

/// 00EE
struct SubroutineReturn;
impl Instruction for SubroutineReturn {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        cpu.pc = cpu.stack.pop().ok_or(EmulatorError::StackUnderflow)?;
        Ok(())
    }
}

/// 2NNN and 0NNN
struct SubroutineCall(DecodedInstruction);
impl Instruction for SubroutineCall {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        cpu.stack.push(cpu.pc);
        cpu.pc = self.0.nnn;
        Ok(())
    }
}

/// 1NNN
struct Jump(DecodedInstruction);
impl Instruction for Jump {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        cpu.pc = self.0.nnn;
        Ok(())
    }
}

/// 3XNN
struct SkipEqImmediate(DecodedInstruction);
impl Instruction for SkipEqImmediate {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        if cpu.registers.read(self.0.x) == self.0.nn {
            cpu.skip_next_instruction();
        }
        Ok(())
    }
}

/// 4XNN
struct SkipNeqImmediate(DecodedInstruction);
impl Instruction for SkipNeqImmediate {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        if cpu.registers.read(self.0.x) != self.0.nn {
            cpu.skip_next_instruction();
        }
        Ok(())
    }
}

/// 5XY0
struct SkipEqRegister(DecodedInstruction);
impl Instruction for SkipEqRegister {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        if cpu.registers.read(self.0.x) == cpu.registers.read(self.0.y) {
            cpu.skip_next_instruction();
        }
        Ok(())
    }
}

/// 9XY0
struct SkipNeqRegister(DecodedInstruction);
impl Instruction for SkipNeqRegister {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        if cpu.registers.read(self.0.x) != cpu.registers.read(self.0.y) {
            cpu.skip_next_instruction();
        }
        Ok(())
    }
}

/// 6XNN
struct SetImmediate(DecodedInstruction);
impl Instruction for SetImmediate {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        cpu.registers.write(self.0.x, self.0.nn);
        Ok(())
    }
}

/// 7XNN, wraps without touching the flag register.
struct AddImmediate(DecodedInstruction);
impl Instruction for AddImmediate {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let value = cpu.registers.read(self.0.x);
        cpu.registers.write(self.0.x, value.wrapping_add(self.0.nn));
        Ok(())
    }
}

/// 8XY0
struct SetFromRegister(DecodedInstruction);
impl Instruction for SetFromRegister {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let value = cpu.registers.read(self.0.y);
        cpu.registers.write(self.0.x, value);
        Ok(())
    }
}

/// 8XY1
struct BinaryOr(DecodedInstruction);
impl Instruction for BinaryOr {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let value = cpu.registers.read(self.0.x) | cpu.registers.read(self.0.y);
        cpu.registers.write(self.0.x, value);
        Ok(())
    }
}

/// 8XY2
struct BinaryAnd(DecodedInstruction);
impl Instruction for BinaryAnd {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let value = cpu.registers.read(self.0.x) & cpu.registers.read(self.0.y);
        cpu.registers.write(self.0.x, value);
        Ok(())
    }
}

/// 8XY3
struct BinaryXor(DecodedInstruction);
impl Instruction for BinaryXor {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let value = cpu.registers.read(self.0.x) ^ cpu.registers.read(self.0.y);
        cpu.registers.write(self.0.x, value);
        Ok(())
    }
}

/// 8XY4, VF reports the carry.
struct AddWithCarry(DecodedInstruction);
impl Instruction for AddWithCarry {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let value_x = cpu.registers.read(self.0.x);
        let value_y = cpu.registers.read(self.0.y);
        let (sum, carry) = value_x.overflowing_add(value_y);

        cpu.registers.write(self.0.x, sum);
        cpu.registers.write(Register::VF, u8::from(carry));
        Ok(())
    }
}

/// 8XY5, VF reports "no borrow".
struct SubtractYFromX(DecodedInstruction);
impl Instruction for SubtractYFromX {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let value_x = cpu.registers.read(self.0.x);
        let value_y = cpu.registers.read(self.0.y);

        cpu.registers.write(self.0.x, value_x.wrapping_sub(value_y));
        cpu.registers.write(Register::VF, u8::from(value_x >= value_y));
        Ok(())
    }
}

/// 8XY7, the operand order of 8XY5 reversed.
struct SubtractXFromY(DecodedInstruction);
impl Instruction for SubtractXFromY {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let value_x = cpu.registers.read(self.0.x);
        let value_y = cpu.registers.read(self.0.y);

        cpu.registers.write(self.0.x, value_y.wrapping_sub(value_x));
        cpu.registers.write(Register::VF, u8::from(value_y >= value_x));
        Ok(())
    }
}

/// 8XY6, VF takes the bit shifted out.
struct RightShift(DecodedInstruction);
impl Instruction for RightShift {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let value = cpu.registers.read(self.0.x);

        cpu.registers.write(Register::VF, value & 1);
        cpu.registers.write(self.0.x, value >> 1);
        Ok(())
    }
}

/// 8XYE, VF takes the bit shifted out.
struct LeftShift(DecodedInstruction);
impl Instruction for LeftShift {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let value = cpu.registers.read(self.0.x);

        cpu.registers.write(Register::VF, (value >> 7) & 1);
        cpu.registers.write(self.0.x, value << 1);
        Ok(())
    }
}

/// ANNN
struct SetIndex(DecodedInstruction);
impl Instruction for SetIndex {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        cpu.index = self.0.nnn;
        Ok(())
    }
}

/// BNNN
struct JumpWithOffset(DecodedInstruction);
impl Instruction for JumpWithOffset {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let offset = u16::from(cpu.registers.read(Register::V0));
        cpu.pc = self.0.nnn.wrapping_add(offset);
        Ok(())
    }
}

/// CXNN, draws from the processor's persistent generator.
struct Random(DecodedInstruction);
impl Instruction for Random {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let random_byte: u8 = cpu.rng.random();
        cpu.registers.write(self.0.x, random_byte & self.0.nn);
        Ok(())
    }
}

/// DXYN, VF reports the collision flag.
struct Draw(DecodedInstruction);
impl Instruction for Draw {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let x = cpu.registers.read(self.0.x);
        let y = cpu.registers.read(self.0.y);
        let collision = cpu
            .display
            .draw_sprite(x, y, self.0.n, cpu.index, &cpu.memory)?;

        cpu.registers.write(Register::VF, u8::from(collision));
        Ok(())
    }
}

/// EX9E
struct SkipIfKeyPressed(DecodedInstruction);
impl Instruction for SkipIfKeyPressed {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let key = Key::from_nibble(cpu.registers.read(self.0.x));
        if cpu.controller.is_key_pressed(key) {
            cpu.skip_next_instruction();
        }
        Ok(())
    }
}

/// EXA1
struct SkipIfKeyNotPressed(DecodedInstruction);
impl Instruction for SkipIfKeyNotPressed {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let key = Key::from_nibble(cpu.registers.read(self.0.x));
        if !cpu.controller.is_key_pressed(key) {
            cpu.skip_next_instruction();
        }
        Ok(())
    }
}

/// FX07
struct ReadDelayTimer(DecodedInstruction);
impl Instruction for ReadDelayTimer {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        cpu.registers.write(self.0.x, cpu.delay_timer);
        Ok(())
    }
}

/// FX0A, busy-waits by rewinding PC onto itself until a key is held.
/// When several keys are held at once the lowest index wins.
struct WaitForKey(DecodedInstruction);
impl Instruction for WaitForKey {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        match cpu.controller.first_pressed_key() {
            Some(key) => cpu.registers.write(self.0.x, key.index()),
            None => cpu.pc = cpu.pc.wrapping_sub(2),
        }
        Ok(())
    }
}

/// FX15
struct SetDelayTimer(DecodedInstruction);
impl Instruction for SetDelayTimer {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        cpu.delay_timer = cpu.registers.read(self.0.x);
        Ok(())
    }
}

/// FX18
struct SetSoundTimer(DecodedInstruction);
impl Instruction for SetSoundTimer {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        cpu.sound_timer = cpu.registers.read(self.0.x);
        Ok(())
    }
}

/// FX1E
struct AddToIndex(DecodedInstruction);
impl Instruction for AddToIndex {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let value = u16::from(cpu.registers.read(self.0.x));
        cpu.index = cpu.index.wrapping_add(value);
        Ok(())
    }
}

/// FX29, points I at the 5-byte font glyph for the low nibble of VX.
struct FontCharacter(DecodedInstruction);
impl Instruction for FontCharacter {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let digit = u16::from(cpu.registers.read(self.0.x) & 0x0F);
        cpu.index = FONT_ADDR + digit * FONT_GLYPH_HEIGHT;
        Ok(())
    }
}

/// FX33, stores the decimal digits of VX at I, I+1, I+2.
struct BinaryCodedDecimal(DecodedInstruction);
impl Instruction for BinaryCodedDecimal {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        let value = cpu.registers.read(self.0.x);

        cpu.memory.write(cpu.index, value / 100)?;
        cpu.memory.write(cpu.index.wrapping_add(1), (value / 10) % 10)?;
        cpu.memory.write(cpu.index.wrapping_add(2), value % 10)?;
        Ok(())
    }
}

/// FX55, dumps V0..=VX to memory at I. I itself is left untouched.
struct StoreRegisters(DecodedInstruction);
impl Instruction for StoreRegisters {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        for offset in 0..=self.0.x as u8 {
            let value = cpu.registers.read(Register::from_nibble(offset));
            cpu.memory
                .write(cpu.index.wrapping_add(u16::from(offset)), value)?;
        }
        Ok(())
    }
}

/// FX65, fills V0..=VX from memory at I. I itself is left untouched.
struct LoadRegisters(DecodedInstruction);
impl Instruction for LoadRegisters {
    fn execute(&self, cpu: &mut Processor) -> Result<(), EmulatorError> {
        for offset in 0..=self.0.x as u8 {
            let value = cpu.memory.read(cpu.index.wrapping_add(u16::from(offset)))?;
            cpu.registers.write(Register::from_nibble(offset), value);
        }
        Ok(())
    }
}

/// Anything the decoder did not recognize. Executes as a no-op.
struct Unknown(u16);
impl Instruction for Unknown {
    fn execute(&self, _cpu: &mut Processor) -> Result<(), EmulatorError> {
        log::debug!("ignoring unrecognized opcode {:#06X}", self.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::display::{DISPLAY_WIDTH, Display};
    use crate::memory::{Memory, PROGRAM_ADDR};
    use std::sync::Arc;

    fn processor_with(program: &[u8]) -> Processor {
        let mut memory = Memory::new();
        memory.load_program(program).unwrap();
        Processor::new(memory, Arc::new(Display::new()), Arc::new(Controller::new()))
    }

    fn run(cpu: &mut Processor, ticks: usize) {
        for _ in 0..ticks {
            cpu.tick().unwrap();
        }
    }

    #[test]
    fn pc_advances_by_two_per_plain_instruction() {
        let mut cpu = processor_with(&[0x60, 0x01, 0x61, 0x02]);

        cpu.tick().unwrap();
        assert_eq!(cpu.pc, PROGRAM_ADDR + 2);
        cpu.tick().unwrap();
        assert_eq!(cpu.pc, PROGRAM_ADDR + 4);
    }

    #[test]
    fn skip_eq_immediate_takes_and_falls_through() {
        let mut cpu = processor_with(&[0x30, 0x05]);
        cpu.registers.write(Register::V0, 0x05);
        cpu.tick().unwrap();
        assert_eq!(cpu.pc, PROGRAM_ADDR + 4);

        let mut cpu = processor_with(&[0x30, 0x05]);
        cpu.registers.write(Register::V0, 0x06);
        cpu.tick().unwrap();
        assert_eq!(cpu.pc, PROGRAM_ADDR + 2);
    }

    #[test]
    fn skip_neq_immediate_takes_and_falls_through() {
        let mut cpu = processor_with(&[0x40, 0x05]);
        cpu.registers.write(Register::V0, 0x06);
        cpu.tick().unwrap();
        assert_eq!(cpu.pc, PROGRAM_ADDR + 4);

        let mut cpu = processor_with(&[0x40, 0x05]);
        cpu.registers.write(Register::V0, 0x05);
        cpu.tick().unwrap();
        assert_eq!(cpu.pc, PROGRAM_ADDR + 2);
    }

    #[test]
    fn register_compare_skips() {
        let mut cpu = processor_with(&[0x50, 0x10]);
        cpu.registers.write(Register::V0, 0x42);
        cpu.registers.write(Register::V1, 0x42);
        cpu.tick().unwrap();
        assert_eq!(cpu.pc, PROGRAM_ADDR + 4);

        let mut cpu = processor_with(&[0x90, 0x10]);
        cpu.registers.write(Register::V0, 0x42);
        cpu.registers.write(Register::V1, 0x41);
        cpu.tick().unwrap();
        assert_eq!(cpu.pc, PROGRAM_ADDR + 4);
    }

    #[test]
    fn jump_overwrites_the_auto_advance() {
        let mut cpu = processor_with(&[0x13, 0x45]);

        cpu.tick().unwrap();
        assert_eq!(cpu.pc, 0x345);
    }

    #[test]
    fn call_pushes_the_return_address() {
        let mut cpu = processor_with(&[0x23, 0x00]);

        cpu.tick().unwrap();
        assert_eq!(cpu.pc, 0x300);
        assert_eq!(cpu.stack, vec![PROGRAM_ADDR + 2]);
    }

    #[test]
    fn machine_code_routine_behaves_like_a_call() {
        let mut cpu = processor_with(&[0x03, 0x00]);

        cpu.tick().unwrap();
        assert_eq!(cpu.pc, 0x300);
        assert_eq!(cpu.stack, vec![PROGRAM_ADDR + 2]);
    }

    #[test]
    fn call_then_return_resumes_after_the_call() {
        // 0x200: CALL 0x204 / 0x202: (skipped) / 0x204: RET
        let mut cpu = processor_with(&[0x22, 0x04, 0x00, 0x00, 0x00, 0xEE]);

        run(&mut cpu, 2);
        assert_eq!(cpu.pc, PROGRAM_ADDR + 2);
        assert!(cpu.stack.is_empty());
    }

    #[test]
    fn return_with_empty_stack_is_fatal() {
        let mut cpu = processor_with(&[0x00, 0xEE]);

        assert!(matches!(cpu.tick(), Err(EmulatorError::StackUnderflow)));
    }

    #[test]
    fn add_immediate_wraps_without_flagging() {
        let mut cpu = processor_with(&[0x70, 0x02]);
        cpu.registers.write(Register::V0, 0xFF);
        cpu.registers.write(Register::VF, 0xAA);

        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0x01);
        assert_eq!(cpu.registers.read(Register::VF), 0xAA);
    }

    #[test]
    fn logical_ops_leave_the_flag_alone() {
        // OR, AND, XOR back to back on V0/V1.
        let mut cpu = processor_with(&[0x80, 0x11, 0x80, 0x12, 0x80, 0x13]);
        cpu.registers.write(Register::V0, 0b1100);
        cpu.registers.write(Register::V1, 0b1010);
        cpu.registers.write(Register::VF, 0x77);

        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0b1110);
        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0b1010);
        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0b0000);
        assert_eq!(cpu.registers.read(Register::VF), 0x77);
    }

    #[test]
    fn set_from_register_copies_y() {
        let mut cpu = processor_with(&[0x80, 0x10]);
        cpu.registers.write(Register::V1, 0x99);

        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0x99);
    }

    #[test]
    fn add_with_carry_sets_and_clears_vf() {
        let mut cpu = processor_with(&[0x80, 0x14]);
        cpu.registers.write(Register::V0, 0xFF);
        cpu.registers.write(Register::V1, 0x01);
        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0x00);
        assert_eq!(cpu.registers.read(Register::VF), 1);

        let mut cpu = processor_with(&[0x80, 0x14]);
        cpu.registers.write(Register::V0, 0x01);
        cpu.registers.write(Register::V1, 0x01);
        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0x02);
        assert_eq!(cpu.registers.read(Register::VF), 0);
    }

    #[test]
    fn subtract_sets_the_no_borrow_flag() {
        let mut cpu = processor_with(&[0x80, 0x15]);
        cpu.registers.write(Register::V0, 0x05);
        cpu.registers.write(Register::V1, 0x03);
        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0x02);
        assert_eq!(cpu.registers.read(Register::VF), 1);

        let mut cpu = processor_with(&[0x80, 0x15]);
        cpu.registers.write(Register::V0, 0x03);
        cpu.registers.write(Register::V1, 0x05);
        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0xFE);
        assert_eq!(cpu.registers.read(Register::VF), 0);
    }

    #[test]
    fn reverse_subtract_sets_the_no_borrow_flag() {
        let mut cpu = processor_with(&[0x80, 0x17]);
        cpu.registers.write(Register::V0, 0x03);
        cpu.registers.write(Register::V1, 0x05);
        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0x02);
        assert_eq!(cpu.registers.read(Register::VF), 1);

        let mut cpu = processor_with(&[0x80, 0x17]);
        cpu.registers.write(Register::V0, 0x05);
        cpu.registers.write(Register::V1, 0x03);
        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0xFE);
        assert_eq!(cpu.registers.read(Register::VF), 0);
    }

    #[test]
    fn shifts_capture_the_ejected_bit() {
        let mut cpu = processor_with(&[0x80, 0x16]);
        cpu.registers.write(Register::V0, 0b0000_0101);
        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0b0000_0010);
        assert_eq!(cpu.registers.read(Register::VF), 1);

        let mut cpu = processor_with(&[0x80, 0x1E]);
        cpu.registers.write(Register::V0, 0b1000_0001);
        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0b0000_0010);
        assert_eq!(cpu.registers.read(Register::VF), 1);
    }

    #[test]
    fn set_index_and_add_to_index() {
        let mut cpu = processor_with(&[0xA1, 0x23, 0xF0, 0x1E]);
        cpu.registers.write(Register::V0, 0x10);

        run(&mut cpu, 2);
        assert_eq!(cpu.index, 0x133);
    }

    #[test]
    fn jump_with_offset_adds_v0() {
        let mut cpu = processor_with(&[0xB3, 0x00]);
        cpu.registers.write(Register::V0, 0x42);

        cpu.tick().unwrap();
        assert_eq!(cpu.pc, 0x342);
    }

    #[test]
    fn random_byte_is_masked_by_the_immediate() {
        let mut cpu = processor_with(&[0xC0, 0x00, 0xC1, 0x0F]);

        run(&mut cpu, 2);
        assert_eq!(cpu.registers.read(Register::V0), 0);
        assert!(cpu.registers.read(Register::V1) <= 0x0F);
    }

    #[test]
    fn draw_reports_collision_through_vf() {
        // I = 0x050 (glyph 0), draw twice at the same spot.
        let mut cpu = processor_with(&[0xA0, 0x50, 0xD0, 0x15, 0xD0, 0x15]);

        run(&mut cpu, 2);
        assert_eq!(cpu.registers.read(Register::VF), 0);
        assert!(cpu.display.draw_flag());

        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::VF), 1);
        assert!(cpu.display.pixels().iter().all(|p| !p.is_on()));
    }

    #[test]
    fn key_skips_follow_controller_state() {
        let mut cpu = processor_with(&[0xE0, 0x9E]);
        cpu.registers.write(Register::V0, 0x04);
        cpu.controller.set_key_status(Key::Key4, true);
        cpu.tick().unwrap();
        assert_eq!(cpu.pc, PROGRAM_ADDR + 4);

        let mut cpu = processor_with(&[0xE0, 0xA1]);
        cpu.registers.write(Register::V0, 0x04);
        cpu.tick().unwrap();
        assert_eq!(cpu.pc, PROGRAM_ADDR + 4);
    }

    #[test]
    fn delay_timer_round_trips_through_registers() {
        let mut cpu = processor_with(&[0xF0, 0x15, 0xF1, 0x07]);
        cpu.registers.write(Register::V0, 0x30);

        run(&mut cpu, 2);
        assert_eq!(cpu.delay_timer, 0x30);
        assert_eq!(cpu.registers.read(Register::V1), 0x30);
    }

    #[test]
    fn sound_timer_is_set_from_vx() {
        let mut cpu = processor_with(&[0xF0, 0x18]);
        cpu.registers.write(Register::V0, 0x21);

        cpu.tick().unwrap();
        assert_eq!(cpu.sound_timer, 0x21);
        assert!(cpu.sound_active());
    }

    #[test]
    fn wait_for_key_rewinds_until_a_key_is_held() {
        let mut cpu = processor_with(&[0xF0, 0x0A]);

        run(&mut cpu, 3);
        assert_eq!(cpu.pc, PROGRAM_ADDR);

        cpu.controller.set_key_status(Key::Key9, true);
        cpu.tick().unwrap();
        assert_eq!(cpu.pc, PROGRAM_ADDR + 2);
        assert_eq!(cpu.registers.read(Register::V0), 0x09);
    }

    #[test]
    fn wait_for_key_prefers_the_lowest_index() {
        let mut cpu = processor_with(&[0xF0, 0x0A]);
        cpu.controller.set_key_status(Key::KeyB, true);
        cpu.controller.set_key_status(Key::Key2, true);

        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0x02);
    }

    #[test]
    fn font_lookup_points_at_the_glyph() {
        let mut cpu = processor_with(&[0xF0, 0x29]);
        cpu.registers.write(Register::V0, 0x0A);

        cpu.tick().unwrap();
        assert_eq!(cpu.index, FONT_ADDR + 0x0A * FONT_GLYPH_HEIGHT);

        let glyph_a = [0xF0, 0x90, 0xF0, 0x90, 0x90];
        for (i, &byte) in glyph_a.iter().enumerate() {
            assert_eq!(cpu.memory.read(cpu.index + i as u16).unwrap(), byte);
        }
    }

    #[test]
    fn bcd_splits_hundreds_tens_units() {
        let mut cpu = processor_with(&[0xF0, 0x33]);
        cpu.registers.write(Register::V0, 234);
        cpu.index = 0x400;

        cpu.tick().unwrap();
        assert_eq!(cpu.memory.read(0x400).unwrap(), 2);
        assert_eq!(cpu.memory.read(0x401).unwrap(), 3);
        assert_eq!(cpu.memory.read(0x402).unwrap(), 4);
    }

    #[test]
    fn register_dump_and_fill_are_inclusive_and_keep_index() {
        let mut cpu = processor_with(&[0xF2, 0x55]);
        cpu.registers.write(Register::V0, 0x11);
        cpu.registers.write(Register::V1, 0x22);
        cpu.registers.write(Register::V2, 0x33);
        cpu.registers.write(Register::V3, 0x44);
        cpu.index = 0x400;

        cpu.tick().unwrap();
        assert_eq!(cpu.memory.read(0x400).unwrap(), 0x11);
        assert_eq!(cpu.memory.read(0x401).unwrap(), 0x22);
        assert_eq!(cpu.memory.read(0x402).unwrap(), 0x33);
        assert_eq!(cpu.memory.read(0x403).unwrap(), 0x00);
        assert_eq!(cpu.index, 0x400);

        let mut cpu = processor_with(&[0xF1, 0x65]);
        cpu.index = 0x400;
        cpu.memory.write(0x400, 0xAB).unwrap();
        cpu.memory.write(0x401, 0xCD).unwrap();

        cpu.tick().unwrap();
        assert_eq!(cpu.registers.read(Register::V0), 0xAB);
        assert_eq!(cpu.registers.read(Register::V1), 0xCD);
        assert_eq!(cpu.registers.read(Register::V2), 0x00);
        assert_eq!(cpu.index, 0x400);
    }

    #[test]
    fn unrecognized_opcodes_are_ignored() {
        // Gaps in the 0x5, 0x8, 0xE, and 0xF sub-dispatch.
        let mut cpu = processor_with(&[0x50, 0x11, 0x80, 0x18, 0xE0, 0xFF, 0xF0, 0xFF]);
        cpu.registers.write(Register::V0, 0x42);

        run(&mut cpu, 4);
        assert_eq!(cpu.pc, PROGRAM_ADDR + 8);
        assert_eq!(cpu.registers.read(Register::V0), 0x42);
    }

    #[test]
    fn load_and_draw_scenario_flips_the_expected_pixels() {
        // V2 = 5, V3 = 3, I = glyph 0, draw 5 rows at (5, 3).
        let mut cpu = processor_with(&[0x62, 0x05, 0x63, 0x03, 0xA0, 0x50, 0xD2, 0x35]);

        run(&mut cpu, 4);
        assert!(cpu.display.draw_flag());
        assert_eq!(cpu.registers.read(Register::VF), 0);

        // Glyph 0 is 0xF0/0x90/0x90/0x90/0xF0: a hollow box 4 pixels wide.
        let pixels = cpu.display.pixels();
        let on = |x: usize, y: usize| pixels[y * DISPLAY_WIDTH + x].is_on();
        for x in 5..9 {
            assert!(on(x, 3));
            assert!(on(x, 7));
        }
        for y in 4..7 {
            assert!(on(5, y));
            assert!(!on(6, y));
            assert!(!on(7, y));
            assert!(on(8, y));
        }
        assert!(!on(9, 3));
        assert!(!on(4, 3));
    }
}
