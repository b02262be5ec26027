use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use bitvec::{BitArr, array::BitArray};

use crate::error::EmulatorError;
use crate::memory::Memory;

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;
pub const PIXEL_COUNT: usize = DISPLAY_WIDTH * DISPLAY_HEIGHT;

const CHANNEL_ON: u8 = 0xFF;
const CHANNEL_OFF: u8 = 0x00;

/// One RGBA quad of the exported frame. The screen is monochrome, so the
/// three color channels always carry the same value and alpha stays opaque.
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    pub const ON: Pixel = Pixel {
        r: CHANNEL_ON,
        g: CHANNEL_ON,
        b: CHANNEL_ON,
        a: 0xFF,
    };
    pub const OFF: Pixel = Pixel {
        r: CHANNEL_OFF,
        g: CHANNEL_OFF,
        b: CHANNEL_OFF,
        a: 0xFF,
    };

    pub fn is_on(self) -> bool {
        self.r == CHANNEL_ON
    }
}

type PixelBits = BitArr!(for PIXEL_COUNT);

/// The 64x32 monochrome frame buffer plus the dirty bit that tells the
/// presentation loop a new frame is ready.
///
/// The emulation thread is the only writer of the pixel grid; the
/// presentation thread only reads, so a `RwLock` around the bit array and a
/// relaxed atomic for the flag cover the whole cross-thread contract.
pub struct Display {
    pixels: RwLock<PixelBits>,
    draw_flag: AtomicBool,
}

impl Display {
    pub fn new() -> Self {
        Display {
            pixels: RwLock::new(BitArray::ZERO),
            draw_flag: AtomicBool::new(false),
        }
    }

    /// Turns every pixel off and marks the buffer dirty.
    pub fn clear(&self) {
        self.pixels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fill(false);
        self.set_draw_flag(true);
    }

    /// Draws an 8-pixel-wide, `height`-row sprite read from `memory` at
    /// `sprite_addr`, XOR-compositing it at (`x`, `y`). Coordinates wrap
    /// modulo the screen size rather than clipping. Returns true if any
    /// pixel flipped from on to off, and always marks the buffer dirty.
    pub fn draw_sprite(
        &self,
        x: u8,
        y: u8,
        height: u8,
        sprite_addr: u16,
        memory: &Memory,
    ) -> Result<bool, EmulatorError> {
        let mut collision = false;
        let mut pixels = self.pixels.write().unwrap_or_else(PoisonError::into_inner);

        for row in 0..height {
            let sprite_byte = memory.read(sprite_addr.wrapping_add(u16::from(row)))?;

            for bit in 0..8usize {
                if (sprite_byte >> (7 - bit)) & 1 == 0 {
                    continue;
                }

                let pixel_x = (x as usize + bit) % DISPLAY_WIDTH;
                let pixel_y = (y as usize + row as usize) % DISPLAY_HEIGHT;
                let index = pixel_y * DISPLAY_WIDTH + pixel_x;

                let current_pixel = pixels[index];
                if current_pixel {
                    collision = true; // This flip turns the pixel off.
                }
                pixels.set(index, !current_pixel);
            }
        }

        drop(pixels);
        self.set_draw_flag(true);

        Ok(collision)
    }

    pub fn draw_flag(&self) -> bool {
        self.draw_flag.load(Ordering::Relaxed)
    }

    pub fn set_draw_flag(&self, value: bool) {
        self.draw_flag.store(value, Ordering::Relaxed);
    }

    /// Snapshots the frame as row-major RGBA quads. This is the presentation
    /// boundary; uploading the quads to a texture or terminal is the
    /// caller's business.
    pub fn pixels(&self) -> [Pixel; PIXEL_COUNT] {
        let bits = self.pixels.read().unwrap_or_else(PoisonError::into_inner);

        let mut frame = [Pixel::OFF; PIXEL_COUNT];
        for index in bits.iter_ones() {
            frame[index] = Pixel::ON;
        }
        frame
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}
