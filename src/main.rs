use std::path::PathBuf;

use clap::Parser;

use retro_chip8::emulator::{DEFAULT_CLOCK_RATE, DEFAULT_FRAME_RATE, Emulator, Settings};

const ROM_EXTENSION: &str = "ch8";

/// A CHIP-8 virtual console with a terminal frontend.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the ROM image to run.
    rom: PathBuf,

    /// Instructions executed per second.
    #[arg(long, default_value_t = DEFAULT_CLOCK_RATE)]
    clock_rate: u32,

    /// Frames (and timer ticks) per second.
    #[arg(long, default_value_t = DEFAULT_FRAME_RATE)]
    frame_rate: u32,

    /// Log verbosity: error, warn, info, debug, or trace.
    #[arg(long, default_value_t = log::LevelFilter::Warn)]
    log_level: log::LevelFilter,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    simple_logger::SimpleLogger::new()
        .with_level(args.log_level)
        .init()?;

    if args.frame_rate == 0 || args.clock_rate < args.frame_rate {
        anyhow::bail!(
            "clock rate ({}) must be at least the frame rate ({}), and the frame rate nonzero",
            args.clock_rate,
            args.frame_rate
        );
    }
    if args.rom.extension().is_none_or(|ext| ext != ROM_EXTENSION) {
        log::warn!(
            "{} does not carry the conventional .{ROM_EXTENSION} extension",
            args.rom.display()
        );
    }

    let emulator = Emulator::new(Settings {
        rom: args.rom,
        clock_rate: args.clock_rate,
        frame_rate: args.frame_rate,
    });
    emulator.run()
}
