use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::Alignment,
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
};
use rodio::{OutputStream, Sink, Source, source::SineWave};

use crate::controller::{Controller, Key, NUM_KEYS};
use crate::display::{DISPLAY_HEIGHT, DISPLAY_WIDTH, Display, PIXEL_COUNT, Pixel};
use crate::memory::Memory;
use crate::processor::Processor;

pub const DEFAULT_CLOCK_RATE: u32 = 600;
pub const DEFAULT_FRAME_RATE: u32 = 60;

const BEEP_FREQUENCY: f32 = 440.0;
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Terminals report key repeats rather than releases, so a pad key stays
/// held for this window after its last press event and then auto-releases.
const KEY_HOLD_WINDOW: Duration = Duration::from_millis(150);

/// Session configuration assembled by the CLI.
#[derive(Clone, Debug)]
pub struct Settings {
    pub rom: PathBuf,
    /// Instructions executed per second.
    pub clock_rate: u32,
    /// Frames (and timer ticks) per second.
    pub frame_rate: u32,
}

impl Settings {
    pub fn new(rom: PathBuf) -> Self {
        Settings {
            rom,
            clock_rate: DEFAULT_CLOCK_RATE,
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

pub struct Beep {
    sink: Sink,
    #[allow(dead_code)]
    stream: OutputStream,
}

impl Beep {
    pub fn new(freq: f32) -> anyhow::Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&stream_handle)?;
        let source = SineWave::new(freq).repeat_infinite();

        sink.append(source);
        sink.pause();

        Ok(Self { sink, stream })
    }

    pub fn on(&mut self) {
        self.sink.play();
    }

    pub fn off(&mut self) {
        self.sink.pause();
    }
}

/// One emulation session: processor plus the display and controller shared
/// with the presentation and input loops.
///
/// `run()` drives three loops under a thread scope. The emulation thread
/// paces instruction execution and the timers, the input thread feeds the
/// controller from terminal events, and the calling thread presents frames
/// whenever the display reports a dirty buffer. A shared stop flag, raised
/// on Escape or on any fatal error, winds all three down together.
pub struct Emulator {
    settings: Settings,
    display: Arc<Display>,
    controller: Arc<Controller>,
}

impl Emulator {
    pub fn new(settings: Settings) -> Self {
        Emulator {
            settings,
            display: Arc::new(Display::new()),
            controller: Arc::new(Controller::new()),
        }
    }

    pub fn run(&self) -> anyhow::Result<()> {
        let rom_data = std::fs::read(&self.settings.rom)?;
        let mut memory = Memory::new();
        memory.load_program(&rom_data)?;

        let processor = Processor::new(
            memory,
            Arc::clone(&self.display),
            Arc::clone(&self.controller),
        );

        enable_raw_mode()?;
        let backend = CrosstermBackend::new(std::io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let stop = AtomicBool::new(false);
        let result = std::thread::scope(|scope| {
            scope.spawn(|| self.emulation_loop(processor, &stop));
            scope.spawn(|| self.input_loop(&stop));

            let result = self.presentation_loop(&mut terminal, &stop);
            stop.store(true, Ordering::Relaxed);
            result
        });

        terminal.clear()?;
        disable_raw_mode()?;

        result
    }

    /// Executes `clock_rate / frame_rate` instructions per frame, counts the
    /// timers down once, and drives the beeper off the sound timer. A failed
    /// tick is fatal to the whole session.
    fn emulation_loop(&self, mut processor: Processor, stop: &AtomicBool) {
        let frame_duration = Duration::from_secs_f64(1.0 / f64::from(self.settings.frame_rate));
        let ticks_per_frame = (self.settings.clock_rate / self.settings.frame_rate).max(1);

        // The audio device belongs to this thread; a machine without one
        // still gets a playable, silent session.
        let mut beeper = match Beep::new(BEEP_FREQUENCY) {
            Ok(beeper) => Some(beeper),
            Err(e) => {
                log::warn!("audio unavailable, running silent: {e}");
                None
            }
        };

        while !stop.load(Ordering::Relaxed) {
            let frame_start = Instant::now();

            for _ in 0..ticks_per_frame {
                if let Err(e) = processor.tick() {
                    log::error!("execution halted: {e}");
                    stop.store(true, Ordering::Relaxed);
                    return;
                }
            }
            processor.tick_timers();

            if let Some(beeper) = beeper.as_mut() {
                if processor.sound_active() {
                    beeper.on();
                } else {
                    beeper.off();
                }
            }

            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
    }

    /// Feeds the controller from terminal key events. Escape raises the stop
    /// flag; everything else goes through the conventional QWERTY mapping.
    fn input_loop(&self, stop: &AtomicBool) {
        let mut hold_deadlines: [Option<Instant>; NUM_KEYS] = [None; NUM_KEYS];

        while !stop.load(Ordering::Relaxed) {
            let now = Instant::now();
            for (index, deadline) in hold_deadlines.iter_mut().enumerate() {
                if deadline.is_some_and(|d| d <= now) {
                    self.controller
                        .set_key_status(Key::from_nibble(index as u8), false);
                    *deadline = None;
                }
            }

            let ready = match event::poll(INPUT_POLL_INTERVAL) {
                Ok(ready) => ready,
                Err(e) => {
                    log::error!("input polling failed: {e}");
                    stop.store(true, Ordering::Relaxed);
                    return;
                }
            };
            if !ready {
                continue;
            }

            let Ok(Event::Key(key_event)) = event::read() else {
                continue;
            };

            if key_event.code == KeyCode::Esc {
                stop.store(true, Ordering::Relaxed);
                return;
            }

            let KeyCode::Char(c) = key_event.code else {
                continue;
            };
            let Some(key) = map_key(c) else {
                continue;
            };

            match key_event.kind {
                KeyEventKind::Press | KeyEventKind::Repeat => {
                    self.controller.set_key_status(key, true);
                    hold_deadlines[key.index() as usize] = Some(Instant::now() + KEY_HOLD_WINDOW);
                }
                // Terminals speaking an enhanced keyboard protocol do report
                // releases; honor them instead of waiting out the window.
                KeyEventKind::Release => {
                    self.controller.set_key_status(key, false);
                    hold_deadlines[key.index() as usize] = None;
                }
            }
        }
    }

    /// Presents a frame whenever the display reports a dirty buffer, pacing
    /// itself at the frame rate.
    fn presentation_loop(
        &self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
        stop: &AtomicBool,
    ) -> anyhow::Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / f64::from(self.settings.frame_rate));
        let rom_stem: String = self
            .settings
            .rom
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown ROM".to_string());

        while !stop.load(Ordering::Relaxed) {
            let frame_start = Instant::now();

            if self.display.draw_flag() {
                self.display.set_draw_flag(false);
                let pixels = self.display.pixels();
                terminal.draw(|frame| draw(frame, &pixels, &rom_stem))?;
            }

            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
        Ok(())
    }
}

/// The conventional QWERTY layout for the 4x4 hex pad.
fn map_key(c: char) -> Option<Key> {
    match c.to_ascii_lowercase() {
        '1' => Some(Key::Key1),
        '2' => Some(Key::Key2),
        '3' => Some(Key::Key3),
        '4' => Some(Key::KeyC),
        'q' => Some(Key::Key4),
        'w' => Some(Key::Key5),
        'e' => Some(Key::Key6),
        'r' => Some(Key::KeyD),
        'a' => Some(Key::Key7),
        's' => Some(Key::Key8),
        'd' => Some(Key::Key9),
        'f' => Some(Key::KeyE),
        'z' => Some(Key::KeyA),
        'x' => Some(Key::Key0),
        'c' => Some(Key::KeyB),
        'v' => Some(Key::KeyF),
        _ => None,
    }
}

fn draw(frame: &mut ratatui::Frame, pixels: &[Pixel; PIXEL_COUNT], rom_name: &str) {
    use ratatui::layout::{Constraint, Direction, Layout};

    // Exact size for the 64x32 screen plus its borders.
    let game_width = (DISPLAY_WIDTH as u16) + 2;
    let game_height = (DISPLAY_HEIGHT as u16) + 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(game_height),
            Constraint::Length(7), // Key mapping area
            Constraint::Min(0),
        ])
        .split(frame.area());

    // Center the screen horizontally if the terminal is wider than needed.
    let game_area = if chunks[0].width > game_width {
        let horizontal_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(game_width),
                Constraint::Min(0),
            ])
            .split(chunks[0]);
        horizontal_chunks[1]
    } else {
        chunks[0]
    };

    let mut row_string = String::with_capacity(PIXEL_COUNT + DISPLAY_HEIGHT);
    for row_idx in 0..DISPLAY_HEIGHT {
        for col_idx in 0..DISPLAY_WIDTH {
            let index = row_idx * DISPLAY_WIDTH + col_idx;
            row_string.push(if pixels[index].is_on() { '█' } else { ' ' });
        }
        row_string.push('\n');
    }
    let game_paragraph = Paragraph::new(row_string)
        .block(Block::default().borders(Borders::ALL).title(rom_name.to_string()))
        .style(Style::default().fg(Color::White));
    frame.render_widget(game_paragraph, game_area);

    let key_mapping = "Key Mapping:\n\
    1 2 3 4    →    1 2 3 C\n\
    Q W E R    →    4 5 6 D\n\
    A S D F    →    7 8 9 E\n\
    Z X C V    →    A 0 B F";
    let key_paragraph = Paragraph::new(key_mapping)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Keypad"))
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(key_paragraph, chunks[1]);
}
