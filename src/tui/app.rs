//! Debugger application state and logic.

use crate::asm::disasm::format_instruction;
use crate::bits::Word;
use crate::machine::Machine;
use std::collections::HashSet;

/// Instructions executed per UI frame while running.
const STEPS_PER_TICK: usize = 1000;

/// Words per memory view row.
pub const MEMORY_ROW_WORDS: Word = 8;

/// Debugger application state.
pub struct DebuggerApp {
    /// The machine being debugged.
    pub machine: Machine,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<Word>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// First address shown in the memory view.
    pub mem_base: Word,
    /// Lets a run resume from the breakpoint it stopped on.
    skip_breakpoint: bool,
}

impl DebuggerApp {
    /// Create a debugger around a machine with a ROM loaded.
    pub fn new(machine: Machine) -> Self {
        let mem_base = machine.entry_point();
        Self {
            machine,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            mem_base,
            skip_breakpoint: false,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if self.machine.is_halted() {
            self.status = format!("CPU halted at ${:04X}", self.machine.cpu().pc());
            self.running = false;
            return;
        }

        let pc = self.machine.cpu().pc();
        match self.machine.step() {
            Ok(instr) => {
                self.status = format!("${:04X}: {}", pc, format_instruction(&instr));
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.skip_breakpoint = true;
        self.status = "Running...".into();
    }

    /// Run one batch of continuous execution.
    pub fn tick(&mut self) {
        for _ in 0..STEPS_PER_TICK {
            if !self.running {
                return;
            }

            if self.machine.is_halted() {
                self.running = false;
                self.status = format!(
                    "Halted after {} instructions, {} cycles",
                    self.machine.instructions_executed(),
                    self.machine.cpu().cycles()
                );
                return;
            }

            let pc = self.machine.cpu().pc();
            if self.breakpoints.contains(&pc) && !self.skip_breakpoint {
                self.running = false;
                self.status = format!("Breakpoint at ${:04X}", pc);
                return;
            }
            self.skip_breakpoint = false;

            self.step();
        }
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.machine.cpu().pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at ${:04X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at ${:04X}", pc);
        }
    }

    /// Reset the CPU to the ROM's entry point. Memory is kept.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    pub fn scroll_memory(&mut self, rows: i32) {
        let delta = (rows * MEMORY_ROW_WORDS as i32) as i16;
        self.mem_base = self.mem_base.wrapping_add_signed(delta);
    }

    /// Point the memory view at PC.
    pub fn follow_pc(&mut self) {
        let pc = self.machine.cpu().pc();
        self.mem_base = pc - pc % MEMORY_ROW_WORDS;
    }

    /// Disassembly from PC onwards: `(address, text, is_current)`.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(Word, String, bool)> {
        let pc = self.machine.cpu().pc();
        self.machine
            .disassemble(pc, lines.clamp(1, 100))
            .unwrap_or_default()
            .into_iter()
            .map(|line| (line.address, line.text, line.address == pc))
            .collect()
    }
}

/// Run the debugger on a loaded machine.
pub fn run_debugger(machine: Machine) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(machine);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Char('g') => app.follow_pc(),
                        KeyCode::Up => app.scroll_memory(-1),
                        KeyCode::Down => app.scroll_memory(1),
                        KeyCode::PageUp => app.scroll_memory(-16),
                        KeyCode::PageDown => app.scroll_memory(16),
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
