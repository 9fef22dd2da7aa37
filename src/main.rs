//! CP-1600 Emulator - CLI Entry Point
//!
//! Commands:
//! - `cp1600-emu run <rom>` - Run a ROM until it halts
//! - `cp1600-emu debug <rom>` - Interactive debugger
//! - `cp1600-emu disasm <rom>` - Disassemble a ROM
//! - `cp1600-emu dump <rom>` - Hex dump of memory after loading
//! - `cp1600-emu test` - Built-in self-test

use clap::{Args, Parser, Subcommand};
use cp1600::asm::disasm::{self, format_instruction};
use cp1600::asm::format::{self, RegisterFormat, StateReport};
use cp1600::machine::DEFAULT_RUN_BUDGET;
use cp1600::{Decoder, Machine, MachineConfig, StopReason, TraceEvent, Word};

#[derive(Parser)]
#[command(name = "cp1600-emu")]
#[command(version = "0.1.0")]
#[command(about = "An instruction-level emulator of the General Instrument CP-1600")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options shared by every command that loads a ROM.
#[derive(Args)]
struct LoadArgs {
    /// Path to a raw little-endian ROM image
    rom: String,
    /// Load address, e.g. 0x5000 or $5000 (default: 0x5000)
    #[arg(short, long, value_parser = parse_word)]
    load_address: Option<Word>,
    /// JSON machine configuration; flags override it
    #[arg(short, long)]
    config: Option<String>,
    /// Decode unknown words as NOP instead of stopping
    #[arg(long)]
    lenient: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a ROM until it halts
    Run {
        #[command(flatten)]
        load: LoadArgs,
        /// Maximum number of instructions to execute
        #[arg(short, long, default_value_t = DEFAULT_RUN_BUDGET)]
        max_instructions: u64,
        /// Print every executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
        /// Register display format: hex, dec or both
        #[arg(short, long, default_value = "hex")]
        format: RegisterFormat,
    },
    /// Interactive debugger
    Debug {
        #[command(flatten)]
        load: LoadArgs,
    },
    /// Disassemble a ROM
    Disasm {
        #[command(flatten)]
        load: LoadArgs,
    },
    /// Hex dump of memory after loading a ROM
    Dump {
        #[command(flatten)]
        load: LoadArgs,
        /// First address to dump (default: the load address)
        #[arg(short, long, value_parser = parse_word)]
        address: Option<Word>,
        /// Number of words to dump
        #[arg(short = 'n', long, default_value_t = 64)]
        length: usize,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { load, max_instructions, trace, json, format }) => {
            run_rom(&load, max_instructions, trace, json, format);
        }
        Some(Commands::Debug { load }) => {
            debug_rom(&load);
        }
        Some(Commands::Disasm { load }) => {
            disassemble_rom(&load);
        }
        Some(Commands::Dump { load, address, length }) => {
            dump_rom(&load, address, length);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("CP-1600 Emulator v0.1.0");
            println!("General Instrument CP-1600 (Intellivision) instruction-level emulator");
            println!();
            println!("Use --help for available commands");
            println!();
            demo_program();
        }
    }
}

/// Accepts `0x5000`, `$5000` or decimal.
fn parse_word(s: &str) -> Result<Word, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix('$')) {
        Word::from_str_radix(hex, 16)
    } else {
        s.parse::<Word>()
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

fn machine_config(load: &LoadArgs) -> MachineConfig {
    let mut config = match &load.config {
        Some(path) => match MachineConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to read config: {}", e);
                std::process::exit(1);
            }
        },
        None => MachineConfig::default(),
    };

    if let Some(address) = load.load_address {
        config.load_address = address;
    }
    if load.lenient {
        config.decoder.strict = false;
    }
    config
}

/// Build a machine and load the ROM, exiting on failure.
fn load_machine(load: &LoadArgs) -> (Machine, usize) {
    let rom = match cp1600::load_rom(&load.rom) {
        Ok(rom) => rom,
        Err(e) => {
            eprintln!("❌ Failed to load ROM: {}", e);
            std::process::exit(1);
        }
    };

    if rom.is_empty() {
        eprintln!("❌ ROM is empty");
        std::process::exit(1);
    }

    let mut machine = match Machine::new(machine_config(load)) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("❌ Failed to create machine: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = machine.load_rom(&rom) {
        eprintln!("❌ Failed to load ROM: {}", e);
        std::process::exit(1);
    }

    (machine, rom.len())
}

fn run_rom(load: &LoadArgs, max_instructions: u64, trace: bool, json: bool, format: RegisterFormat) {
    let (mut machine, words) = load_machine(load);

    if !json {
        println!("🔧 Running: {}", load.rom);
        println!("📂 Loaded {} words at ${:04X}", words, machine.entry_point());
        println!();
        println!("━━━ Execution ━━━");
    }

    let result = if trace {
        let mut sink = |event: &TraceEvent<'_>| {
            println!(
                "${:04X}: {:<20} {} R0={:04X} R1={:04X} R2={:04X} R3={:04X} SP={:04X} +{}",
                event.pc_before,
                format_instruction(event.instruction),
                event.state.flags,
                event.state.registers[0],
                event.state.registers[1],
                event.state.registers[2],
                event.state.registers[3],
                event.state.registers[6],
                event.cycles
            );
        };
        machine.run_traced(max_instructions, &mut sink)
    } else {
        machine.run(max_instructions)
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("❌ CPU error at ${:04X}: {}", machine.cpu().pc(), e);
            std::process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialise report: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Instructions: {}", report.executed);
    println!("Stopped at:   ${:04X}", report.stopped_at);
    println!("{}", StateReport::new(&report.state, format));

    if report.reason == StopReason::BudgetExhausted {
        println!();
        println!(
            "⚠️  Reached instruction limit ({}). Use --max-instructions to increase.",
            max_instructions
        );
    }
}

#[cfg(feature = "tui")]
fn debug_rom(load: &LoadArgs) {
    use cp1600::tui::run_debugger;

    println!("🔍 Loading: {}", load.rom);
    let (machine, words) = load_machine(load);
    println!("📂 Loaded {} words", words);
    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(machine) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_rom(_load: &LoadArgs) {
    eprintln!("❌ Built without the `tui` feature; the debugger is unavailable");
    std::process::exit(1);
}

fn disassemble_rom(load: &LoadArgs) {
    let (machine, words) = load_machine(load);

    println!("📖 Disassembling: {}", load.rom);
    println!();

    let start = machine.entry_point();
    let end = start as usize + words;
    let decoder = Decoder::with_options(machine.config().decoder);
    let lines: Vec<_> = disasm::disassemble(machine.memory(), &decoder, start, words)
        .into_iter()
        .take_while(|line| (line.address as usize) >= start as usize && (line.address as usize) < end)
        .collect();

    println!("{}", disasm::listing(&lines));
}

fn dump_rom(load: &LoadArgs, address: Option<Word>, length: usize) {
    let (machine, _) = load_machine(load);
    let start = address.unwrap_or_else(|| machine.entry_point());

    match machine.memory().dump(start, length) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("❌ Failed to dump memory: {}", e);
            std::process::exit(1);
        }
    }
}

/// MVI #42,R0 / MVI #100,R1 / ADDR R1,R0 / MOVR R0,R2 / HLT
const DEMO_PROGRAM: [Word; 7] = [0x02B8, 42, 0x02B9, 100, 0x00C8, 0x0082, 0x0000];

fn demo_program() {
    println!("━━━ Demo: 42 + 100 ━━━");
    println!();

    let mut machine = match Machine::new(MachineConfig::default()) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = machine.load_rom_words(&DEMO_PROGRAM, Some("demo".into())) {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    if let Ok(lines) = machine.disassemble(machine.entry_point(), 5) {
        for line in &lines {
            println!("  {}", line);
        }
    }
    println!();

    match machine.run(DEFAULT_RUN_BUDGET) {
        Ok(report) => {
            println!("{}", StateReport::new(&report.state, RegisterFormat::Both));
            println!();
            println!("✓ Core emulation working!");
        }
        Err(e) => {
            eprintln!("❌ CPU error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_self_test() {
    use cp1600::bits::{to_i16, to_u16};
    use cp1600::cpu::Flags;

    println!("━━━ CP-1600 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let mut check = |name: &str, ok: bool, detail: String| {
        print!("{}... ", name);
        if ok {
            println!("✓");
            passed += 1;
        } else {
            println!("✗ {}", detail);
            failed += 1;
        }
    };

    // Test 1: Word coercion
    let ok = [-1i64, 0, 1, 0x7FFF, -0x8000]
        .iter()
        .all(|&v| to_i16(to_u16(v) as i64) as i64 == v);
    check("Signed word round trip", ok, String::new());

    // Test 2: Status word packing
    let flags = Flags { s: true, z: false, ov: true, c: false };
    let ok = Flags::from_status_word(flags.to_status_word()) == flags;
    check("Status word round trip", ok, String::new());

    // Test 3: Decoding
    let mut machine = match Machine::new(MachineConfig::default()) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    let loaded = machine.load_rom_words(&DEMO_PROGRAM, None).is_ok();
    let text = machine
        .disassemble(0x5000, 1)
        .ok()
        .and_then(|lines| lines.first().map(|l| l.text.clone()))
        .unwrap_or_default();
    check("Decode MVI #42,R0", loaded && text == "MVI #$002A, R0", format!("(got '{}')", text));

    // Test 4: End-to-end program
    let report = machine.run(DEFAULT_RUN_BUDGET);
    let ok = matches!(&report, Ok(r) if r.state.halted
        && r.state.registers[0] == 142
        && r.state.registers[1] == 100
        && r.state.registers[2] == 142);
    check("42 + 100 program", ok, format!("({:?})", report.map(|r| r.state.registers)));

    // Test 5: Cycle accounting
    let cycles = machine.cpu().cycles();
    check("Cycle count 32", cycles == 32, format!("(got {})", cycles));

    // Test 6: Flags after the add
    let summary = format::flag_summary(machine.cpu().flags());
    check("Flags clear after 42 + 100", summary == "S=0 Z=0 C=0 OV=0", format!("(got {})", summary));

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
