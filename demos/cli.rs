//! Headless CLI driver: load an iNES ROM, run a fixed number of processor
//! cycles with no picture-generator collaborator wired up, and print a
//! summary of the final register file.
//!
//! This binary exists to exercise the crate end to end without pulling in
//! a windowing/rasterization layer (explicitly out of scope, §1). It is not
//! itself part of the core; it only wires `Cartridge` -> `Bus` -> `Cpu`
//! together and drives `tick()` in a loop.

use clap::Parser;
use sixfiveoh::bus::Bus;
use sixfiveoh::cartridge::Cartridge;
use sixfiveoh::cpu::Cpu;
use sixfiveoh::picture_generator::NullPictureGenerator;
use sixfiveoh::trace::{TraceEvent, TraceSink};

#[derive(Parser, Debug)]
#[command(name = "sixfiveoh-cli", about = "Headless 6502 core driver")]
struct Args {
    /// Path to an iNES (.nes) ROM image.
    rom: String,

    /// Number of bus cycles to run after reset.
    #[arg(long, default_value_t = 1_000_000)]
    cycles: u64,

    /// Log a record to stderr before each Fetch phase.
    #[arg(long, default_value_t = false)]
    trace: bool,
}

struct LoggingTraceSink;

impl TraceSink for LoggingTraceSink {
    fn on_fetch(&mut self, event: TraceEvent) {
        log::trace!(
            "cycle={} pc={:04X} op={:02X} ({:?} {:?}) a={:02X} x={:02X} y={:02X} sp={:02X} p={:02X}",
            event.cycle,
            event.pc,
            event.opcode,
            event.operation,
            event.mode,
            event.a,
            event.x,
            event.y,
            event.sp,
            event.status
        );
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let cartridge = match Cartridge::from_ines_file(&args.rom) {
        Ok(cartridge) => cartridge,
        Err(err) => {
            eprintln!("failed to load {}: {}", args.rom, err);
            std::process::exit(1);
        }
    };

    log::info!(
        "loaded {}: mapper {}, mirroring {:?}, prg {} bytes, chr {} bytes",
        args.rom,
        cartridge.mapper_id(),
        cartridge.mirroring(),
        cartridge.prg_rom_len(),
        cartridge.chr_len()
    );

    let mut bus = Bus::new(cartridge);
    let mut pg = NullPictureGenerator;
    let mut cpu = if args.trace {
        Cpu::with_trace(Box::new(LoggingTraceSink))
    } else {
        Cpu::new()
    };

    cpu.reset(&mut bus, &mut pg);
    for _ in 0..args.cycles {
        cpu.tick(&mut bus, &mut pg);
    }

    println!(
        "after {} cycles: pc={:04X} a={:02X} x={:02X} y={:02X} sp={:02X} p={:02X}",
        cpu.cycle_count(),
        cpu.regs.pc,
        cpu.regs.a,
        cpu.regs.x,
        cpu.regs.y,
        cpu.regs.sp,
        cpu.regs.status
    );
}
