//! Integration tests for the six concrete scenarios in spec §8, driving
//! the crate exactly as an external caller would: load an iNES image,
//! build a `Bus`, step a `Cpu` through `tick()`.

use sixfiveoh::bus::Bus;
use sixfiveoh::cartridge::Cartridge;
use sixfiveoh::cpu::{Cpu, CpuRegisters};
use sixfiveoh::picture_generator::NullPictureGenerator;

/// Build a minimal one-bank (16 KiB) NROM iNES image with `prg` copied to
/// the start of the bank and the reset/NMI/IRQ vectors all pointed at
/// `reset_vector` unless `vectors` overrides them.
fn build_rom(prg: &[u8], vectors: Option<(u16, u16, u16)>) -> Vec<u8> {
    let mut rom = vec![0u8; 16 + 16 * 1024];
    rom[0..4].copy_from_slice(b"NES\x1A");
    rom[4] = 1; // one 16 KiB PRG bank
    rom[5] = 1; // one 8 KiB CHR bank
    rom[6] = 0;
    rom[7] = 0;
    rom[8] = 1; // 8 KiB PRG RAM

    let prg_start = 16;
    rom[prg_start..prg_start + prg.len()].copy_from_slice(prg);

    let (reset, nmi, irq) = vectors.unwrap_or((0x8000, 0x8000, 0x8000));
    let vec_base = prg_start + 0x3FFA;
    rom[vec_base] = (nmi & 0xFF) as u8;
    rom[vec_base + 1] = (nmi >> 8) as u8;
    rom[vec_base + 2] = (reset & 0xFF) as u8;
    rom[vec_base + 3] = (reset >> 8) as u8;
    rom[vec_base + 4] = (irq & 0xFF) as u8;
    rom[vec_base + 5] = (irq >> 8) as u8;

    rom.extend(std::iter::repeat(0).take(8 * 1024)); // CHR payload

    rom
}

fn new_cpu_bus(prg: &[u8], vectors: Option<(u16, u16, u16)>) -> (Cpu, Bus, NullPictureGenerator) {
    let rom = build_rom(prg, vectors);
    let cart = Cartridge::from_ines_bytes(&rom).expect("valid synthetic ROM");
    let mut bus = Bus::new(cart);
    let mut pg = NullPictureGenerator;
    let mut cpu = Cpu::new();
    cpu.reset(&mut bus, &mut pg);
    (cpu, bus, pg)
}

fn run(cpu: &mut Cpu, bus: &mut Bus, pg: &mut NullPictureGenerator, cycles: u32) {
    for _ in 0..cycles {
        cpu.tick(bus, pg);
    }
}

/// Scenario 1: reset vector load. RAM image with $FFFC=$34, $FFFD=$12 ->
/// after reset, PC = $1234.
#[test]
fn scenario_1_reset_vector_load() {
    let (cpu, _bus, _pg) = new_cpu_bus(&[0xEA], Some((0x1234, 0x8000, 0x8000)));
    assert_eq!(cpu.regs.pc, 0x1234);
}

/// Scenario 2: LDA immediate then STA absolute. Program `A9 42 8D 00 02`
/// at $8000 -> after 6 cycles, A = $42, RAM[$0200] = $42, zero=0, sign=0.
#[test]
fn scenario_2_lda_immediate_sta_absolute() {
    let (mut cpu, mut bus, mut pg) = new_cpu_bus(&[0xA9, 0x42, 0x8D, 0x00, 0x02], None);
    run(&mut cpu, &mut bus, &mut pg, 6);
    assert_eq!(cpu.regs.a, 0x42);
    assert_eq!(bus.peek(0x0200), 0x42);
    assert!(!cpu.regs.flag(sixfiveoh::cpu::regs::FLAG_Z));
    assert!(!cpu.regs.flag(sixfiveoh::cpu::regs::FLAG_N));
}

/// Scenario 3: branch page-cross. PC at $80FD, opcode `F0 04` with zero=1
/// -> after 4 cycles, PC = $8103.
#[test]
fn scenario_3_branch_page_cross() {
    let mut prg = vec![0xEA; 0x200];
    prg[0xFD] = 0xF0; // BEQ
    prg[0xFD + 1] = 0x04;
    let (mut cpu, mut bus, mut pg) = new_cpu_bus(&prg, Some((0x80FD, 0x8000, 0x8000)));
    cpu.regs.set_flag(sixfiveoh::cpu::regs::FLAG_Z, true);
    assert_eq!(cpu.regs.pc, 0x80FD);
    run(&mut cpu, &mut bus, &mut pg, 4);
    assert_eq!(cpu.regs.pc, 0x8103);
}

/// Scenario 4: ADC overflow. A=$50, carry=0, operand=$50 -> A=$A0,
/// overflow=1, carry=0, sign=1, zero=0.
#[test]
fn scenario_4_adc_overflow() {
    // LDA #$50; ADC #$50
    let (mut cpu, mut bus, mut pg) = new_cpu_bus(&[0xA9, 0x50, 0x69, 0x50], None);
    run(&mut cpu, &mut bus, &mut pg, 2 + 2);
    assert_eq!(cpu.regs.a, 0xA0);
    assert!(cpu.regs.flag(sixfiveoh::cpu::regs::FLAG_V));
    assert!(!cpu.regs.flag(sixfiveoh::cpu::regs::FLAG_C));
    assert!(cpu.regs.flag(sixfiveoh::cpu::regs::FLAG_N));
    assert!(!cpu.regs.flag(sixfiveoh::cpu::regs::FLAG_Z));
}

/// Scenario 5: indirect-jump quirk. Pointer $02FF -> low byte from $02FF,
/// high byte from $0200 (not $0300).
#[test]
fn scenario_5_indirect_jump_page_wrap() {
    let mut prg = vec![0xEA; 0x100];
    prg[0] = 0x6C; // JMP (ind)
    prg[1] = 0xFF;
    prg[2] = 0x02;
    let (mut cpu, mut bus, mut pg) = new_cpu_bus(&prg, None);
    bus.poke(0x02FF, 0x34);
    bus.poke(0x0200, 0x12);
    bus.poke(0x0300, 0xFF); // decoy, must not be read
    run(&mut cpu, &mut bus, &mut pg, 5);
    assert_eq!(cpu.regs.pc, 0x1234);
}

/// Scenario 6: cycle count of JSR. 6 cycles from fetch through new PC.
#[test]
fn scenario_6_jsr_cycle_count() {
    let (mut cpu, mut bus, mut pg) = new_cpu_bus(&[0x20, 0x00, 0x90], None);
    run(&mut cpu, &mut bus, &mut pg, 6);
    assert_eq!(cpu.regs.pc, 0x9000);
}
