//! The micro-sequencer itself: `Cpu::tick()` and the phase handlers it
//! dispatches to (§4.2). One `tick()` call advances exactly one bus cycle.
//!
//! `Cpu` does not own a bus or a picture generator: per the design note in
//! §9 ("give the mapper a borrow of the coprocessor for the lifetime of a
//! tick... rather than persistent ownership"), both are borrowed as
//! parameters to `tick()` itself. This sidesteps the cyclic-ownership
//! problem the original source has between its memory map and its PPU.

use crate::picture_generator::PictureGenerator;
use crate::trace::{TraceEvent, TraceSink};

use super::alu;
use super::decode::{decode, AddressingMode, BranchCondition, Operation};
use super::phase::Phase;
use super::regs::{CpuRegisters, FLAG_C, FLAG_D, FLAG_I, FLAG_N, FLAG_V, FLAG_Z};
use super::state::CpuState;

/// What the micro-sequencer needs from the bus mapper: one byte in, one
/// byte out, plus a way to notice an OAM-DMA trigger. Every call also
/// receives the picture generator so the bus can forward $2000-$3FFF and
/// $4014 traffic to it without holding a reference to it itself.
pub trait CpuBus {
    fn read(&mut self, addr: u16, pg: &mut dyn PictureGenerator) -> u8;
    fn write(&mut self, addr: u16, value: u8, pg: &mut dyn PictureGenerator);

    /// One-shot: returns `Some(page)` the first time this is polled after a
    /// write to the DMA-trigger register ($4014), then `None` until the
    /// next trigger. `page` is the value written (source address is
    /// `page << 8`).
    fn take_dma_request(&mut self) -> Option<u8>;
}

/// The processor core: register file plus micro-sequencer working state.
pub struct Cpu {
    pub regs: CpuState,
    phase: Phase,
    op: Operation,
    mode: AddressingMode,

    /// Effective address under construction / in use.
    ea: u16,
    /// Scratch low byte: zero-page base, absolute low byte, pointer low
    /// byte, or a popped stack byte depending on which phase chain is
    /// running.
    base: u8,
    /// Scratch 16-bit register: a zero-page pointer address being
    /// dereferenced, or a corrected effective address awaiting a fixup
    /// cycle.
    ptr: u16,
    /// Data latch: a byte read from memory, or a byte about to be written.
    data: u8,
    /// Whether the branch or indexed-addressing fixup cycle currently in
    /// flight is actually needed.
    fixup_needed: bool,

    nmi_pending: bool,
    irq_line: bool,

    dma_counter: u16,
    dma_src: u16,
    dma_offset: u8,
    dma_latch: u8,
    dma_write_pending: bool,

    cycle: u64,
    trace: Option<Box<dyn TraceSink>>,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            regs: CpuState::power_on(),
            phase: Phase::Fetch,
            op: Operation::Nop,
            mode: AddressingMode::Implied,
            ea: 0,
            base: 0,
            ptr: 0,
            data: 0,
            fixup_needed: false,
            nmi_pending: false,
            irq_line: false,
            dma_counter: 0,
            dma_src: 0,
            dma_offset: 0,
            dma_latch: 0,
            dma_write_pending: false,
            cycle: 0,
            trace: None,
        }
    }

    pub fn with_trace(trace: Box<dyn TraceSink>) -> Self {
        let mut cpu = Self::new();
        cpu.trace = Some(trace);
        cpu
    }

    pub fn set_trace(&mut self, trace: Option<Box<dyn TraceSink>>) {
        self.trace = trace;
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Power-on/reset sequence (§3, §9). Not itself cycle-stepped through
    /// `tick()`: the spec only requires the end state (S -= 3,
    /// interrupt-disable set, PC loaded from the reset vector), and every
    /// other register persists unchanged, matching silicon.
    pub fn reset<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        self.regs.apply_reset();
        let lo = bus.read(0xFFFC, pg);
        let hi = bus.read(0xFFFD, pg);
        self.regs.pc = ((hi as u16) << 8) | (lo as u16);
        self.phase = Phase::Fetch;
        self.nmi_pending = false;
        self.dma_counter = 0;
    }

    /// Mark the edge-triggered NMI input active. Cleared automatically by
    /// the sequencer once it acknowledges the interrupt at a Fetch
    /// boundary.
    pub fn raise_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Set the level-sensitive IRQ input. The caller (the auxiliary
    /// register file's collaborator, out of scope here) is responsible for
    /// clearing it again once its own condition is serviced.
    pub fn set_irq(&mut self, level: bool) {
        self.irq_line = level;
    }

    /// Advance by exactly one bus cycle.
    pub fn tick<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        match self.phase {
            Phase::Fetch => self.phase_fetch(bus, pg),
            Phase::DmaAlign => self.phase_dma_align(bus, pg),
            Phase::DmaCopy => self.phase_dma_copy(bus, pg),
            Phase::Accumulator => self.phase_accumulator(bus, pg),
            Phase::Immediate => self.phase_immediate(bus, pg),
            Phase::Branch => self.phase_branch(bus, pg),
            Phase::ZeroBase => self.phase_zero_base(bus, pg),
            Phase::ZeroIndexRead => self.phase_zero_index_read(bus, pg),
            Phase::ZeroIndexed => self.phase_zero_indexed(bus, pg),
            Phase::AbsLow => self.phase_abs_low(bus, pg),
            Phase::AbsHigh => self.phase_abs_high(bus, pg),
            Phase::AbsIdxHigh => self.phase_abs_idx_high(bus, pg),
            Phase::AbsFixup => self.phase_abs_fixup(bus, pg),
            Phase::RmwRead => self.phase_rmw_read(bus, pg),
            Phase::RmwWrite => self.phase_rmw_write(bus, pg),
            Phase::IndexedPtr => self.phase_indexed_ptr(bus, pg),
            Phase::IndexedPtrAdd => self.phase_indexed_ptr_add(bus, pg),
            Phase::IndexedLow => self.phase_indexed_low(bus, pg),
            Phase::IndexedHigh => self.phase_indexed_high(bus, pg),
            Phase::IndIdxPtr => self.phase_indidx_ptr(bus, pg),
            Phase::IndIdxLow => self.phase_indidx_low(bus, pg),
            Phase::IndIdxHigh => self.phase_indidx_high(bus, pg),
            Phase::IndIdxFixup => self.phase_indidx_fixup(bus, pg),
            Phase::IndirectLow => self.phase_indirect_low(bus, pg),
            Phase::IndirectHigh => self.phase_indirect_high(bus, pg),
            Phase::IndirectReadLow => self.phase_indirect_read_low(bus, pg),
            Phase::IndirectReadHigh => self.phase_indirect_read_high(bus, pg),
            Phase::Read => self.phase_read(bus, pg),
            Phase::Exec1 => self.phase_exec(1, bus, pg),
            Phase::Exec2 => self.phase_exec(2, bus, pg),
            Phase::Exec3 => self.phase_exec(3, bus, pg),
            Phase::Exec4 => self.phase_exec(4, bus, pg),
            Phase::Exec5 => self.phase_exec(5, bus, pg),
            Phase::Exec6 => self.phase_exec(6, bus, pg),
        }
    }

    // ---- Fetch ---------------------------------------------------------

    fn phase_fetch<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        if self.nmi_pending {
            self.nmi_pending = false;
            self.op = Operation::Nmi;
            let _ = bus.read(self.regs.pc, pg);
            self.cycle += 1;
            self.phase = Phase::Exec1;
            return;
        }
        if self.irq_line && !self.regs.flag(FLAG_I) {
            self.op = Operation::Irq;
            let _ = bus.read(self.regs.pc, pg);
            self.cycle += 1;
            self.phase = Phase::Exec1;
            return;
        }
        if let Some(page) = bus.take_dma_request() {
            let align = self.cycle % 2 == 1;
            self.dma_src = (page as u16) << 8;
            self.dma_offset = 0;
            self.dma_write_pending = false;
            self.dma_counter = 512;
            let _ = bus.read(self.regs.pc, pg);
            self.cycle += 1;
            self.phase = if align { Phase::DmaAlign } else { Phase::DmaCopy };
            return;
        }

        let opcode = bus.read(self.regs.pc, pg);
        self.cycle += 1;

        let decoded = decode(opcode);
        let (op, mode) = decoded.unwrap_or_else(|| {
            log::warn!(
                "unknown opcode 0x{:02X} at 0x{:04X}, executing as NOP",
                opcode,
                self.regs.pc
            );
            (Operation::Nop, AddressingMode::Implied)
        });

        if let Some(sink) = self.trace.as_deref_mut() {
            sink.on_fetch(TraceEvent {
                pc: self.regs.pc,
                opcode,
                operation: op,
                mode,
                a: self.regs.a,
                x: self.regs.x,
                y: self.regs.y,
                sp: self.regs.sp,
                status: self.regs.status,
                cycle: self.cycle,
            });
        }
        self.regs.pc = self.regs.pc.wrapping_add(1);

        self.op = op;
        self.mode = mode;
        self.phase = match decoded {
            Some(_) => Self::initial_phase_for(op, mode),
            None => Phase::Accumulator,
        };
    }

    fn initial_phase_for(op: Operation, mode: AddressingMode) -> Phase {
        use Operation::*;
        if matches!(op, Pha | Php | Pla | Plp | Rts | Rti | Brk) {
            return Phase::Exec1;
        }
        match mode {
            AddressingMode::Implied | AddressingMode::Accumulator => Phase::Accumulator,
            AddressingMode::Immediate => Phase::Immediate,
            AddressingMode::Relative => Phase::Branch,
            AddressingMode::ZeroPage => Phase::ZeroBase,
            AddressingMode::ZeroPageX | AddressingMode::ZeroPageY => Phase::ZeroIndexRead,
            AddressingMode::Absolute | AddressingMode::AbsoluteX | AddressingMode::AbsoluteY => {
                Phase::AbsLow
            }
            AddressingMode::Indirect => Phase::IndirectLow,
            AddressingMode::IndexedIndirectX => Phase::IndexedPtr,
            AddressingMode::IndirectIndexedY => Phase::IndIdxPtr,
        }
    }

    fn next_after_ea(&self) -> Phase {
        if self.op.is_store() {
            Phase::Exec1
        } else if self.op.is_rmw() {
            Phase::RmwRead
        } else {
            Phase::Read
        }
    }

    fn index_value(&self) -> u8 {
        match self.mode {
            AddressingMode::ZeroPageX
            | AddressingMode::AbsoluteX
            | AddressingMode::IndexedIndirectX => self.regs.x,
            AddressingMode::ZeroPageY | AddressingMode::AbsoluteY => self.regs.y,
            _ => 0,
        }
    }

    // ---- DMA ------------------------------------------------------------

    fn phase_dma_align<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let _ = bus.read(self.regs.pc, pg);
        self.cycle += 1;
        self.phase = Phase::DmaCopy;
    }

    fn phase_dma_copy<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        if !self.dma_write_pending {
            let addr = self.dma_src.wrapping_add(self.dma_offset as u16);
            self.dma_latch = bus.read(addr, pg);
            self.dma_write_pending = true;
        } else {
            pg.dma_write(self.dma_latch);
            self.dma_offset = self.dma_offset.wrapping_add(1);
            self.dma_write_pending = false;
        }
        self.cycle += 1;
        self.dma_counter = self.dma_counter.saturating_sub(1);
        self.phase = if self.dma_counter == 0 {
            Phase::Fetch
        } else {
            Phase::DmaCopy
        };
    }

    // ---- Implied/accumulator single-cycle execute -----------------------

    fn phase_accumulator<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let _ = bus.read(self.regs.pc, pg);
        self.cycle += 1;
        use Operation::*;
        match self.op {
            AslAcc => {
                let a = self.regs.a;
                self.regs.a = alu::asl(&mut self.regs, a);
            }
            LsrAcc => {
                let a = self.regs.a;
                self.regs.a = alu::lsr(&mut self.regs, a);
            }
            RolAcc => {
                let a = self.regs.a;
                self.regs.a = alu::rol(&mut self.regs, a);
            }
            RorAcc => {
                let a = self.regs.a;
                self.regs.a = alu::ror(&mut self.regs, a);
            }
            Inx => {
                let v = alu::inc(&mut self.regs, self.regs.x);
                self.regs.x = v;
            }
            Iny => {
                let v = alu::inc(&mut self.regs, self.regs.y);
                self.regs.y = v;
            }
            Dex => {
                let v = alu::dec(&mut self.regs, self.regs.x);
                self.regs.x = v;
            }
            Dey => {
                let v = alu::dec(&mut self.regs, self.regs.y);
                self.regs.y = v;
            }
            Tax => {
                self.regs.x = self.regs.a;
                self.regs.update_zn(self.regs.x);
            }
            Tay => {
                self.regs.y = self.regs.a;
                self.regs.update_zn(self.regs.y);
            }
            Tsx => {
                self.regs.x = self.regs.sp;
                self.regs.update_zn(self.regs.x);
            }
            Txa => {
                self.regs.a = self.regs.x;
                self.regs.update_zn(self.regs.a);
            }
            Tya => {
                self.regs.a = self.regs.y;
                self.regs.update_zn(self.regs.a);
            }
            Txs => {
                // TXS does not touch flags (§4.2).
                self.regs.sp = self.regs.x;
            }
            Clc => self.regs.set_flag(FLAG_C, false),
            Sec => self.regs.set_flag(FLAG_C, true),
            Cli => self.regs.set_flag(FLAG_I, false),
            Sei => self.regs.set_flag(FLAG_I, true),
            Clv => self.regs.set_flag(FLAG_V, false),
            Cld => self.regs.set_flag(FLAG_D, false),
            Sed => self.regs.set_flag(FLAG_D, true),
            Nop => {}
            other => debug_assert!(false, "unexpected op {:?} in Accumulator phase", other),
        }
        self.phase = Phase::Fetch;
    }

    // ---- Reads: immediate and the shared Read phase ----------------------

    fn apply_read_op(&mut self, v: u8) {
        use Operation::*;
        match self.op {
            Adc => alu::adc(&mut self.regs, v),
            Sbc => alu::sbc(&mut self.regs, v),
            And => {
                let r = self.regs.a & v;
                self.regs.a = alu::logical_result(&mut self.regs, r);
            }
            Ora => {
                let r = self.regs.a | v;
                self.regs.a = alu::logical_result(&mut self.regs, r);
            }
            Eor => {
                let r = self.regs.a ^ v;
                self.regs.a = alu::logical_result(&mut self.regs, r);
            }
            Cmp => {
                let lhs = self.regs.a;
                alu::compare(&mut self.regs, lhs, v);
            }
            Cpx => {
                let lhs = self.regs.x;
                alu::compare(&mut self.regs, lhs, v);
            }
            Cpy => {
                let lhs = self.regs.y;
                alu::compare(&mut self.regs, lhs, v);
            }
            Bit => alu::bit_test(&mut self.regs, v),
            Lda => {
                self.regs.a = v;
                alu::load(&mut self.regs, v);
            }
            Ldx => {
                self.regs.x = v;
                alu::load(&mut self.regs, v);
            }
            Ldy => {
                self.regs.y = v;
                alu::load(&mut self.regs, v);
            }
            other => debug_assert!(false, "unexpected op {:?} in read phase", other),
        }
    }

    fn phase_immediate<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let v = bus.read(self.regs.pc, pg);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.cycle += 1;
        self.apply_read_op(v);
        self.phase = Phase::Fetch;
    }

    fn phase_read<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let v = bus.read(self.ea, pg);
        self.cycle += 1;
        self.apply_read_op(v);
        self.phase = Phase::Fetch;
    }

    // ---- Zero-page family -------------------------------------------------

    fn phase_zero_base<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let lo = bus.read(self.regs.pc, pg);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.cycle += 1;
        self.ea = lo as u16;
        self.phase = self.next_after_ea();
    }

    fn phase_zero_index_read<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let base = bus.read(self.regs.pc, pg);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.cycle += 1;
        self.base = base;
        self.phase = Phase::ZeroIndexed;
    }

    fn phase_zero_indexed<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let _ = bus.read(self.base as u16, pg);
        self.cycle += 1;
        let index = self.index_value();
        self.ea = self.base.wrapping_add(index) as u16;
        self.phase = self.next_after_ea();
    }

    // ---- Absolute family ----------------------------------------------

    fn phase_abs_low<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let lo = bus.read(self.regs.pc, pg);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.cycle += 1;
        self.base = lo;
        self.phase = if self.op == Operation::Jsr {
            Phase::Exec1
        } else if matches!(self.mode, AddressingMode::AbsoluteX | AddressingMode::AbsoluteY) {
            Phase::AbsIdxHigh
        } else {
            Phase::AbsHigh
        };
    }

    fn phase_abs_high<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let hi = bus.read(self.regs.pc, pg);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.cycle += 1;
        self.ea = ((hi as u16) << 8) | (self.base as u16);
        if self.op == Operation::JmpAbsolute {
            self.regs.pc = self.ea;
            self.phase = Phase::Fetch;
        } else {
            self.phase = self.next_after_ea();
        }
    }

    fn phase_abs_idx_high<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let hi = bus.read(self.regs.pc, pg);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.cycle += 1;
        let index = self.index_value();
        let (low_plus, overflow) = self.base.overflowing_add(index);
        // Preliminary (possibly wrong) address, used for the fixup's dummy read.
        self.ea = ((hi as u16) << 8) | (low_plus as u16);
        self.ptr = ((hi as u16) << 8)
            .wrapping_add(self.base as u16)
            .wrapping_add(index as u16);
        if overflow || self.op.always_pays_fixup() {
            self.fixup_needed = true;
            self.phase = Phase::AbsFixup;
        } else {
            self.ea = self.ptr;
            self.phase = self.next_after_ea();
        }
    }

    fn phase_abs_fixup<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let _ = bus.read(self.ea, pg);
        self.cycle += 1;
        self.ea = self.ptr;
        self.phase = self.next_after_ea();
    }

    // ---- Read-modify-write finalize (entered via Exec1, see phase_exec) ---

    fn phase_rmw_read<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        self.data = bus.read(self.ea, pg);
        self.cycle += 1;
        self.phase = Phase::RmwWrite;
    }

    fn phase_rmw_write<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        // Re-write the unmodified byte: the characteristic RMW dummy write.
        bus.write(self.ea, self.data, pg);
        self.cycle += 1;
        self.phase = Phase::Exec1;
    }

    // ---- Indexed-indirect ((zp,X)) --------------------------------------

    fn phase_indexed_ptr<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let base = bus.read(self.regs.pc, pg);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.cycle += 1;
        self.base = base;
        self.phase = Phase::IndexedPtrAdd;
    }

    fn phase_indexed_ptr_add<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let _ = bus.read(self.base as u16, pg);
        self.cycle += 1;
        self.ptr = self.base.wrapping_add(self.regs.x) as u16;
        self.phase = Phase::IndexedLow;
    }

    fn phase_indexed_low<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let lo = bus.read(self.ptr, pg);
        self.cycle += 1;
        self.base = lo;
        self.phase = Phase::IndexedHigh;
    }

    fn phase_indexed_high<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let hi_addr = (self.ptr as u8).wrapping_add(1) as u16;
        let hi = bus.read(hi_addr, pg);
        self.cycle += 1;
        self.ea = ((hi as u16) << 8) | (self.base as u16);
        self.phase = self.next_after_ea();
    }

    // ---- Indirect-indexed ((zp),Y) ---------------------------------------

    fn phase_indidx_ptr<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let pointer = bus.read(self.regs.pc, pg);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.cycle += 1;
        self.ptr = pointer as u16;
        self.phase = Phase::IndIdxLow;
    }

    fn phase_indidx_low<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let lo = bus.read(self.ptr, pg);
        self.cycle += 1;
        self.base = lo;
        self.phase = Phase::IndIdxHigh;
    }

    fn phase_indidx_high<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let hi_addr = (self.ptr as u8).wrapping_add(1) as u16;
        let hi = bus.read(hi_addr, pg);
        self.cycle += 1;
        let (low_plus, overflow) = self.base.overflowing_add(self.regs.y);
        self.ea = ((hi as u16) << 8) | (low_plus as u16);
        self.ptr = ((hi as u16) << 8)
            .wrapping_add(self.base as u16)
            .wrapping_add(self.regs.y as u16);
        if overflow || self.op.is_store() {
            self.phase = Phase::IndIdxFixup;
        } else {
            self.ea = self.ptr;
            self.phase = self.next_after_ea();
        }
    }

    fn phase_indidx_fixup<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let _ = bus.read(self.ea, pg);
        self.cycle += 1;
        self.ea = self.ptr;
        self.phase = self.next_after_ea();
    }

    // ---- Indirect jump ----------------------------------------------------

    fn phase_indirect_low<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let lo = bus.read(self.regs.pc, pg);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.cycle += 1;
        self.base = lo;
        self.phase = Phase::IndirectHigh;
    }

    fn phase_indirect_high<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let hi = bus.read(self.regs.pc, pg);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.cycle += 1;
        self.ptr = ((hi as u16) << 8) | (self.base as u16);
        self.phase = Phase::IndirectReadLow;
    }

    fn phase_indirect_read_low<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let lo = bus.read(self.ptr, pg);
        self.cycle += 1;
        self.base = lo;
        self.phase = Phase::IndirectReadHigh;
    }

    fn phase_indirect_read_high<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        // The documented page-wrap quirk: the high byte is read from the
        // same page as the pointer's low byte, never the next page.
        let addr = (self.ptr & 0xFF00) | (self.ptr.wrapping_add(1) & 0x00FF);
        let hi = bus.read(addr, pg);
        self.cycle += 1;
        self.regs.pc = ((hi as u16) << 8) | (self.base as u16);
        self.phase = Phase::Fetch;
    }

    // ---- Branch -------------------------------------------------------

    fn branch_condition_met(&self) -> bool {
        let p = self.regs.status;
        match self.op {
            Operation::Branch(BranchCondition::Bcc) => p & FLAG_C == 0,
            Operation::Branch(BranchCondition::Bcs) => p & FLAG_C != 0,
            Operation::Branch(BranchCondition::Beq) => p & FLAG_Z != 0,
            Operation::Branch(BranchCondition::Bne) => p & FLAG_Z == 0,
            Operation::Branch(BranchCondition::Bpl) => p & FLAG_N == 0,
            Operation::Branch(BranchCondition::Bmi) => p & FLAG_N != 0,
            Operation::Branch(BranchCondition::Bvc) => p & FLAG_V == 0,
            Operation::Branch(BranchCondition::Bvs) => p & FLAG_V != 0,
            other => {
                debug_assert!(false, "unexpected op {:?} in Branch phase", other);
                false
            }
        }
    }

    fn phase_branch<B: CpuBus>(&mut self, bus: &mut B, pg: &mut dyn PictureGenerator) {
        let offset = bus.read(self.regs.pc, pg) as i8;
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.cycle += 1;

        if !self.branch_condition_met() {
            self.phase = Phase::Fetch;
            return;
        }

        let pc = self.regs.pc;
        let target = (pc as i16).wrapping_add(offset as i16) as u16;
        self.fixup_needed = (target & 0xFF00) != (pc & 0xFF00);
        self.ptr = target;
        self.phase = Phase::Exec1;
    }

    // ---- Shared multi-cycle execute phases (Exec1..Exec6) ----------------

    fn phase_exec<B: CpuBus>(&mut self, step: u8, bus: &mut B, pg: &mut dyn PictureGenerator) {
        use Operation::*;
        match self.op {
            op if op.is_store() => self.exec_store(step, bus, pg),
            op if op.is_rmw() => self.exec_rmw_finalize(step, bus, pg),
            Operation::Branch(_) => self.exec_branch(step, bus, pg),
            Jsr => self.exec_jsr(step, bus, pg),
            Rts => self.exec_rts(step, bus, pg),
            Rti => self.exec_rti(step, bus, pg),
            Brk | Nmi | Irq => self.exec_interrupt_entry(step, bus, pg),
            Pha | Php => self.exec_push(step, bus, pg),
            Pla | Plp => self.exec_pull(step, bus, pg),
            other => debug_assert!(false, "unexpected op {:?} in Exec{} phase", other, step),
        }
    }

    fn exec_store<B: CpuBus>(&mut self, step: u8, bus: &mut B, pg: &mut dyn PictureGenerator) {
        debug_assert_eq!(step, 1, "store finalize is always one cycle");
        let value = match self.op {
            Operation::Sta => self.regs.a,
            Operation::Stx => self.regs.x,
            Operation::Sty => self.regs.y,
            other => {
                debug_assert!(false, "exec_store: unexpected op {:?}", other);
                0
            }
        };
        bus.write(self.ea, value, pg);
        self.cycle += 1;
        self.phase = Phase::Fetch;
    }

    fn exec_rmw_finalize<B: CpuBus>(&mut self, step: u8, bus: &mut B, pg: &mut dyn PictureGenerator) {
        debug_assert_eq!(step, 1, "RMW finalize is always one cycle");
        let m = self.data;
        let result = match self.op {
            Operation::Asl => alu::asl(&mut self.regs, m),
            Operation::Lsr => alu::lsr(&mut self.regs, m),
            Operation::Rol => alu::rol(&mut self.regs, m),
            Operation::Ror => alu::ror(&mut self.regs, m),
            Operation::Inc => alu::inc(&mut self.regs, m),
            Operation::Dec => alu::dec(&mut self.regs, m),
            other => {
                debug_assert!(false, "exec_rmw_finalize: unexpected op {:?}", other);
                m
            }
        };
        bus.write(self.ea, result, pg);
        self.cycle += 1;
        self.phase = Phase::Fetch;
    }

    fn exec_branch<B: CpuBus>(&mut self, step: u8, bus: &mut B, pg: &mut dyn PictureGenerator) {
        match step {
            1 => {
                let _ = bus.read(self.regs.pc, pg);
                self.cycle += 1;
                self.phase = if self.fixup_needed {
                    Phase::Exec2
                } else {
                    self.regs.pc = self.ptr;
                    Phase::Fetch
                };
            }
            2 => {
                let wrong_addr = (self.regs.pc & 0xFF00) | (self.ptr & 0x00FF);
                let _ = bus.read(wrong_addr, pg);
                self.cycle += 1;
                self.regs.pc = self.ptr;
                self.phase = Phase::Fetch;
            }
            other => debug_assert!(false, "exec_branch: unexpected step {}", other),
        }
    }

    fn exec_jsr<B: CpuBus>(&mut self, step: u8, bus: &mut B, pg: &mut dyn PictureGenerator) {
        match step {
            1 => {
                let _ = bus.read(0x0100 | self.regs.sp as u16, pg);
                self.cycle += 1;
                self.phase = Phase::Exec2;
            }
            2 => {
                let hi = (self.regs.pc >> 8) as u8;
                bus.write(0x0100 | self.regs.sp as u16, hi, pg);
                self.regs.sp = self.regs.sp.wrapping_sub(1);
                self.cycle += 1;
                self.phase = Phase::Exec3;
            }
            3 => {
                let lo = (self.regs.pc & 0xFF) as u8;
                bus.write(0x0100 | self.regs.sp as u16, lo, pg);
                self.regs.sp = self.regs.sp.wrapping_sub(1);
                self.cycle += 1;
                self.phase = Phase::Exec4;
            }
            4 => {
                let hi = bus.read(self.regs.pc, pg);
                self.cycle += 1;
                self.regs.pc = ((hi as u16) << 8) | (self.base as u16);
                self.phase = Phase::Fetch;
            }
            other => debug_assert!(false, "exec_jsr: unexpected step {}", other),
        }
    }

    fn exec_rts<B: CpuBus>(&mut self, step: u8, bus: &mut B, pg: &mut dyn PictureGenerator) {
        match step {
            1 => {
                let _ = bus.read(self.regs.pc, pg);
                self.cycle += 1;
                self.phase = Phase::Exec2;
            }
            2 => {
                let _ = bus.read(0x0100 | self.regs.sp as u16, pg);
                self.cycle += 1;
                self.phase = Phase::Exec3;
            }
            3 => {
                self.regs.sp = self.regs.sp.wrapping_add(1);
                self.base = bus.read(0x0100 | self.regs.sp as u16, pg);
                self.cycle += 1;
                self.phase = Phase::Exec4;
            }
            4 => {
                self.regs.sp = self.regs.sp.wrapping_add(1);
                let hi = bus.read(0x0100 | self.regs.sp as u16, pg);
                self.ptr = ((hi as u16) << 8) | (self.base as u16);
                self.cycle += 1;
                self.phase = Phase::Exec5;
            }
            5 => {
                let _ = bus.read(self.ptr, pg);
                self.cycle += 1;
                self.regs.pc = self.ptr.wrapping_add(1);
                self.phase = Phase::Fetch;
            }
            other => debug_assert!(false, "exec_rts: unexpected step {}", other),
        }
    }

    fn exec_rti<B: CpuBus>(&mut self, step: u8, bus: &mut B, pg: &mut dyn PictureGenerator) {
        match step {
            1 => {
                let _ = bus.read(self.regs.pc, pg);
                self.cycle += 1;
                self.phase = Phase::Exec2;
            }
            2 => {
                let _ = bus.read(0x0100 | self.regs.sp as u16, pg);
                self.cycle += 1;
                self.phase = Phase::Exec3;
            }
            3 => {
                self.regs.sp = self.regs.sp.wrapping_add(1);
                let pulled = bus.read(0x0100 | self.regs.sp as u16, pg);
                self.regs.restore_status_from_pull(pulled);
                self.cycle += 1;
                self.phase = Phase::Exec4;
            }
            4 => {
                self.regs.sp = self.regs.sp.wrapping_add(1);
                self.base = bus.read(0x0100 | self.regs.sp as u16, pg);
                self.cycle += 1;
                self.phase = Phase::Exec5;
            }
            5 => {
                self.regs.sp = self.regs.sp.wrapping_add(1);
                let hi = bus.read(0x0100 | self.regs.sp as u16, pg);
                self.regs.pc = ((hi as u16) << 8) | (self.base as u16);
                self.cycle += 1;
                self.phase = Phase::Fetch;
            }
            other => debug_assert!(false, "exec_rti: unexpected step {}", other),
        }
    }

    fn exec_interrupt_entry<B: CpuBus>(
        &mut self,
        step: u8,
        bus: &mut B,
        pg: &mut dyn PictureGenerator,
    ) {
        match step {
            1 => {
                if self.op == Operation::Brk {
                    // The conventional BRK signature/padding byte.
                    let _ = bus.read(self.regs.pc, pg);
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                } else {
                    let _ = bus.read(self.regs.pc, pg);
                }
                self.cycle += 1;
                self.phase = Phase::Exec2;
            }
            2 => {
                let hi = (self.regs.pc >> 8) as u8;
                bus.write(0x0100 | self.regs.sp as u16, hi, pg);
                self.regs.sp = self.regs.sp.wrapping_sub(1);
                self.cycle += 1;
                self.phase = Phase::Exec3;
            }
            3 => {
                let lo = (self.regs.pc & 0xFF) as u8;
                bus.write(0x0100 | self.regs.sp as u16, lo, pg);
                self.regs.sp = self.regs.sp.wrapping_sub(1);
                self.cycle += 1;
                self.phase = Phase::Exec4;
            }
            4 => {
                // Break bit is forced to 1 only for software BRK (§9).
                let status = self.regs.status_for_push(self.op == Operation::Brk);
                bus.write(0x0100 | self.regs.sp as u16, status, pg);
                self.regs.sp = self.regs.sp.wrapping_sub(1);
                self.regs.set_flag(FLAG_I, true);
                self.cycle += 1;
                self.phase = Phase::Exec5;
            }
            5 => {
                let vector_lo_addr = if self.op == Operation::Nmi { 0xFFFA } else { 0xFFFE };
                self.base = bus.read(vector_lo_addr, pg);
                self.cycle += 1;
                self.phase = Phase::Exec6;
            }
            6 => {
                let vector_hi_addr = if self.op == Operation::Nmi { 0xFFFB } else { 0xFFFF };
                let hi = bus.read(vector_hi_addr, pg);
                self.regs.pc = ((hi as u16) << 8) | (self.base as u16);
                self.cycle += 1;
                self.phase = Phase::Fetch;
            }
            other => debug_assert!(false, "exec_interrupt_entry: unexpected step {}", other),
        }
    }

    fn exec_push<B: CpuBus>(&mut self, step: u8, bus: &mut B, pg: &mut dyn PictureGenerator) {
        match step {
            1 => {
                let _ = bus.read(self.regs.pc, pg);
                self.cycle += 1;
                self.phase = Phase::Exec2;
            }
            2 => {
                let value = match self.op {
                    Operation::Pha => self.regs.a,
                    Operation::Php => self.regs.status_for_push(true),
                    other => {
                        debug_assert!(false, "exec_push: unexpected op {:?}", other);
                        0
                    }
                };
                bus.write(0x0100 | self.regs.sp as u16, value, pg);
                self.regs.sp = self.regs.sp.wrapping_sub(1);
                self.cycle += 1;
                self.phase = Phase::Fetch;
            }
            other => debug_assert!(false, "exec_push: unexpected step {}", other),
        }
    }

    fn exec_pull<B: CpuBus>(&mut self, step: u8, bus: &mut B, pg: &mut dyn PictureGenerator) {
        match step {
            1 => {
                let _ = bus.read(self.regs.pc, pg);
                self.cycle += 1;
                self.phase = Phase::Exec2;
            }
            2 => {
                let _ = bus.read(0x0100 | self.regs.sp as u16, pg);
                self.cycle += 1;
                self.phase = Phase::Exec3;
            }
            3 => {
                self.regs.sp = self.regs.sp.wrapping_add(1);
                let v = bus.read(0x0100 | self.regs.sp as u16, pg);
                match self.op {
                    Operation::Pla => {
                        self.regs.a = v;
                        alu::load(&mut self.regs, v);
                    }
                    Operation::Plp => self.regs.restore_status_from_pull(v),
                    other => debug_assert!(false, "exec_pull: unexpected op {:?}", other),
                }
                self.cycle += 1;
                self.phase = Phase::Fetch;
            }
            other => debug_assert!(false, "exec_pull: unexpected step {}", other),
        }
    }
}
