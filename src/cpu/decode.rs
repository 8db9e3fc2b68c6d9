//! Opcode decode: the `Operation` mnemonic tag, the `AddressingMode` tag,
//! and the byte -> (Operation, AddressingMode) table (§4.2).
//!
//! Two synthetic operations, `Nmi` and `Irq`, are never produced by
//! `decode`; the sequencer assigns them directly at the Fetch precedence
//! check (§4.2 "Fetch", steps 1-2) to drive the shared interrupt-entry
//! microcode that also backs `Brk`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndexedIndirectX,
    IndirectIndexedY,
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    // Arithmetic / logic (read category)
    Adc,
    Sbc,
    And,
    Ora,
    Eor,
    Cmp,
    Cpx,
    Cpy,
    Bit,
    Lda,
    Ldx,
    Ldy,
    // Stores
    Sta,
    Stx,
    Sty,
    // Read-modify-write
    Asl,
    Lsr,
    Rol,
    Ror,
    Inc,
    Dec,
    // Implied register/flag ops (Accumulator-phase, one dummy cycle)
    AslAcc,
    LsrAcc,
    RolAcc,
    RorAcc,
    Inx,
    Iny,
    Dex,
    Dey,
    Tax,
    Tay,
    Tsx,
    Txa,
    Tya,
    Txs,
    Clc,
    Sec,
    Cli,
    Sei,
    Clv,
    Cld,
    Sed,
    Nop,
    // Stack
    Pha,
    Php,
    Pla,
    Plp,
    // Control flow
    JmpAbsolute,
    JmpIndirect,
    Jsr,
    Rts,
    Rti,
    Brk,
    Branch(BranchCondition),
    // Interrupt entry, assigned by the sequencer rather than decode().
    Nmi,
    Irq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCondition {
    Bcc,
    Bcs,
    Beq,
    Bne,
    Bpl,
    Bmi,
    Bvc,
    Bvs,
}

impl Operation {
    /// Operations that write a register's value to memory instead of
    /// reading one (§4.2: store category affects which phase chain an
    /// addressing mode feeds into).
    pub fn is_store(self) -> bool {
        matches!(self, Operation::Sta | Operation::Stx | Operation::Sty)
    }

    /// Read-modify-write memory operations (shift/rotate/inc/dec on a
    /// memory operand), which take the RmwRead/RmwWrite/Exec1 phase chain.
    pub fn is_rmw(self) -> bool {
        matches!(
            self,
            Operation::Asl
                | Operation::Lsr
                | Operation::Rol
                | Operation::Ror
                | Operation::Inc
                | Operation::Dec
        )
    }

    /// True for the operations for which an absolute-indexed or
    /// indirect-indexed addressing mode always pays the fixup cycle
    /// (stores and RMWs write memory, so the effective address must be
    /// correct before the single bus transaction that uses it).
    pub fn always_pays_fixup(self) -> bool {
        self.is_store() || self.is_rmw()
    }
}

/// Decode one opcode byte. `None` means an undocumented/illegal opcode;
/// the sequencer falls back to a two-cycle NOP with a logged warning (§4.2
/// Fetch, §7 `DecodeUnknown`).
pub fn decode(opcode: u8) -> Option<(Operation, AddressingMode)> {
    use AddressingMode::*;
    use BranchCondition::*;
    use Operation::*;

    Some(match opcode {
        // ADC
        0x69 => (Adc, Immediate),
        0x65 => (Adc, ZeroPage),
        0x75 => (Adc, ZeroPageX),
        0x6D => (Adc, Absolute),
        0x7D => (Adc, AbsoluteX),
        0x79 => (Adc, AbsoluteY),
        0x61 => (Adc, IndexedIndirectX),
        0x71 => (Adc, IndirectIndexedY),

        // SBC
        0xE9 => (Sbc, Immediate),
        0xE5 => (Sbc, ZeroPage),
        0xF5 => (Sbc, ZeroPageX),
        0xED => (Sbc, Absolute),
        0xFD => (Sbc, AbsoluteX),
        0xF9 => (Sbc, AbsoluteY),
        0xE1 => (Sbc, IndexedIndirectX),
        0xF1 => (Sbc, IndirectIndexedY),

        // AND
        0x29 => (And, Immediate),
        0x25 => (And, ZeroPage),
        0x35 => (And, ZeroPageX),
        0x2D => (And, Absolute),
        0x3D => (And, AbsoluteX),
        0x39 => (And, AbsoluteY),
        0x21 => (And, IndexedIndirectX),
        0x31 => (And, IndirectIndexedY),

        // ORA
        0x09 => (Ora, Immediate),
        0x05 => (Ora, ZeroPage),
        0x15 => (Ora, ZeroPageX),
        0x0D => (Ora, Absolute),
        0x1D => (Ora, AbsoluteX),
        0x19 => (Ora, AbsoluteY),
        0x01 => (Ora, IndexedIndirectX),
        0x11 => (Ora, IndirectIndexedY),

        // EOR
        0x49 => (Eor, Immediate),
        0x45 => (Eor, ZeroPage),
        0x55 => (Eor, ZeroPageX),
        0x4D => (Eor, Absolute),
        0x5D => (Eor, AbsoluteX),
        0x59 => (Eor, AbsoluteY),
        0x41 => (Eor, IndexedIndirectX),
        0x51 => (Eor, IndirectIndexedY),

        // CMP
        0xC9 => (Cmp, Immediate),
        0xC5 => (Cmp, ZeroPage),
        0xD5 => (Cmp, ZeroPageX),
        0xCD => (Cmp, Absolute),
        0xDD => (Cmp, AbsoluteX),
        0xD9 => (Cmp, AbsoluteY),
        0xC1 => (Cmp, IndexedIndirectX),
        0xD1 => (Cmp, IndirectIndexedY),

        // CPX / CPY
        0xE0 => (Cpx, Immediate),
        0xE4 => (Cpx, ZeroPage),
        0xEC => (Cpx, Absolute),
        0xC0 => (Cpy, Immediate),
        0xC4 => (Cpy, ZeroPage),
        0xCC => (Cpy, Absolute),

        // BIT
        0x24 => (Bit, ZeroPage),
        0x2C => (Bit, Absolute),

        // LDA
        0xA9 => (Lda, Immediate),
        0xA5 => (Lda, ZeroPage),
        0xB5 => (Lda, ZeroPageX),
        0xAD => (Lda, Absolute),
        0xBD => (Lda, AbsoluteX),
        0xB9 => (Lda, AbsoluteY),
        0xA1 => (Lda, IndexedIndirectX),
        0xB1 => (Lda, IndirectIndexedY),

        // LDX
        0xA2 => (Ldx, Immediate),
        0xA6 => (Ldx, ZeroPage),
        0xB6 => (Ldx, ZeroPageY),
        0xAE => (Ldx, Absolute),
        0xBE => (Ldx, AbsoluteY),

        // LDY
        0xA0 => (Ldy, Immediate),
        0xA4 => (Ldy, ZeroPage),
        0xB4 => (Ldy, ZeroPageX),
        0xAC => (Ldy, Absolute),
        0xBC => (Ldy, AbsoluteX),

        // STA
        0x85 => (Sta, ZeroPage),
        0x95 => (Sta, ZeroPageX),
        0x8D => (Sta, Absolute),
        0x9D => (Sta, AbsoluteX),
        0x99 => (Sta, AbsoluteY),
        0x81 => (Sta, IndexedIndirectX),
        0x91 => (Sta, IndirectIndexedY),

        // STX / STY
        0x86 => (Stx, ZeroPage),
        0x96 => (Stx, ZeroPageY),
        0x8E => (Stx, Absolute),
        0x84 => (Sty, ZeroPage),
        0x94 => (Sty, ZeroPageX),
        0x8C => (Sty, Absolute),

        // ASL
        0x0A => (AslAcc, Accumulator),
        0x06 => (Asl, ZeroPage),
        0x16 => (Asl, ZeroPageX),
        0x0E => (Asl, Absolute),
        0x1E => (Asl, AbsoluteX),

        // LSR
        0x4A => (LsrAcc, Accumulator),
        0x46 => (Lsr, ZeroPage),
        0x56 => (Lsr, ZeroPageX),
        0x4E => (Lsr, Absolute),
        0x5E => (Lsr, AbsoluteX),

        // ROL
        0x2A => (RolAcc, Accumulator),
        0x26 => (Rol, ZeroPage),
        0x36 => (Rol, ZeroPageX),
        0x2E => (Rol, Absolute),
        0x3E => (Rol, AbsoluteX),

        // ROR
        0x6A => (RorAcc, Accumulator),
        0x66 => (Ror, ZeroPage),
        0x76 => (Ror, ZeroPageX),
        0x6E => (Ror, Absolute),
        0x7E => (Ror, AbsoluteX),

        // INC / DEC (memory)
        0xE6 => (Inc, ZeroPage),
        0xF6 => (Inc, ZeroPageX),
        0xEE => (Inc, Absolute),
        0xFE => (Inc, AbsoluteX),
        0xC6 => (Dec, ZeroPage),
        0xD6 => (Dec, ZeroPageX),
        0xCE => (Dec, Absolute),
        0xDE => (Dec, AbsoluteX),

        // Register increment/decrement
        0xE8 => (Inx, Implied),
        0xC8 => (Iny, Implied),
        0xCA => (Dex, Implied),
        0x88 => (Dey, Implied),

        // Transfers
        0xAA => (Tax, Implied),
        0xA8 => (Tay, Implied),
        0xBA => (Tsx, Implied),
        0x8A => (Txa, Implied),
        0x98 => (Tya, Implied),
        0x9A => (Txs, Implied),

        // Flag ops
        0x18 => (Clc, Implied),
        0x38 => (Sec, Implied),
        0x58 => (Cli, Implied),
        0x78 => (Sei, Implied),
        0xB8 => (Clv, Implied),
        0xD8 => (Cld, Implied),
        0xF8 => (Sed, Implied),

        // NOP
        0xEA => (Nop, Implied),

        // Stack
        0x48 => (Pha, Implied),
        0x08 => (Php, Implied),
        0x68 => (Pla, Implied),
        0x28 => (Plp, Implied),

        // Control flow
        0x4C => (JmpAbsolute, Absolute),
        0x6C => (JmpIndirect, Indirect),
        0x20 => (Jsr, Absolute),
        0x60 => (Rts, Implied),
        0x40 => (Rti, Implied),
        0x00 => (Brk, Implied),

        // Branches
        0x90 => (Branch(Bcc), Relative),
        0xB0 => (Branch(Bcs), Relative),
        0xF0 => (Branch(Beq), Relative),
        0xD0 => (Branch(Bne), Relative),
        0x10 => (Branch(Bpl), Relative),
        0x30 => (Branch(Bmi), Relative),
        0x50 => (Branch(Bvc), Relative),
        0x70 => (Branch(Bvs), Relative),

        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_covers_documented_opcodes() {
        // Spot-check a representative sample across categories.
        assert_eq!(decode(0xA9), Some((Operation::Lda, AddressingMode::Immediate)));
        assert_eq!(decode(0x8D), Some((Operation::Sta, AddressingMode::Absolute)));
        assert_eq!(decode(0x6C), Some((Operation::JmpIndirect, AddressingMode::Indirect)));
        assert_eq!(decode(0x20), Some((Operation::Jsr, AddressingMode::Absolute)));
        assert_eq!(decode(0x00), Some((Operation::Brk, AddressingMode::Implied)));
    }

    #[test]
    fn unassigned_byte_is_none() {
        // 0x02 is an undocumented opcode (KIL/JAM on real silicon).
        assert_eq!(decode(0x02), None);
    }

    #[test]
    fn store_and_rmw_classification() {
        assert!(Operation::Sta.is_store());
        assert!(!Operation::Sta.is_rmw());
        assert!(Operation::Inc.is_rmw());
        assert!(Operation::Inc.always_pays_fixup());
        assert!(!Operation::Lda.always_pays_fixup());
    }
}
