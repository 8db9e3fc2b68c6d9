//! The micro-sequencer's cycle-phase tag (§3, §4.2).
//!
//! Every phase performs exactly one bus transaction per `tick()` — a real
//! read/write, or a dummy read of the current PC for cycles the silicon
//! spends internally. `sequencer::Cpu::tick` is a single big match over
//! `(phase, op)`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    DmaAlign,
    DmaCopy,
    Accumulator,
    Immediate,
    Branch,
    ZeroBase,
    ZeroIndexRead,
    ZeroIndexed,
    AbsLow,
    AbsHigh,
    AbsIdxHigh,
    AbsFixup,
    RmwRead,
    RmwWrite,
    IndexedPtr,
    IndexedPtrAdd,
    IndexedLow,
    IndexedHigh,
    IndIdxPtr,
    IndIdxLow,
    IndIdxHigh,
    IndIdxFixup,
    IndirectLow,
    IndirectHigh,
    IndirectReadLow,
    IndirectReadHigh,
    Read,
    Exec1,
    Exec2,
    Exec3,
    Exec4,
    Exec5,
    Exec6,
}
