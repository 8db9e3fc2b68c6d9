//! Typed error kinds for the cartridge loader and processor core.
//!
//! The micro-sequencer itself never returns a `Result` from `tick()` (see
//! `cpu::sequencer`): `DecodeUnknown` is logged and absorbed, and
//! `ProgrammerError` conditions are guarded by construction and only ever
//! checked with `debug_assert!`. Only the cartridge loader surfaces errors
//! to its caller.

use thiserror::Error;

/// Error kinds surfaced by cartridge loading and (for completeness) the
/// processor core, per spec §7.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CoreError {
    /// Bad magic tag or a file shorter than the 16-byte header.
    #[error("invalid ROM container: {0}")]
    InvalidContainer(&'static str),

    /// The arcade ("PlayChoice"/VS) variant flag is set; rejected.
    #[error("unsupported ROM variant (arcade flag set)")]
    UnsupportedVariant,

    /// Mapper id outside the recognized set (only id 0 is implemented).
    #[error("unsupported mapper id {0}")]
    UnsupportedMapper(u16),

    /// Recoverable: an opcode byte decoded to no known operation. The core
    /// absorbs this internally (logs a warning, runs as a two-cycle NOP);
    /// this variant exists for callers that want to observe the event
    /// through means other than the log facade.
    #[error("unknown opcode 0x{0:02X}, executing as NOP")]
    DecodeUnknown(u8),

    /// The micro-sequencer reached a state that should be unreachable by
    /// construction (e.g. an addressing mode/phase combination with no
    /// defined transition). Indicates a bug in the sequencer tables.
    #[error("programmer error: {0}")]
    ProgrammerError(&'static str),
}
