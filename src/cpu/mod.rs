//! The processor core (§4.2): register file, status flags, opcode decode,
//! the ALU, and the `tick()`-driven micro-sequencer.
//!
//! Submodules:
//!
//!   - `regs`      - packed status-flag bits and the `CpuRegisters` accessor trait
//!   - `state`     - `CpuState`, the concrete architecturally-visible register file
//!   - `alu`       - pure arithmetic/logic helpers with no bus access
//!   - `phase`     - the micro-sequencer's cycle-phase tag
//!   - `decode`    - the `Operation`/`AddressingMode` tags and the opcode table
//!   - `sequencer` - `Cpu` itself and `tick()`
//!
//! Only `Cpu`, `CpuBus`, and the register/flag types a caller needs to
//! inspect state are re-exported here; the phase/decode machinery is
//! implementation detail of the sequencer.

pub mod alu;
pub mod decode;
pub mod phase;
pub mod regs;
pub mod sequencer;
pub mod state;

pub use regs::CpuRegisters;
pub use sequencer::{Cpu, CpuBus};
pub use state::CpuState;
