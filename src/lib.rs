#![doc = r#"
6502 processor core, bus mapper, and cartridge loader for a classic
picture-generator-plus-cartridge home console architecture.

This crate covers the execution core only (§1 of the specification this
crate implements): opcode decoding, addressing-mode micro-sequencing,
interrupt handling, the internal-RAM/coprocessor-register/cartridge bus
mapper, and the iNES-style cartridge loader. The picture generator's pixel
pipeline, the audio/input register file's synthesis, the windowing layer,
and trace-string formatting are external collaborators; this crate only
defines the trait seams (`picture_generator::PictureGenerator`,
`trace::TraceSink`) it calls through to reach them.

Modules:
- `error`: typed error kinds for cartridge loading (§7)
- `cartridge`: iNES (v1) container loader (§4.1)
- `mapper`: the `Mapper` trait and the NROM (mapper 0) implementation
- `bus`: the bus mapper, region dispatch and mirror folding (§4.3)
- `cpu`: register file, ALU, opcode decode, and the `tick()` micro-sequencer (§4.2)
- `picture_generator`: the MMIO trait the bus mapper forwards $2000-$3FFF and $4014 to
- `trace`: the optional pre-Fetch trace hook (§6, §9)
- `controller`: the $4016/$4017 input-latch shift register

In tests, shared iNES builders are available under `crate::test_utils`.
"#]

pub mod bus;
pub mod cartridge;
pub mod controller;
pub mod cpu;
pub mod error;
pub mod mapper;
pub mod picture_generator;
pub mod trace;

pub use bus::Bus;
pub use cartridge::Cartridge;
pub use cpu::Cpu;
pub use error::CoreError;

#[cfg(test)]
pub mod test_utils;
