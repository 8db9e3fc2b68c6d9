/*!
Cartridge: iNES (v1) container loader, paired with the NROM (mapper 0) mapper.

Features:
- Parse the iNES (v1) header from bytes or a file path.
- Extract the PRG ROM image, the CHR image (ROM, or allocate CHR RAM when the
  CHR bank count is zero), and the PRG RAM size.
- Determine mirroring mode, battery-backed flag, and mapper id.
- Reject the NES 2.0 header variant and the arcade ("PlayChoice") flag.
- Construct the one mapper this crate implements (NROM) and delegate all
  CPU/PPU address mapping through it.

PRG RAM allocation policy:
- If header byte 8 (PRG-RAM size in 8 KiB units) is 0, allocate 8 KiB by
  convention (matching the common emulator reading of the iNES v1 spec).
- Otherwise allocate `units * 8 KiB`.

NROM mapping rules (via the mapper):
- 16 KiB PRG (NROM-128): $8000-$BFFF maps to the single 16 KiB bank;
  $C000-$FFFF mirrors it.
- 32 KiB PRG (NROM-256): $8000-$FFFF maps directly to 32 KiB.
*/

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use crate::error::CoreError;
use crate::mapper::{Mapper, Nrom};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    FourScreen,
}

pub struct Cartridge {
    // Mapper trait object; interior mutability to allow read methods to delegate.
    pub mapper: RefCell<Box<dyn Mapper>>,

    // Metadata
    mapper_id: u16,
    mirroring: Mirroring,
    battery: bool,
    has_trainer: bool,
    pub ines_version: InesVersion,

    // Size metadata for convenience accessors
    prg_rom_len: usize,
    chr_len: usize,
    prg_ram_len: usize,
    chr_is_ram: bool,
}

impl std::fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cartridge")
            .field("mapper_id", &self.mapper_id)
            .field("mirroring", &self.mirroring)
            .field("battery", &self.battery)
            .field("has_trainer", &self.has_trainer)
            .field("ines_version", &self.ines_version)
            .field("prg_rom_len", &self.prg_rom_len)
            .field("chr_len", &self.chr_len)
            .field("prg_ram_len", &self.prg_ram_len)
            .field("chr_is_ram", &self.chr_is_ram)
            .finish()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InesVersion {
    Ines1,
    Ines2, // rejected at parse time
}

impl Cartridge {
    /// Load a cartridge from raw iNES bytes, constructing the NROM mapper
    /// (the only mapper id this crate recognizes).
    pub fn from_ines_bytes(data: &[u8]) -> Result<Self, CoreError> {
        if data.len() < 16 {
            return Err(CoreError::InvalidContainer("file shorter than 16-byte header"));
        }
        if &data[0..4] != b"NES\x1A" {
            return Err(CoreError::InvalidContainer("bad magic tag"));
        }

        let prg_rom_16k_units = data[4] as usize;
        let chr_rom_8k_units = data[5] as usize;
        let flags6 = data[6];
        let flags7 = data[7];
        let prg_ram_8k_units = data.get(8).copied().unwrap_or(0) as usize;

        // NES 2.0 if (flags7 & 0x0C) == 0x08; not supported by this spec.
        let is_ines2 = (flags7 & 0x0C) == 0x08;
        let version = if is_ines2 {
            InesVersion::Ines2
        } else {
            InesVersion::Ines1
        };
        if is_ines2 {
            return Err(CoreError::InvalidContainer("NES 2.0 header is not supported"));
        }

        // Flags7 bit 0: unsupported arcade ("PlayChoice"/VS System) variant.
        if flags7 & 0b0000_0001 != 0 {
            return Err(CoreError::UnsupportedVariant);
        }

        let mapper_low = (flags6 >> 4) as u16;
        let mapper_high = (flags7 & 0xF0) as u16;
        let mapper_id = mapper_high | mapper_low;

        let four_screen = (flags6 & 0b0000_1000) != 0;
        let vertical_mirroring = (flags6 & 0b0000_0001) != 0;
        let mirroring = if four_screen {
            Mirroring::FourScreen
        } else if vertical_mirroring {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let battery = (flags6 & 0b0000_0010) != 0;
        let has_trainer = (flags6 & 0b0000_0100) != 0;

        let mut offset = 16usize;
        if has_trainer {
            if data.len() < offset + 512 {
                return Err(CoreError::InvalidContainer("file too small for trainer block"));
            }
            offset += 512;
        }

        let prg_rom_len = prg_rom_16k_units
            .checked_mul(16 * 1024)
            .ok_or(CoreError::InvalidContainer("PRG ROM size overflow"))?;
        let (chr_len, chr_is_ram) = if chr_rom_8k_units == 0 {
            (8 * 1024, true)
        } else {
            (
                chr_rom_8k_units
                    .checked_mul(8 * 1024)
                    .ok_or(CoreError::InvalidContainer("CHR ROM size overflow"))?,
                false,
            )
        };

        if data.len() < offset + prg_rom_len {
            return Err(CoreError::InvalidContainer("file too small for PRG ROM"));
        }
        let prg_rom = data[offset..offset + prg_rom_len].to_vec();
        offset += prg_rom_len;

        let chr = if chr_is_ram {
            vec![0; chr_len]
        } else {
            if data.len() < offset + chr_len {
                return Err(CoreError::InvalidContainer("file too small for CHR ROM"));
            }
            data[offset..offset + chr_len].to_vec()
        };

        let prg_ram_len = if prg_ram_8k_units == 0 {
            8 * 1024
        } else {
            prg_ram_8k_units
                .checked_mul(8 * 1024)
                .ok_or(CoreError::InvalidContainer("PRG RAM size overflow"))?
        };

        let mapper: Box<dyn Mapper> = match mapper_id {
            0 => Box::new(Nrom::new(prg_rom, chr, chr_is_ram, prg_ram_len)),
            other => return Err(CoreError::UnsupportedMapper(other)),
        };

        Ok(Self {
            mapper: RefCell::new(mapper),
            mapper_id,
            mirroring,
            battery,
            has_trainer,
            ines_version: version,
            prg_rom_len,
            chr_len,
            prg_ram_len,
            chr_is_ram,
        })
    }

    /// Load a cartridge from an iNES file (.nes).
    pub fn from_ines_file<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let bytes = fs::read(path)
            .map_err(|_| CoreError::InvalidContainer("failed to read ROM file"))?;
        Self::from_ines_bytes(&bytes)
    }

    /// Read a byte from PRG ROM space ($8000..=$FFFF) via the mapper.
    pub fn cpu_read_prg_rom(&self, addr: u16) -> u8 {
        self.mapper.borrow_mut().cpu_read(addr)
    }

    /// Writes to PRG ROM space ($8000..=$FFFF), delegated to the mapper (ignored by NROM).
    pub fn cpu_write_prg_rom(&mut self, addr: u16, value: u8) {
        self.mapper.get_mut().cpu_write(addr, value);
    }

    /// Read a byte from PRG RAM space ($6000..=$7FFF), wrapped into the PRG RAM window.
    pub fn cpu_read_prg_ram(&self, addr: u16) -> u8 {
        if self.prg_ram_len == 0 {
            return 0;
        }
        let base = 0x6000u16;
        let rel = (addr as usize).saturating_sub(base as usize);
        let idx = rel % self.prg_ram_len;
        let eff = base.wrapping_add(idx as u16);
        self.mapper.borrow_mut().cpu_read(eff)
    }

    /// Write a byte to PRG RAM space ($6000..=$7FFF), wrapped into the PRG RAM window.
    pub fn cpu_write_prg_ram(&mut self, addr: u16, value: u8) {
        if self.prg_ram_len == 0 {
            return;
        }
        let base = 0x6000u16;
        let rel = (addr as usize).saturating_sub(base as usize);
        let idx = rel % self.prg_ram_len;
        let eff = base.wrapping_add(idx as u16);
        self.mapper.get_mut().cpu_write(eff, value);
    }

    pub fn mapper_id(&self) -> u16 {
        self.mapper_id
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub fn battery_backed(&self) -> bool {
        self.battery
    }

    pub fn has_trainer(&self) -> bool {
        self.has_trainer
    }

    pub fn has_prg_ram(&self) -> bool {
        self.prg_ram_len > 0
    }

    pub fn prg_rom_len(&self) -> usize {
        self.prg_rom_len
    }

    pub fn chr_len(&self) -> usize {
        self.chr_len
    }

    pub fn prg_ram_len(&self) -> usize {
        self.prg_ram_len
    }
}
