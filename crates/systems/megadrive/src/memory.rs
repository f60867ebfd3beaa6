//! Mega Drive storage: cartridge ROM, work RAM, Z80 RAM and port registers

use crate::joypad::Joypad;

/// Cartridge buffer capacity (4 MiB)
pub const ROM_CAPACITY: usize = 4 * 1024 * 1024;

/// 68000 work RAM (64 KiB)
pub const WORK_RAM_SIZE: usize = 0x10000;

/// Z80 RAM (8 KiB)
pub const Z80_RAM_SIZE: usize = 0x2000;

/// Cartridge ROM
///
/// The buffer always holds `ROM_CAPACITY` bytes; only the first `size` are mapped.
pub struct Rom {
    buffer: Box<[u8]>,
    size: usize,
    /// Stored for hosts that set it; the bus never consults it and ROM stays read-only.
    pub writeable: bool,
}

impl Rom {
    pub fn new() -> Self {
        Self {
            buffer: vec![0; ROM_CAPACITY].into_boxed_slice(),
            size: 0,
            writeable: false,
        }
    }

    /// Number of bytes actually loaded
    pub fn size(&self) -> usize {
        self.size
    }

    /// Copy `data` into the buffer. Oversized images leave the ROM untouched.
    pub(crate) fn install(&mut self, data: &[u8]) -> bool {
        if data.len() > ROM_CAPACITY {
            return false;
        }
        self.buffer[..data.len()].copy_from_slice(data);
        self.size = data.len();
        true
    }

    pub(crate) fn eject(&mut self) {
        self.size = 0;
    }

    pub fn contains(&self, address: u32) -> bool {
        (address as usize) < self.size
    }

    /// Raw buffer byte; past the end of the buffer reads as 0.
    pub fn byte(&self, offset: usize) -> u8 {
        self.buffer.get(offset).copied().unwrap_or(0)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.size]
    }
}

impl Default for Rom {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the 68000 bus can reach, including the VDP.
pub struct MegaDriveMemory<V> {
    pub rom: Rom,
    pub work_ram: Box<[u8; WORK_RAM_SIZE]>,
    pub z80_ram: Box<[u8; Z80_RAM_SIZE]>,
    /// Ports 1, 2 and EXT in hardware order
    pub joypads: [Joypad; 3],
    pub vdp: V,
}

impl<V> MegaDriveMemory<V> {
    pub fn new(vdp: V) -> Self {
        Self {
            rom: Rom::new(),
            work_ram: Box::new([0; WORK_RAM_SIZE]),
            z80_ram: Box::new([0; Z80_RAM_SIZE]),
            joypads: [Joypad::default(); 3],
            vdp,
        }
    }

    /// Bytes of the boxed ROM and RAM buffers; the VDP reports its own.
    pub const fn heap_size() -> usize {
        ROM_CAPACITY + WORK_RAM_SIZE + Z80_RAM_SIZE
    }
}
