//! Mega Drive 68000 bus
//!
//! Decoding is split from access: [`decode`] maps an address to a [`Region`],
//! and [`M68kBus`] implements the read and write behaviour for each region.
//! [`VdpBus`] is the narrower read-only view the VDP uses for DMA.
//!
//! Memory map:
//! - 0x000000-ROM end: Cartridge ROM (read-only)
//! - 0xA00000-0xA01FFF: Z80 RAM, byte accesses only
//! - 0xA04000, 0xA04002: YM2612 (not emulated)
//! - 0xA10002-0xA10006: Joypad data, ports 1/2/EXT
//! - 0xA10008-0xA1000C: Joypad control, ports 1/2/EXT
//! - 0xA11000, 0xA11100, 0xA11200: Memory mode, Z80 BUSREQ, Z80 RESET (not emulated)
//! - 0xC00000/0xC00002: VDP data port
//! - 0xC00004/0xC00006: VDP control port
//! - 0xC00008: H/V counter (not emulated)
//! - 0xC00010: PSG (not emulated)
//! - 0xE00000-0xFFFFFF: Work RAM, mirrored every 64 KB

use crate::joypad::{Button, Joypad};
use crate::memory::{MegaDriveMemory, Rom, WORK_RAM_SIZE, Z80_RAM_SIZE};
use crate::vdp::{DmaSource, VideoProcessor};
use emu_core::cpu_m68k::{ByteLanes, MemoryM68k};
use emu_core::logging::{log, LogCategory, LogLevel};

const ADDRESS_MASK: u32 = 0x00FF_FFFF;

/// What an address on the 68000 bus selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Rom,
    /// Offset into Z80 RAM
    Z80Ram(usize),
    Ym2612,
    /// Data register of port 0-2
    JoypadData(usize),
    /// Control register of port 0-2
    JoypadControl(usize),
    /// Rest of the I/O block
    IoUnused,
    MemoryMode,
    Z80BusRequest,
    Z80Reset,
    VdpData,
    VdpControl,
    HvCounter,
    Psg,
    WorkRam,
    Invalid,
}

/// Map a bus address to the region it selects. ROM is checked first.
pub fn decode(address: u32, rom_size: usize) -> Region {
    let address = address & ADDRESS_MASK;

    if (address as usize) < rom_size {
        return Region::Rom;
    }

    match address {
        0xA00000..=0xA01FFF => Region::Z80Ram((address - 0xA00000) as usize),
        0xA04000 | 0xA04002 => Region::Ym2612,
        0xA10002 | 0xA10004 | 0xA10006 => Region::JoypadData(((address - 0xA10002) / 2) as usize),
        0xA10008 | 0xA1000A | 0xA1000C => {
            Region::JoypadControl(((address - 0xA10008) / 2) as usize)
        }
        0xA10000..=0xA1001F => Region::IoUnused,
        0xA11000 => Region::MemoryMode,
        0xA11100 => Region::Z80BusRequest,
        0xA11200 => Region::Z80Reset,
        0xC00000 | 0xC00002 => Region::VdpData,
        0xC00004 | 0xC00006 => Region::VdpControl,
        0xC00008 => Region::HvCounter,
        0xC00010 => Region::Psg,
        0xE00000..=0xFFFFFF => Region::WorkRam,
        _ => Region::Invalid,
    }
}

fn rom_word(rom: &Rom, address: u32) -> u16 {
    let offset = address as usize;
    (rom.byte(offset) as u16) << 8 | rom.byte(offset + 1) as u16
}

fn work_ram_word(work_ram: &[u8; WORK_RAM_SIZE], address: u32) -> u16 {
    let high = work_ram[address as usize & (WORK_RAM_SIZE - 1)];
    let low = work_ram[address.wrapping_add(1) as usize & (WORK_RAM_SIZE - 1)];
    (high as u16) << 8 | low as u16
}

/// Read-only view of the memory the VDP can pull DMA data from.
///
/// Only cartridge ROM and work RAM are visible; there is no write path.
pub struct VdpBus<'a> {
    pub rom: &'a Rom,
    pub work_ram: &'a [u8; WORK_RAM_SIZE],
}

impl DmaSource for VdpBus<'_> {
    fn read_word(&self, address: u32) -> u16 {
        let address = address & ADDRESS_MASK;
        if self.rom.contains(address) {
            rom_word(self.rom, address)
        } else if (0xE00000..=0xFFFFFF).contains(&address) {
            work_ram_word(self.work_ram, address)
        } else {
            log(LogCategory::Bus, LogLevel::Error, || {
                format!("VDP attempted to read invalid memory at 0x{:06X}", address)
            });
            0
        }
    }
}

/// 68000 bus binding for one frame (or one reset).
///
/// Borrows the machine's memory and the host's input query for as long as the
/// CPU is being driven; nothing of it outlives the call that created it.
pub struct M68kBus<'a, V> {
    pub memory: &'a mut MegaDriveMemory<V>,
    read_input: &'a mut dyn FnMut(Button) -> bool,
}

impl<'a, V: VideoProcessor> M68kBus<'a, V> {
    pub fn new(
        memory: &'a mut MegaDriveMemory<V>,
        read_input: &'a mut dyn FnMut(Button) -> bool,
    ) -> Self {
        Self { memory, read_input }
    }

    pub fn vdp(&self) -> &V {
        &self.memory.vdp
    }

    pub fn vdp_mut(&mut self) -> &mut V {
        &mut self.memory.vdp
    }

    fn z80_ram_offset(offset: usize, lanes: ByteLanes) -> Option<usize> {
        match lanes {
            ByteLanes::High => Some(offset & (Z80_RAM_SIZE - 1)),
            ByteLanes::Low => Some((offset + 1) & (Z80_RAM_SIZE - 1)),
            ByteLanes::Both => None,
        }
    }

    fn read_joypad(&mut self, port: usize, lanes: ByteLanes) -> u16 {
        if port != 0 {
            // Nothing connected to port 2 or EXT
            return 0xFF;
        }
        if !lanes.low() {
            return 0;
        }
        self.memory.joypads[0].read_data(self.read_input) as u16
    }

    fn joypad_mut(&mut self, port: usize) -> &mut Joypad {
        &mut self.memory.joypads[port]
    }
}

impl<V: VideoProcessor> MemoryM68k for M68kBus<'_, V> {
    fn read(&mut self, address: u32, lanes: ByteLanes) -> u16 {
        let address = address & ADDRESS_MASK;

        let value = match decode(address, self.memory.rom.size()) {
            Region::Rom => rom_word(&self.memory.rom, address),
            Region::Z80Ram(offset) => match Self::z80_ram_offset(offset, lanes) {
                Some(index) => {
                    let byte = self.memory.z80_ram[index] as u16;
                    if lanes.high() {
                        byte << 8
                    } else {
                        byte
                    }
                }
                None => {
                    log(LogCategory::Bus, LogLevel::Error, || {
                        format!(
                            "68k attempted to perform word-sized read of Z80 memory at 0x{:06X}",
                            address
                        )
                    });
                    0
                }
            },
            Region::JoypadData(port) => self.read_joypad(port, lanes),
            Region::JoypadControl(port) => {
                if lanes.low() {
                    self.memory.joypads[port].control as u16
                } else {
                    0
                }
            }
            // Real hardware can lock up on data port reads outside read mode; not reproduced.
            Region::VdpData => self.memory.vdp.read_data(),
            Region::VdpControl => self.memory.vdp.read_control(),
            Region::WorkRam => work_ram_word(&self.memory.work_ram, address),
            Region::Invalid => {
                log(LogCategory::Bus, LogLevel::Error, || {
                    format!("68k attempted to read invalid memory at 0x{:06X}", address)
                });
                0
            }
            // Unemulated hardware is accepted silently
            Region::Ym2612
            | Region::IoUnused
            | Region::MemoryMode
            | Region::Z80BusRequest
            | Region::Z80Reset
            | Region::HvCounter
            | Region::Psg => 0,
        };

        value & lanes.mask()
    }

    fn write(&mut self, address: u32, lanes: ByteLanes, value: u16) {
        let address = address & ADDRESS_MASK;
        let high_byte = (value >> 8) as u8;
        let low_byte = value as u8;

        match decode(address, self.memory.rom.size()) {
            Region::Rom => log(LogCategory::Bus, LogLevel::Error, || {
                format!("68k attempted to write to ROM at 0x{:06X}", address)
            }),
            Region::Z80Ram(offset) => match Self::z80_ram_offset(offset, lanes) {
                Some(index) => {
                    self.memory.z80_ram[index] = if lanes.high() { high_byte } else { low_byte };
                }
                None => log(LogCategory::Bus, LogLevel::Error, || {
                    format!(
                        "68k attempted to perform word-sized write of Z80 memory at 0x{:06X}",
                        address
                    )
                }),
            },
            Region::JoypadData(port) => {
                if lanes.low() {
                    self.joypad_mut(port).write_data(low_byte);
                }
            }
            Region::JoypadControl(port) => {
                if lanes.low() {
                    self.joypad_mut(port).write_control(low_byte);
                }
            }
            Region::VdpData => self.memory.vdp.write_data(value),
            Region::VdpControl => {
                let MegaDriveMemory {
                    rom, work_ram, vdp, ..
                } = &mut *self.memory;
                let dma = VdpBus {
                    rom: &*rom,
                    work_ram: &**work_ram,
                };
                vdp.write_control(value, &dma);
            }
            Region::WorkRam => {
                if lanes.high() {
                    self.memory.work_ram[address as usize & (WORK_RAM_SIZE - 1)] = high_byte;
                }
                if lanes.low() {
                    self.memory.work_ram[(address as usize + 1) & (WORK_RAM_SIZE - 1)] = low_byte;
                }
            }
            Region::Invalid => log(LogCategory::Bus, LogLevel::Error, || {
                format!("68k attempted to write invalid memory at 0x{:06X}", address)
            }),
            Region::Ym2612
            | Region::IoUnused
            | Region::MemoryMode
            | Region::Z80BusRequest
            | Region::Z80Reset
            | Region::HvCounter
            | Region::Psg => {}
        }
    }
}
